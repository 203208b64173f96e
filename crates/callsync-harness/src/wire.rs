//! Builders for server-side signaling events.
//!
//! Events use the `call` namespace. Every joined leg belongs to the room
//! session [`room_session_id`] names. Member events come in two shapes:
//!
//! - Leg-addressed: the envelope carries our leg's call id.
//! - Room-addressed (`*_in_room`): the envelope carries only the room session
//!   id and the member object carries that participant's own call id, the
//!   way a conferencing room fans out events about other participants.

use callsync_proto::WireEvent;
use serde_json::{Value, json};

/// `call.joined` for `call_id` with `self_id` as our member and `members`
/// as the full roster.
pub fn joined(call_id: &str, self_id: &str, members: &[&str]) -> WireEvent {
    let members: Vec<Value> = members.iter().map(|id| json!({ "member_id": id })).collect();
    let params = json!({
        "call_id": call_id,
        "member_id": self_id,
        "node_id": "node-1",
        "room_session_id": room_session_id(call_id),
        "members": members,
    });
    WireEvent::new("call.joined", params)
}

/// Room session the leg `call_id` belongs to.
pub fn room_session_id(call_id: &str) -> String {
    format!("rs-{call_id}")
}

/// `call.left` for `call_id`.
pub fn left(call_id: &str) -> WireEvent {
    WireEvent::new("call.left", json!({ "call_id": call_id }))
}

/// `call.member.joined`.
pub fn member_joined(call_id: &str, member_id: &str) -> WireEvent {
    member_event("call.member.joined", call_id, json!({ "member_id": member_id }))
}

/// `call.member.left`.
pub fn member_left(call_id: &str, member_id: &str) -> WireEvent {
    member_event("call.member.left", call_id, json!({ "member_id": member_id }))
}

/// `call.member.updated` with the given wire fields merged into the member.
pub fn member_updated(call_id: &str, member_id: &str, fields: Value) -> WireEvent {
    member_event("call.member.updated", call_id, updated_member(member_id, fields))
}

/// `call.member.joined` addressed to `room_session_id`, for a participant on
/// its own leg `member_call_id`.
pub fn member_joined_in_room(
    room_session_id: &str,
    member_id: &str,
    member_call_id: &str,
) -> WireEvent {
    let member = json!({ "member_id": member_id, "call_id": member_call_id });
    room_event("call.member.joined", room_session_id, member)
}

/// `call.member.left` addressed to `room_session_id`.
pub fn member_left_in_room(
    room_session_id: &str,
    member_id: &str,
    member_call_id: &str,
) -> WireEvent {
    let member = json!({ "member_id": member_id, "call_id": member_call_id });
    room_event("call.member.left", room_session_id, member)
}

/// `call.member.updated` addressed to `room_session_id`.
pub fn member_updated_in_room(
    room_session_id: &str,
    member_id: &str,
    member_call_id: &str,
    fields: Value,
) -> WireEvent {
    let mut member = updated_member(member_id, fields);
    member["call_id"] = Value::String(member_call_id.to_string());
    room_event("call.member.updated", room_session_id, member)
}

fn updated_member(member_id: &str, fields: Value) -> Value {
    let mut member = json!({ "member_id": member_id });
    if let (Some(member), Value::Object(fields)) = (member.as_object_mut(), fields) {
        let updated: Vec<Value> = fields.keys().map(|k| Value::String(k.clone())).collect();
        member.extend(fields);
        member.insert("updated".to_string(), Value::Array(updated));
    }
    member
}

fn member_event(event_type: &str, call_id: &str, member: Value) -> WireEvent {
    WireEvent::new(event_type, json!({ "call_id": call_id, "member": member }))
}

fn room_event(event_type: &str, room_session_id: &str, member: Value) -> WireEvent {
    WireEvent::new(event_type, json!({ "room_session_id": room_session_id, "member": member }))
}
