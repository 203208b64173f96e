//! Typed views over event parameters.
//!
//! Every attribute except the identifiers is optional: `member.updated`
//! carries only the fields that changed, and joined events from different
//! namespaces disagree on which identifiers they include.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::ProtoError;

/// A member object as it appears on the wire, possibly partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberPayload {
    /// Member id (`video.*` namespace).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Member id (`call.*` namespace).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    /// Call leg the member belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Media node hosting the member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Room id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Room session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_session_id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Member type (`member`, `screen`, `device`).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,
    /// Parent member for screen shares and additional devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Microphone muted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_muted: Option<bool>,
    /// Camera muted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_muted: Option<bool>,
    /// Incoming audio muted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deaf: Option<bool>,
    /// Shown in the layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Leg placed on hold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_hold: Option<bool>,
    /// Currently speaking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talking: Option<bool>,
    /// Hand raised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handraised: Option<bool>,
    /// Microphone gain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_volume: Option<f64>,
    /// Speaker volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_volume: Option<f64>,
    /// Noise-gate sensitivity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_sensitivity: Option<f64>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Wire names of the fields that changed (update events only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<String>,
    /// Fields this layer does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MemberPayload {
    /// The member id, whichever key carried it.
    pub fn member_id(&self) -> Option<&str> {
        self.member_id.as_deref().or(self.id.as_deref())
    }
}

/// A room session object nested in joined events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomSessionPayload {
    /// Room session id.
    #[serde(default)]
    pub id: Option<String>,
    /// Room session id under its explicit key.
    #[serde(default)]
    pub room_session_id: Option<String>,
    /// Room id.
    #[serde(default)]
    pub room_id: Option<String>,
    /// Room name.
    #[serde(default)]
    pub name: Option<String>,
    /// Initial roster.
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    /// Recordings already running when the session was joined.
    #[serde(default)]
    pub recordings: Vec<Value>,
    /// Playbacks already running when the session was joined.
    #[serde(default)]
    pub playbacks: Vec<Value>,
    /// Streams already running when the session was joined.
    #[serde(default)]
    pub streams: Vec<Value>,
    /// Anything else the server sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameters of a `*.joined` / `*.room.joined` / `*.room.subscribed` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionJoinedParams {
    /// Call leg being established.
    #[serde(default)]
    pub call_id: Option<String>,
    /// Call leg this one was promoted or transferred from.
    #[serde(default)]
    pub origin_call_id: Option<String>,
    /// Room session id.
    #[serde(default)]
    pub room_session_id: Option<String>,
    /// Room id.
    #[serde(default)]
    pub room_id: Option<String>,
    /// Our own member id in this leg.
    #[serde(default)]
    pub member_id: Option<String>,
    /// Media node.
    #[serde(default)]
    pub node_id: Option<String>,
    /// Flat roster, used by some namespaces instead of a nested room object.
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    /// Nested room session object.
    #[serde(default)]
    pub room_session: Option<RoomSessionPayload>,
    /// Legacy nested room object.
    #[serde(default)]
    pub room: Option<RoomSessionPayload>,
}

impl SessionJoinedParams {
    /// Decode from an event's params.
    pub fn parse(event_type: &str, params: &Value) -> Result<Self, ProtoError> {
        decode(event_type, params)
    }

    fn session(&self) -> Option<&RoomSessionPayload> {
        self.room_session.as_ref().or(self.room.as_ref())
    }

    /// Key identifying the leg: the call id, or the room session id for
    /// namespaces without call ids.
    pub fn segment_key(&self) -> Option<&str> {
        self.call_id.as_deref().or_else(|| self.room_session_id())
    }

    /// Room session id, from the top level or the nested room object.
    pub fn room_session_id(&self) -> Option<&str> {
        self.room_session_id.as_deref().or_else(|| {
            self.session().and_then(|s| s.room_session_id.as_deref().or(s.id.as_deref()))
        })
    }

    /// Room id, from the top level or the nested room object.
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref().or_else(|| self.session().and_then(|s| s.room_id.as_deref()))
    }

    /// Initial roster, wherever it was carried.
    pub fn members(&self) -> &[MemberPayload] {
        if !self.members.is_empty() {
            return &self.members;
        }
        self.session().map(|s| s.members.as_slice()).unwrap_or_default()
    }

    /// Our own member id; falls back to the first roster entry.
    pub fn self_member_id(&self) -> Option<&str> {
        self.member_id.as_deref().or_else(|| self.members().first().and_then(|m| m.member_id()))
    }

    /// Recordings, playbacks and streams already active at join time.
    pub fn active_entities(&self) -> (&[Value], &[Value], &[Value]) {
        match self.session() {
            Some(s) => (s.recordings.as_slice(), s.playbacks.as_slice(), s.streams.as_slice()),
            None => (&[], &[], &[]),
        }
    }
}

/// Parameters of `*.member.*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberEventParams {
    /// Call leg the event belongs to.
    #[serde(default)]
    pub call_id: Option<String>,
    /// Room session id.
    #[serde(default)]
    pub room_session_id: Option<String>,
    /// Room id.
    #[serde(default)]
    pub room_id: Option<String>,
    /// The member, partial on updates.
    pub member: MemberPayload,
}

impl MemberEventParams {
    /// Decode from an event's params, requiring a member id.
    pub fn parse(event_type: &str, params: &Value) -> Result<Self, ProtoError> {
        let parsed: Self = decode(event_type, params)?;
        if parsed.member.member_id().is_none() {
            return Err(ProtoError::MissingField {
                event_type: event_type.to_string(),
                field: "member.id",
            });
        }
        Ok(parsed)
    }

    /// Call leg the envelope addresses.
    ///
    /// The member object's own `call_id` names that member's leg, not ours, and
    /// is never used for routing.
    pub fn call_id(&self) -> Option<&str> {
        self.call_id.as_deref()
    }

    /// Room session id from the envelope, else from the member object.
    pub fn room_session_id(&self) -> Option<&str> {
        self.room_session_id.as_deref().or(self.member.room_session_id.as_deref())
    }
}

/// Parameters of a `*.left` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLeftParams {
    /// Call leg being torn down.
    #[serde(default)]
    pub call_id: Option<String>,
    /// Room session id.
    #[serde(default)]
    pub room_session_id: Option<String>,
    /// Server-supplied reason.
    #[serde(default)]
    pub reason: Option<String>,
}

impl SessionLeftParams {
    /// Decode from an event's params.
    pub fn parse(event_type: &str, params: &Value) -> Result<Self, ProtoError> {
        decode(event_type, params)
    }

    /// Key identifying the leg, as in [`SessionJoinedParams::segment_key`].
    pub fn segment_key(&self) -> Option<&str> {
        self.call_id.as_deref().or(self.room_session_id.as_deref())
    }
}

/// Pull the entity object (`recording`, `playback`, `stream`) out of a
/// lifecycle event, carrying the envelope's room session id into it.
pub fn entity_object(event_type: &str, params: &Value, key: &str) -> Result<Value, ProtoError> {
    let envelope = params.as_object().ok_or_else(|| ProtoError::MalformedPayload {
        event_type: event_type.to_string(),
        reason: "params is not an object".to_string(),
    })?;
    let mut entity = envelope
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| ProtoError::MissingField {
            event_type: event_type.to_string(),
            field: "entity",
        })?;
    if let Some(rs) = envelope.get("room_session_id") {
        entity.entry("room_session_id").or_insert_with(|| rs.clone());
    }
    Ok(Value::Object(entity))
}

fn decode<T: DeserializeOwned>(event_type: &str, params: &Value) -> Result<T, ProtoError> {
    if !params.is_object() {
        return Err(ProtoError::MalformedPayload {
            event_type: event_type.to_string(),
            reason: "params is not an object".to_string(),
        });
    }
    T::deserialize(params).map_err(|e| ProtoError::malformed(event_type, &e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn joined_params_flat_roster() {
        let params = json!({
            "call_id": "c1",
            "member_id": "m1",
            "node_id": "n1",
            "members": [{ "member_id": "m1" }, { "member_id": "m2", "audio_muted": true }]
        });
        let parsed = SessionJoinedParams::parse("call.joined", &params).unwrap();
        assert_eq!(parsed.segment_key(), Some("c1"));
        assert_eq!(parsed.self_member_id(), Some("m1"));
        assert_eq!(parsed.members().len(), 2);
        assert_eq!(parsed.members()[1].audio_muted, Some(true));
    }

    #[test]
    fn joined_params_nested_room_session() {
        let params = json!({
            "room_session": {
                "id": "rs-1",
                "room_id": "r-1",
                "members": [{ "id": "m9", "name": "nine" }],
                "recordings": [{ "id": "rec-1" }]
            }
        });
        let parsed = SessionJoinedParams::parse("video.room.joined", &params).unwrap();
        assert_eq!(parsed.segment_key(), Some("rs-1"));
        assert_eq!(parsed.room_id(), Some("r-1"));
        assert_eq!(parsed.self_member_id(), Some("m9"));
        assert_eq!(parsed.active_entities().0.len(), 1);
    }

    #[test]
    fn member_event_requires_an_id() {
        let params = json!({ "room_session_id": "rs", "member": { "audio_muted": true } });
        let err = MemberEventParams::parse("video.member.updated", &params).unwrap_err();
        assert!(matches!(err, ProtoError::MissingField { .. }));
    }

    #[test]
    fn member_event_ignores_the_member_call_id() {
        let params = json!({
            "room_session_id": "rs-1",
            "member": { "member_id": "m1", "call_id": "c7" }
        });
        let parsed = MemberEventParams::parse("member.joined", &params).unwrap();
        assert_eq!(parsed.call_id(), None);
        assert_eq!(parsed.member.call_id.as_deref(), Some("c7"));
        assert_eq!(parsed.room_session_id(), Some("rs-1"));
    }

    #[test]
    fn unknown_member_fields_are_kept() {
        let member: MemberPayload =
            serde_json::from_value(json!({ "id": "m1", "current_position": "auto" })).unwrap();
        assert_eq!(member.extra["current_position"], json!("auto"));
    }

    #[test]
    fn non_object_params_are_malformed() {
        let err = SessionLeftParams::parse("call.left", &json!([1, 2])).unwrap_err();
        assert!(matches!(err, ProtoError::MalformedPayload { .. }));
    }

    #[test]
    fn entity_object_inherits_room_session() {
        let params = json!({ "room_session_id": "rs-1", "recording": { "id": "rec-1" } });
        let entity = entity_object("video.recording.started", &params, "recording").unwrap();
        assert_eq!(entity["room_session_id"], json!("rs-1"));
    }
}
