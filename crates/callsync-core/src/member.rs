//! Member records.
//!
//! A [`Member`] is created from the first payload that mentions it and then
//! merged with every partial payload after that. [`Member::apply`] reports the
//! wire names of the fields whose value actually changed, so replaying the same
//! update twice reports nothing the second time.

use callsync_proto::{
    ExternalObject, MemberRef,
    naming::{self, ExternalValue},
    payloads::MemberPayload,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Member identifier.
pub type MemberId = String;

/// Identifiers a leg lends to members whose payload omits them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberScope {
    /// Call leg.
    pub call_id: Option<String>,
    /// Media node.
    pub node_id: Option<String>,
    /// Room.
    pub room_id: Option<String>,
    /// Room session.
    pub room_session_id: Option<String>,
}

/// A participant in one call leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    /// Member id, unique within a leg.
    pub id: MemberId,
    /// Call leg the member belongs to.
    pub call_id: Option<String>,
    /// Media node hosting the member.
    pub node_id: Option<String>,
    /// Room id.
    pub room_id: Option<String>,
    /// Room session id.
    pub room_session_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Member type (`member`, `screen`, `device`).
    #[serde(rename = "type")]
    pub member_type: Option<String>,
    /// Parent member for screen shares and devices.
    pub parent_id: Option<String>,
    /// Microphone muted.
    pub audio_muted: bool,
    /// Camera muted.
    pub video_muted: bool,
    /// Incoming audio muted.
    pub deaf: bool,
    /// Shown in the layout.
    pub visible: bool,
    /// Leg on hold.
    pub on_hold: bool,
    /// Currently speaking.
    pub talking: bool,
    /// Hand raised.
    pub handraised: bool,
    /// Microphone gain.
    pub input_volume: f64,
    /// Speaker volume.
    pub output_volume: f64,
    /// Noise-gate sensitivity.
    pub input_sensitivity: f64,
    /// Free-form metadata.
    pub meta: Option<Value>,
    /// Attributes not modelled above, as last received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Member {
    /// Empty member with only an id and the leg's identifiers.
    pub fn new(id: impl Into<MemberId>, scope: &MemberScope) -> Self {
        Self {
            id: id.into(),
            call_id: scope.call_id.clone(),
            node_id: scope.node_id.clone(),
            room_id: scope.room_id.clone(),
            room_session_id: scope.room_session_id.clone(),
            name: None,
            member_type: None,
            parent_id: None,
            audio_muted: false,
            video_muted: false,
            deaf: false,
            visible: false,
            on_hold: false,
            talking: false,
            handraised: false,
            input_volume: 0.0,
            output_volume: 0.0,
            input_sensitivity: 0.0,
            meta: None,
            extra: Map::new(),
        }
    }

    /// Build a member from a full payload. Returns `None` without an id.
    pub fn from_payload(payload: &MemberPayload, scope: &MemberScope) -> Option<Self> {
        let mut member = Self::new(payload.member_id()?, scope);
        member.apply(payload);
        Some(member)
    }

    /// Merge a partial payload, returning the wire names of changed fields.
    pub fn apply(&mut self, payload: &MemberPayload) -> Vec<String> {
        let mut changed = Vec::new();

        merge(&mut self.call_id, payload.call_id.clone().map(Some), "call_id", &mut changed);
        merge(&mut self.node_id, payload.node_id.clone().map(Some), "node_id", &mut changed);
        merge(&mut self.room_id, payload.room_id.clone().map(Some), "room_id", &mut changed);
        let room_session_id = payload.room_session_id.clone().map(Some);
        merge(&mut self.room_session_id, room_session_id, "room_session_id", &mut changed);
        merge(&mut self.name, payload.name.clone().map(Some), "name", &mut changed);
        merge(&mut self.member_type, payload.member_type.clone().map(Some), "type", &mut changed);
        merge(&mut self.parent_id, payload.parent_id.clone().map(Some), "parent_id", &mut changed);
        merge(&mut self.audio_muted, payload.audio_muted, "audio_muted", &mut changed);
        merge(&mut self.video_muted, payload.video_muted, "video_muted", &mut changed);
        merge(&mut self.deaf, payload.deaf, "deaf", &mut changed);
        merge(&mut self.visible, payload.visible, "visible", &mut changed);
        merge(&mut self.on_hold, payload.on_hold, "on_hold", &mut changed);
        merge(&mut self.talking, payload.talking, "talking", &mut changed);
        merge(&mut self.handraised, payload.handraised, "handraised", &mut changed);
        merge(&mut self.input_volume, payload.input_volume, "input_volume", &mut changed);
        merge(&mut self.output_volume, payload.output_volume, "output_volume", &mut changed);
        let sensitivity = payload.input_sensitivity;
        merge(&mut self.input_sensitivity, sensitivity, "input_sensitivity", &mut changed);
        merge(&mut self.meta, payload.meta.clone().map(Some), "meta", &mut changed);

        for (key, value) in &payload.extra {
            if self.extra.get(key) != Some(value) {
                self.extra.insert(key.clone(), value.clone());
                changed.push(key.clone());
            }
        }

        changed
    }

    /// Identity descriptor for commands, falling back to the leg's ids.
    pub fn as_ref_in(&self, scope: &MemberScope) -> MemberRef {
        MemberRef {
            member_id: self.id.clone(),
            call_id: self.call_id.clone().or_else(|| scope.call_id.clone()).unwrap_or_default(),
            node_id: self.node_id.clone().or_else(|| scope.node_id.clone()).unwrap_or_default(),
        }
    }

    /// Wire-cased JSON of this member.
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// External (camel-cased) view of this member.
    pub fn to_external(&self) -> ExternalObject {
        match naming::to_external(&self.to_wire()) {
            ExternalValue::Object(map) => map,
            _ => ExternalObject::new(),
        }
    }
}

fn merge<T: PartialEq>(slot: &mut T, incoming: Option<T>, field: &str, changed: &mut Vec<String>) {
    if let Some(value) = incoming {
        if *slot != value {
            *slot = value;
            changed.push(field.to_string());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> MemberPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn from_payload_requires_id() {
        let scope = MemberScope::default();
        assert!(Member::from_payload(&payload(json!({ "name": "x" })), &scope).is_none());
    }

    #[test]
    fn scope_fills_missing_identifiers() {
        let scope = MemberScope { call_id: Some("c1".to_string()), ..MemberScope::default() };
        let member = Member::from_payload(&payload(json!({ "member_id": "m1" })), &scope).unwrap();
        assert_eq!(member.call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn apply_reports_only_changes() {
        let scope = MemberScope::default();
        let mut member = Member::new("m1", &scope);

        let update = payload(json!({ "id": "m1", "audio_muted": true, "visible": false }));
        assert_eq!(member.apply(&update), vec!["audio_muted".to_string()]);
        assert!(member.apply(&update).is_empty());
    }

    #[test]
    fn unknown_fields_merge_into_extra() {
        let scope = MemberScope::default();
        let mut member = Member::new("m1", &scope);
        let update = payload(json!({ "id": "m1", "current_position": "reserved-1" }));
        assert_eq!(member.apply(&update), vec!["current_position".to_string()]);
        assert_eq!(member.extra["current_position"], json!("reserved-1"));
    }

    #[test]
    fn as_ref_prefers_member_ids() {
        let scope = MemberScope {
            call_id: Some("c-scope".to_string()),
            node_id: Some("n-scope".to_string()),
            ..MemberScope::default()
        };
        let mut member = Member::new("m1", &scope);
        member.node_id = Some("n-own".to_string());
        let r = member.as_ref_in(&scope);
        assert_eq!(r.call_id, "c-scope");
        assert_eq!(r.node_id, "n-own");
    }

    #[test]
    fn external_view_is_camel_cased() {
        let member = Member::new("m1", &MemberScope::default());
        let external = member.to_external();
        assert!(external.contains_key("audioMuted"));
        assert!(external.contains_key("inputSensitivity"));
        assert!(!external.contains_key("audio_muted"));
    }
}
