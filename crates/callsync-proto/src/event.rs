//! Inbound signaling records.
//!
//! The transport hands over events already demultiplexed from the wire
//! protocol, one at a time and in delivery order. An event type is a dotted
//! string such as `call.joined`, `video.member.updated.audio_muted` or
//! `member.left`; the leading namespace (`call`, `video`, ...) is optional and
//! does not influence classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Words that open a family rather than a namespace.
const FAMILY_WORDS: &[&str] = &["member", "room", "recording", "playback", "stream", "layout"];

/// A single signaling record as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Dotted event type, e.g. `call.member.joined`.
    pub event_type: String,
    /// Raw event parameters in wire casing.
    #[serde(default)]
    pub params: Value,
}

impl WireEvent {
    /// Create an event from a type string and its parameters.
    pub fn new(event_type: impl Into<String>, params: Value) -> Self {
        Self { event_type: event_type.into(), params }
    }

    /// Classify this event's type.
    pub fn family(&self) -> EventFamily {
        EventFamily::classify(&self.event_type)
    }

    /// Leading namespace of the event type, if it has one.
    ///
    /// `video.member.joined` yields `video`; `member.joined` yields `None`.
    pub fn namespace(&self) -> Option<&str> {
        let mut parts = self.event_type.split('.');
        let first = parts.next()?;
        parts.next()?;
        if FAMILY_WORDS.contains(&first) { None } else { Some(first) }
    }
}

/// Lifecycle phase of a recording, playback or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// The entity began.
    Started,
    /// One or more of the entity's attributes changed.
    Updated,
    /// The entity finished.
    Ended,
}

impl Lifecycle {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "started" => Some(Self::Started),
            "updated" => Some(Self::Updated),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// Event families this layer understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventFamily {
    /// Segment bootstrap: `*.joined`, `*.room.joined`, `*.room.subscribed`.
    SessionJoined,
    /// Segment teardown: `*.left` (excluding member departures).
    SessionLeft,
    /// A member entered the roster.
    MemberJoined,
    /// A member left the roster.
    MemberLeft,
    /// A member's attributes changed.
    ///
    /// Per-field variants (`member.updated.audio_muted`) carry the field.
    MemberUpdated {
        /// Wire name of the single field this variant targets.
        field: Option<String>,
    },
    /// Talking indicator for a member.
    MemberTalking,
    /// Recording lifecycle.
    Recording(Lifecycle),
    /// Playback lifecycle.
    Playback(Lifecycle),
    /// Outbound stream lifecycle.
    Stream(Lifecycle),
    /// Layout change, consumed by rendering code outside this layer.
    LayoutChanged,
    /// Anything else.
    Unknown,
}

impl EventFamily {
    /// Classify a dotted event type.
    pub fn classify(event_type: &str) -> Self {
        let parts: Vec<&str> = event_type.split('.').filter(|p| !p.is_empty()).collect();

        if let Some(pos) = parts.iter().position(|p| *p == "member") {
            return match &parts[pos + 1..] {
                ["joined"] => Self::MemberJoined,
                ["left"] => Self::MemberLeft,
                ["updated"] => Self::MemberUpdated { field: None },
                ["updated", field] => Self::MemberUpdated { field: Some((*field).to_string()) },
                ["talking", ..] => Self::MemberTalking,
                _ => Self::Unknown,
            };
        }

        for (word, build) in [
            ("recording", Self::Recording as fn(Lifecycle) -> Self),
            ("playback", Self::Playback),
            ("stream", Self::Stream),
        ] {
            if let Some(pos) = parts.iter().position(|p| *p == word) {
                return match parts.get(pos + 1).copied().and_then(Lifecycle::parse) {
                    Some(phase) if parts.len() == pos + 2 => build(phase),
                    _ => Self::Unknown,
                };
            }
        }

        match parts.as_slice() {
            [.., "layout", "changed"] => Self::LayoutChanged,
            [.., "joined"] | [.., "room", "subscribed"] => Self::SessionJoined,
            [.., "left"] => Self::SessionLeft,
            _ => Self::Unknown,
        }
    }

    /// Whether events of this family mutate a roster.
    pub fn touches_roster(&self) -> bool {
        matches!(
            self,
            Self::MemberJoined | Self::MemberLeft | Self::MemberUpdated { .. } | Self::MemberTalking
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn classifies_session_families() {
        assert_eq!(EventFamily::classify("call.joined"), EventFamily::SessionJoined);
        assert_eq!(EventFamily::classify("video.room.joined"), EventFamily::SessionJoined);
        assert_eq!(EventFamily::classify("video.room.subscribed"), EventFamily::SessionJoined);
        assert_eq!(EventFamily::classify("call.left"), EventFamily::SessionLeft);
    }

    #[test]
    fn member_left_is_not_session_left() {
        assert_eq!(EventFamily::classify("call.member.left"), EventFamily::MemberLeft);
        assert_eq!(EventFamily::classify("member.left"), EventFamily::MemberLeft);
    }

    #[test]
    fn classifies_per_field_updates() {
        assert_eq!(
            EventFamily::classify("video.member.updated.audio_muted"),
            EventFamily::MemberUpdated { field: Some("audio_muted".to_string()) }
        );
        assert_eq!(
            EventFamily::classify("member.updated"),
            EventFamily::MemberUpdated { field: None }
        );
    }

    #[test]
    fn classifies_entity_lifecycles() {
        assert_eq!(
            EventFamily::classify("video.recording.started"),
            EventFamily::Recording(Lifecycle::Started)
        );
        assert_eq!(
            EventFamily::classify("video.playback.ended"),
            EventFamily::Playback(Lifecycle::Ended)
        );
        assert_eq!(
            EventFamily::classify("call.stream.updated"),
            EventFamily::Stream(Lifecycle::Updated)
        );
        assert_eq!(EventFamily::classify("video.recording.exploded"), EventFamily::Unknown);
    }

    #[test]
    fn unknown_and_layout() {
        assert_eq!(EventFamily::classify("video.layout.changed"), EventFamily::LayoutChanged);
        assert_eq!(EventFamily::classify("chat.message"), EventFamily::Unknown);
        assert_eq!(EventFamily::classify(""), EventFamily::Unknown);
    }

    #[test]
    fn namespace_is_optional() {
        assert_eq!(WireEvent::new("video.member.joined", json!({})).namespace(), Some("video"));
        assert_eq!(WireEvent::new("member.joined", json!({})).namespace(), None);
        assert_eq!(WireEvent::new("joined", json!({})).namespace(), None);
    }

    #[test]
    fn params_default_to_null() {
        let event: WireEvent = serde_json::from_str(r#"{"event_type":"call.left"}"#).unwrap();
        assert_eq!(event.params, Value::Null);
    }
}
