//! Event transforms.
//!
//! A transform describes how one kind of wire entity (room session, member,
//! recording, ...) becomes an external-facing value: which behavior handle to
//! build for it, how to convert its payload, and how to derive the event
//! namespace and channel that handle listens on.
//!
//! [`TransformRegistry`] maps event-type strings to a [`TransformKind`]. The
//! mapping is fixed once registered; registering the same event type twice is
//! an error rather than a silent override.

use std::collections::HashMap;

use callsync_proto::{ConversionOptions, ExternalObject, ExternalValue, WireEvent, naming};
use serde_json::Value;

use crate::CoreError;

/// Kinds of entity a transform produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// A joined room session.
    RoomSession,
    /// A room member.
    Member,
    /// A room recording.
    Recording,
    /// A media playback.
    Playback,
    /// An outbound stream.
    Stream,
}

impl TransformKind {
    /// Every kind, in registration order.
    pub const ALL: [Self; 5] =
        [Self::RoomSession, Self::Member, Self::Recording, Self::Playback, Self::Stream];

    /// Stable type name, used as the first half of an instance cache key.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::RoomSession => "roomSession",
            Self::Member => "member",
            Self::Recording => "recording",
            Self::Playback => "playback",
            Self::Stream => "stream",
        }
    }

    /// Key of the entity object inside the event params, for kinds that nest it.
    pub const fn params_key(self) -> Option<&'static str> {
        match self {
            Self::RoomSession => None,
            Self::Member => Some("member"),
            Self::Recording => Some("recording"),
            Self::Playback => Some("playback"),
            Self::Stream => Some("stream"),
        }
    }
}

/// Turns a raw wire entity into a behavior handle plus external payload.
pub trait EventTransform: Send + Sync {
    /// Behavior handle shared by every view of one entity.
    type Instance: Send + Sync + 'static;

    /// Which kind of entity this transform handles.
    fn kind(&self) -> TransformKind;

    /// Identity of the entity within its kind.
    fn entity_id(&self, raw: &Value) -> Option<String> {
        raw.get("id").and_then(Value::as_str).map(str::to_string)
    }

    /// Build the behavior handle. Only called the first time an entity is seen.
    fn instance(&self, raw: &Value) -> Self::Instance;

    /// Convert the raw payload into the external snapshot.
    fn payload(&self, raw: &Value, options: &ConversionOptions) -> ExternalObject {
        match naming::to_external_with(raw, options) {
            ExternalValue::Object(map) => map,
            _ => ExternalObject::new(),
        }
    }

    /// Event namespace the handle's events are scoped to.
    fn namespace(&self, _raw: &Value) -> Option<String> {
        None
    }

    /// Channel the handle's events are delivered on.
    fn channel(&self, _raw: &Value) -> Option<String> {
        None
    }
}

/// Event type → transform kind.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    by_event: HashMap<String, TransformKind>,
}

impl TransformRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in event types.
    ///
    /// Event types are registered without a namespace prefix; lookups strip
    /// one when the full type is not registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults = [
            ("joined", TransformKind::RoomSession),
            ("room.joined", TransformKind::RoomSession),
            ("room.subscribed", TransformKind::RoomSession),
            ("member.joined", TransformKind::Member),
            ("member.updated", TransformKind::Member),
            ("member.left", TransformKind::Member),
            ("member.talking", TransformKind::Member),
        ];
        for (event_type, kind) in defaults {
            registry.by_event.insert(event_type.to_string(), kind);
        }
        for kind in [TransformKind::Recording, TransformKind::Playback, TransformKind::Stream] {
            for phase in ["started", "updated", "ended"] {
                registry.by_event.insert(format!("{}.{phase}", kind.type_name()), kind);
            }
        }
        registry
    }

    /// Register an event type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DuplicateTransform` if the type is already mapped.
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        kind: TransformKind,
    ) -> Result<(), CoreError> {
        let event_type = event_type.into();
        if self.by_event.contains_key(&event_type) {
            return Err(CoreError::DuplicateTransform { event_type });
        }
        tracing::trace!(event_type, kind = kind.type_name(), "transform registered");
        self.by_event.insert(event_type, kind);
        Ok(())
    }

    /// Transform kind for an event, trying the full type first and then the
    /// type without its namespace.
    pub fn lookup(&self, event: &WireEvent) -> Option<TransformKind> {
        if let Some(kind) = self.lookup_bare(&event.event_type) {
            return Some(kind);
        }
        let namespace = event.namespace()?;
        let bare = event.event_type.strip_prefix(namespace)?.strip_prefix('.')?;
        self.lookup_bare(bare)
    }

    fn lookup_bare(&self, event_type: &str) -> Option<TransformKind> {
        if let Some(kind) = self.by_event.get(event_type) {
            return Some(*kind);
        }
        // per-field member updates share the member transform
        event_type.starts_with("member.updated.").then_some(TransformKind::Member)
    }

    /// Number of registered event types.
    pub fn len(&self) -> usize {
        self.by_event.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_event.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_cover_entity_lifecycles() {
        let registry = TransformRegistry::with_defaults();
        let lookup = |t: &str| registry.lookup(&WireEvent::new(t, json!({})));

        assert_eq!(lookup("video.recording.started"), Some(TransformKind::Recording));
        assert_eq!(lookup("video.playback.ended"), Some(TransformKind::Playback));
        assert_eq!(lookup("call.stream.updated"), Some(TransformKind::Stream));
        assert_eq!(lookup("video.room.subscribed"), Some(TransformKind::RoomSession));
        assert_eq!(lookup("member.joined"), Some(TransformKind::Member));
        assert_eq!(lookup("video.member.updated.audio_muted"), Some(TransformKind::Member));
        assert_eq!(lookup("video.layout.changed"), None);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = TransformRegistry::with_defaults();
        let before = registry.len();
        let err = registry.register("recording.started", TransformKind::Playback).unwrap_err();

        assert!(matches!(err, CoreError::DuplicateTransform { .. }));
        assert_eq!(registry.len(), before);
        assert_eq!(
            registry.lookup(&WireEvent::new("recording.started", json!({}))),
            Some(TransformKind::Recording)
        );
    }

    #[test]
    fn full_type_wins_over_bare() {
        let mut registry = TransformRegistry::with_defaults();
        registry.register("video.recording.started", TransformKind::Stream).unwrap();
        let event = WireEvent::new("video.recording.started", json!({}));
        assert_eq!(registry.lookup(&event), Some(TransformKind::Stream));
    }

    #[test]
    fn type_names_are_distinct() {
        let mut names: Vec<_> = TransformKind::ALL.iter().map(|k| k.type_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TransformKind::ALL.len());
    }
}
