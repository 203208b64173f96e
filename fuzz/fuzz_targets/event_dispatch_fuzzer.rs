//! Fuzz target for [`Session::handle`] event dispatch
//!
//! Keep the segment stack consistent under any inbound event sequence
//!
//! # Strategy
//!
//! - Structured operations: well-formed joins, leaves and roster events over a
//!   small id space, so transfer chains actually build up
//! - Raw events: every known event type (with and without namespace) carrying
//!   arbitrary JSON params
//! - Commands: identity resolution between events
//!
//! # Invariants
//!
//! - `handle` NEVER returns an error or panics with the default registry
//! - Every joined leg is either active or closed in the history
//! - Active call ids are unique
//! - `SegmentPushed` reports the depth the stack actually has
//! - Target member (when present) is the current leg's self; self member is
//!   the root leg's self
//! - A default-target command resolves iff some leg is active

#![no_main]

use std::{collections::HashSet, sync::Arc};

use arbitrary::Arbitrary;
use callsync_client::{ActionRequest, Session, SessionConfig, SessionNotice};
use callsync_harness::{Operation, RecordingTransport, model::operation::member_id};
use callsync_proto::WireEvent;
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Number, Value};

const NAMESPACES: &[&str] = &["", "call.", "video.", "voice."];

const EVENT_TYPES: &[&str] = &[
    "joined",
    "room.joined",
    "room.subscribed",
    "left",
    "member.joined",
    "member.left",
    "member.updated",
    "member.updated.audio_muted",
    "member.talking.started",
    "member.talking.ended",
    "recording.started",
    "recording.updated",
    "recording.ended",
    "playback.started",
    "playback.updated",
    "playback.ended",
    "stream.started",
    "stream.ended",
    "layout.changed",
    "room.ended",
];

#[derive(Debug, Clone, Arbitrary)]
enum FuzzValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Id(u8),
    Str(String),
    List(Vec<FuzzValue>),
    Object(Vec<(FuzzKey, FuzzValue)>),
}

/// Keys the payload decoders look at, plus anything else.
#[derive(Debug, Clone, Arbitrary)]
enum FuzzKey {
    Known(u8),
    Other(String),
}

const KNOWN_KEYS: &[&str] = &[
    "call_id",
    "member_id",
    "id",
    "room_session_id",
    "room_session",
    "room",
    "members",
    "member",
    "origin_call_id",
    "node_id",
    "recording",
    "playback",
    "stream",
    "recordings",
    "updated",
    "audio_muted",
    "talking",
    "__external",
];

impl FuzzKey {
    fn to_key(&self) -> String {
        match self {
            Self::Known(i) => KNOWN_KEYS[*i as usize % KNOWN_KEYS.len()].to_string(),
            Self::Other(s) => s.clone(),
        }
    }
}

impl FuzzValue {
    fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::Number((*n).into()),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            // collide with the ids structured operations use
            Self::Id(i) => Value::String(member_id(*i)),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(entries) => Value::Object(
                entries.iter().map(|(k, v)| (k.to_key(), v.to_json())).collect::<Map<_, _>>(),
            ),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzStep {
    Structured(Operation),
    Raw { namespace: u8, event_type: u8, params: FuzzValue },
    Command { target: Option<u8> },
}

fuzz_target!(|steps: Vec<FuzzStep>| {
    let transport = Arc::new(RecordingTransport::new());
    let mut session = Session::with_config(transport, SessionConfig::default());

    for step in steps {
        let event = match step {
            FuzzStep::Structured(Operation::Execute { target }) | FuzzStep::Command { target } => {
                let target = target.map(member_id);
                let action = ActionRequest::audio_mute("call", target.as_deref());
                let prepared = session.prepare_action(&action);
                if target.is_none() {
                    assert_eq!(prepared.is_ok(), session.depth() > 0);
                }
                None
            },
            FuzzStep::Structured(Operation::Teardown) => {
                session.teardown();
                assert_eq!(session.depth(), 0);
                assert!(session.history().is_empty());
                None
            },
            FuzzStep::Structured(op) => op.to_event(),
            FuzzStep::Raw { namespace, event_type, params } => {
                let namespace = NAMESPACES[namespace as usize % NAMESPACES.len()];
                let event_type = EVENT_TYPES[event_type as usize % EVENT_TYPES.len()];
                Some(WireEvent::new(format!("{namespace}{event_type}"), params.to_json()))
            },
        };

        if let Some(event) = event {
            let event_type = event.event_type.clone();
            let notices = match session.handle(event) {
                Ok(notices) => notices,
                Err(e) => panic!("{event_type} failed the session: {e}"),
            };
            for notice in &notices {
                if let SessionNotice::SegmentPushed { depth, .. } = notice {
                    assert_eq!(*depth, session.depth());
                }
            }
        }

        check_stack(&session);
    }
});

fn check_stack(session: &Session<RecordingTransport>) {
    let closed = session.history().iter().filter(|r| r.closed).count();
    assert_eq!(session.depth() + closed, session.history().len());

    let ids: HashSet<&str> = session.segments().map(|s| s.call_id()).collect();
    assert_eq!(ids.len(), session.depth(), "duplicate active leg");

    let segments: Vec<_> = session.segments().collect();
    if let (Some(target), Some(current)) = (session.target_member(), segments.last()) {
        assert_eq!(target.id, current.self_member_id());
    }
    if let (Some(me), Some(root)) = (session.self_member(), segments.first()) {
        assert_eq!(me.id, root.self_member_id());
    }
    if segments.is_empty() {
        assert!(session.target_member().is_none());
        assert!(session.members().is_empty());
    }
}
