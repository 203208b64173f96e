//! Property tests for roster updates and target resolution.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use callsync_client::{ActionRequest, Session, SessionConfig, SessionError, SessionNotice};
use callsync_harness::RecordingTransport;
use callsync_proto::WireEvent;
use proptest::prelude::*;
use serde_json::{Value, json};

const FIELDS: &[&str] = &["audio_muted", "video_muted", "deaf", "visible", "handraised"];

fn joined_session(roster: &[&str]) -> Session<RecordingTransport> {
    let transport = Arc::new(RecordingTransport::new());
    let mut session = Session::with_config(transport, SessionConfig::default());
    let members: Vec<Value> = roster.iter().map(|id| json!({ "member_id": id })).collect();
    session
        .handle(WireEvent::new(
            "call.joined",
            json!({ "call_id": "c1", "member_id": roster[0], "members": members }),
        ))
        .unwrap();
    session
}

fn update(member_id: &str, field: &str, value: bool) -> WireEvent {
    let mut member = json!({ "member_id": member_id });
    member[field] = Value::Bool(value);
    WireEvent::new("call.member.updated", json!({ "call_id": "c1", "member": member }))
}

proptest! {
    /// Replaying an update right after itself reports no change.
    #[test]
    fn prop_update_replay_is_noop(
        updates in prop::collection::vec((0..3usize, 0..FIELDS.len(), any::<bool>()), 1..20)
    ) {
        let roster = ["a", "b", "c"];
        let mut session = joined_session(&roster);

        for (member, field, value) in updates {
            let event = update(roster[member], FIELDS[field], value);
            session.handle(event.clone()).unwrap();
            let before = session.members();

            let notices = session.handle(event).unwrap();
            prop_assert!(!notices.iter().any(SessionNotice::is_roster_change));
            let SessionNotice::MemberUpdated { changed, .. } = &notices[0] else {
                panic!("expected update notice, got {:?}", notices[0]);
            };
            prop_assert!(changed.is_empty());
            prop_assert_eq!(session.members(), before);
        }
    }

    /// Only roster members and our own ids resolve.
    #[test]
    fn prop_resolution_matches_roster(
        roster in prop::collection::btree_set("[a-e]", 1..5),
        target in "[a-g]",
    ) {
        let roster: Vec<&str> = roster.iter().map(String::as_str).collect();
        let session = joined_session(&roster);

        let result = session.prepare_action(&ActionRequest::deaf("call", Some(&target)));
        if roster.contains(&target.as_str()) {
            let request = result.unwrap();
            let resolved = request.params["target"]["member_id"].as_str();
            prop_assert_eq!(resolved, Some(target.as_str()));
        } else {
            let is_resolution = matches!(result, Err(SessionError::Resolution { .. }));
            prop_assert!(is_resolution);
        }
    }
}
