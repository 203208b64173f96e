//! Fuzz target comparing [`Session`] against the reference model
//!
//! Same oracle as the model-based property test, driven by coverage instead
//! of proptest strategies
//!
//! # Invariants
//!
//! - Every operation has the same outcome in the model and the session
//! - Observable state (legs, rosters, self/target) matches after every step

#![no_main]

use std::sync::Arc;

use callsync_client::{ActionRequest, Session, SessionConfig, SessionError, SessionNotice};
use callsync_harness::{
    ModelWorld, ObservableState, Operation, OperationError, OperationResult, RecordingTransport,
    model::operation::member_id,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|ops: Vec<Operation>| {
    let mut model = ModelWorld::new();
    let transport = Arc::new(RecordingTransport::new());
    let mut session = Session::with_config(transport, SessionConfig::default());

    for op in &ops {
        let expected = model.apply(op);
        let actual = apply(&mut session, op);
        assert_eq!(expected, actual, "divergence on {op:?}");
        assert_eq!(model.observable_state(), observe(&session));
    }
});

fn apply(session: &mut Session<RecordingTransport>, op: &Operation) -> OperationResult {
    if let Some(event) = op.to_event() {
        let notices = session.handle(event).unwrap_or_default();
        return match notices.first() {
            Some(SessionNotice::Ignored { .. }) | None => OperationResult::Ignored,
            Some(_) => OperationResult::Applied,
        };
    }

    match op {
        Operation::Execute { target } => {
            let target = target.map(member_id);
            let action = ActionRequest::audio_mute("call", target.as_deref());
            match session.prepare_action(&action) {
                Ok(request) => OperationResult::Sent {
                    member_id: request.params["target"]["member_id"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    call_id: request.params["target"]["call_id"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                },
                Err(SessionError::NotJoined) => OperationResult::Failed(OperationError::NotJoined),
                Err(_) => OperationResult::Failed(OperationError::Unresolved),
            }
        },
        _ => {
            session.teardown();
            OperationResult::Applied
        },
    }
}

fn observe(session: &Session<RecordingTransport>) -> ObservableState {
    ObservableState {
        legs: session
            .segments()
            .map(|s| (s.call_id().to_string(), s.self_member_id().to_string()))
            .collect(),
        rosters: session
            .segments()
            .map(|s| s.roster().iter().map(|m| (m.id.clone(), m.audio_muted)).collect())
            .collect(),
        self_member: session.self_member().map(|m| m.id.clone()),
        target_member: session.target_member().map(|m| m.id.clone()),
    }
}
