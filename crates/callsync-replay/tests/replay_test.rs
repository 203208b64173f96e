//! Replays the bundled traces end to end.

#![allow(clippy::unwrap_used)]

use callsync_client::SessionConfig;
use callsync_replay::{Replay, ReplayStats};

const TRANSFER: &str = include_str!("../traces/transfer.jsonl");

#[tokio::test]
async fn transfer_trace_replays_cleanly() {
    let config = SessionConfig { command_namespace: "video".to_string(), ..Default::default() };
    let mut replay = Replay::new(config);

    let stats = replay.run(TRANSFER.as_bytes()).await.unwrap();

    // `b` is on c1 only, so the deaf command issued from c2 cannot reach it
    assert_eq!(stats, ReplayStats { events: 7, ignored: 0, commands: 4, failed_commands: 1 });
    let session = replay.session();
    assert_eq!(session.depth(), 1);
    assert_eq!(session.history().len(), 2);
    assert!(session.history()[1].closed);
    assert_eq!(session.self_member().unwrap().id, "a");
    assert!(session.self_member().unwrap().talking);

    let roster: Vec<_> = session.members().into_iter().map(|m| m.id).collect();
    assert_eq!(roster, vec!["a"]);
    assert_eq!(session.transport().sent(), 3);
}
