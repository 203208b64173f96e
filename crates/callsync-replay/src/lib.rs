//! Trace replay for the callsync session layer.
//!
//! Feeds a recorded JSON-lines signaling trace through a [`Session`] whose
//! transport only logs, so transfer chains and roster bugs seen in the field
//! can be reproduced offline. See [`trace`] for the line format.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod trace;
mod transport;

use std::{io::BufRead, sync::Arc};

use callsync_client::{Session, SessionConfig, SessionNotice};

pub use error::ReplayError;
pub use trace::{TraceCommand, TraceLine};
pub use transport::LoggingTransport;

/// Counters for one replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    /// Events handled.
    pub events: usize,
    /// Events the session dropped.
    pub ignored: usize,
    /// Commands issued.
    pub commands: usize,
    /// Commands that failed.
    pub failed_commands: usize,
}

/// A session driven from a trace.
pub struct Replay {
    session: Session<LoggingTransport>,
    stats: ReplayStats,
}

impl Replay {
    /// Replay into a fresh session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            session: Session::with_config(Arc::new(LoggingTransport::new()), config),
            stats: ReplayStats::default(),
        }
    }

    /// The replayed session.
    pub fn session(&self) -> &Session<LoggingTransport> {
        &self.session
    }

    /// Counters so far.
    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    /// Replay every line of `reader`.
    ///
    /// # Errors
    ///
    /// Stops at the first unreadable or undecodable line, or at a fatal
    /// session error. Ignored events and failed commands do not stop it.
    pub async fn run<R: BufRead>(&mut self, reader: R) -> Result<ReplayStats, ReplayError> {
        for (index, line) in reader.lines().enumerate() {
            self.apply_line(index + 1, &line?).await?;
        }
        Ok(self.stats)
    }

    /// Replay one line.
    pub async fn apply_line(&mut self, number: usize, line: &str) -> Result<(), ReplayError> {
        let parsed = trace::parse_line(line)
            .map_err(|source| ReplayError::Parse { line: number, source })?;

        match parsed {
            None => Ok(()),
            Some(TraceLine::Event(event)) => {
                self.stats.events += 1;
                let notices = self
                    .session
                    .handle(event)
                    .map_err(|source| ReplayError::Session { line: number, source })?;
                for notice in &notices {
                    if matches!(notice, SessionNotice::Ignored { .. }) {
                        self.stats.ignored += 1;
                    }
                    tracing::debug!(line = number, ?notice, "notice");
                }
                Ok(())
            },
            Some(TraceLine::Command { command }) => {
                self.stats.commands += 1;
                let action = command.to_action(&self.session.config().command_namespace);
                if let Err(e) = self.session.execute_action(action).await {
                    self.stats.failed_commands += 1;
                    let method = command.method.as_str();
                    tracing::warn!(line = number, method, error = %e, "command failed");
                }
                Ok(())
            },
        }
    }

    /// Log the final stack, identities and roster.
    pub fn log_summary(&self) {
        let stack: Vec<&str> = self.session.segments().map(|s| s.call_id()).collect();
        tracing::info!(
            ?stack,
            self_member = ?self.session.self_member().map(|m| m.id.as_str()),
            target_member = ?self.session.target_member().map(|m| m.id.as_str()),
            history = self.session.history().len(),
            sent = self.session.transport().sent(),
            stats = ?self.stats,
            "replay finished"
        );
        for member in self.session.members() {
            tracing::info!(member = %member.to_wire(), "roster");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TRACE: &str = r#"
# root leg
{"event_type":"call.joined","params":{"call_id":"c1","member_id":"a","members":[{"member_id":"a"}]}}
{"event_type":"call.joined","params":{"call_id":"c2","member_id":"b","members":[{"member_id":"b"},{"member_id":"c"}]}}
{"command":{"method":"mute","channel":"audio","member_id":"c"}}
{"command":{"method":"mute","member_id":"zz"}}
{"event_type":"call.left","params":{"call_id":"c1"}}
{"event_type":"call.left","params":{"call_id":"c2"}}
"#;

    #[tokio::test]
    async fn replays_a_transfer() {
        let mut replay = Replay::new(SessionConfig::default());
        let stats = replay.run(TRACE.as_bytes()).await.unwrap();

        assert_eq!(
            stats,
            ReplayStats { events: 4, ignored: 1, commands: 2, failed_commands: 1 }
        );
        assert_eq!(replay.session().depth(), 1);
        assert_eq!(replay.session().target_member().unwrap().id, "a");
        assert_eq!(replay.session().transport().sent(), 1);
        replay.log_summary();
    }

    #[tokio::test]
    async fn reports_the_bad_line() {
        let mut replay = Replay::new(SessionConfig::default());
        let trace = "{\"event_type\":\"call.left\",\"params\":{}}\nnot json\n";
        let err = replay.run(trace.as_bytes()).await.unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }
}
