//! JSON-lines trace format.
//!
//! Each non-blank line is one of:
//!
//! ```text
//! { "event_type": "call.joined", "params": { ... } }
//! { "command": { "method": "mute", "channel": "audio", "member_id": "m1" } }
//! ```
//!
//! Lines starting with `#` are comments.

use callsync_client::ActionRequest;
use callsync_proto::WireEvent;
use serde::Deserialize;
use serde_json::{Map, Value};

/// A command recorded in a trace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceCommand {
    /// Method, either fully qualified or a bare verb.
    pub method: String,
    /// Media channel.
    #[serde(default)]
    pub channel: Option<String>,
    /// Explicit target.
    #[serde(default)]
    pub member_id: Option<String>,
    /// Extra parameters.
    #[serde(default)]
    pub extra_params: Map<String, Value>,
}

impl TraceCommand {
    /// Build the action, qualifying bare verbs with `namespace`.
    pub fn to_action(&self, namespace: &str) -> ActionRequest {
        let method = if self.method.contains('.') {
            self.method.clone()
        } else {
            format!("{namespace}.{}", self.method)
        };
        let mut action = ActionRequest::new(method).target(self.member_id.as_deref());
        if let Some(channel) = &self.channel {
            action = action.channel(channel);
        }
        action.extra_params.extend(self.extra_params.clone());
        action
    }
}

/// One line of a trace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TraceLine {
    /// A command to issue.
    Command {
        /// The command.
        command: TraceCommand,
    },
    /// An inbound event.
    Event(WireEvent),
}

/// Decode a line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<TraceLine>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}
