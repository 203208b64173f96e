//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding wire payloads.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// The `params` object does not match the shape its event family requires.
    #[error("malformed {event_type} payload: {reason}")]
    MalformedPayload {
        /// Event type whose payload failed to decode.
        event_type: String,
        /// Description of the decoding failure.
        reason: String,
    },

    /// A required identifier was absent from the payload.
    #[error("{event_type} payload is missing {field}")]
    MissingField {
        /// Event type whose payload is incomplete.
        event_type: String,
        /// Wire name of the missing field.
        field: &'static str,
    },
}

impl ProtoError {
    /// Build a [`ProtoError::MalformedPayload`] from a serde failure.
    pub fn malformed(event_type: &str, err: &serde_json::Error) -> Self {
        Self::MalformedPayload { event_type: event_type.to_string(), reason: err.to_string() }
    }
}
