//! Core error types.

use callsync_proto::ProtoError;
use thiserror::Error;

/// Errors from state operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An explicit member id is neither a self identity of any leg nor part of
    /// the current leg's roster.
    #[error("cannot resolve member {member_id}")]
    Resolution {
        /// The member id that could not be resolved.
        member_id: String,
    },

    /// No call leg has been joined yet.
    #[error("no call segment joined")]
    NotJoined,

    /// An event referenced a leg or member this state does not track.
    ///
    /// Expected under reconnects and duplicate delivery.
    #[error("state inconsistency: {reason}")]
    StateInconsistency {
        /// What did not match.
        reason: String,
    },

    /// A payload lacked an identifier required to build state.
    #[error("missing identity field: {field}")]
    MissingIdentity {
        /// Wire name of the missing identifier.
        field: &'static str,
    },

    /// An event type already has a transform.
    #[error("transform already registered for {event_type}")]
    DuplicateTransform {
        /// The event type registered twice.
        event_type: String,
    },

    /// A cached instance has a different type than the transform produces.
    #[error("cached instance for {type_name} has an unexpected type")]
    InstanceTypeMismatch {
        /// Transform type name.
        type_name: &'static str,
    },

    /// Payload decoding failed.
    #[error(transparent)]
    Proto(#[from] ProtoError),
}

impl CoreError {
    /// Returns true if this error indicates a bug or protocol violation.
    ///
    /// Transient errors are expected during normal operation (stale ids,
    /// reconnect races) and leave state untouched.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::DuplicateTransform { .. } | Self::InstanceTypeMismatch { .. } => true,

            Self::Resolution { .. }
            | Self::NotJoined
            | Self::StateInconsistency { .. }
            | Self::MissingIdentity { .. }
            | Self::Proto(_) => false,
        }
    }

    pub(crate) fn inconsistent(reason: impl Into<String>) -> Self {
        Self::StateInconsistency { reason: reason.into() }
    }
}
