//! Session error types.

use callsync_core::CoreError;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A command named a member that is neither one of our own identities nor
    /// on the current leg's roster. Raised before anything is sent.
    #[error("cannot resolve member {member_id}")]
    Resolution {
        /// The member id that could not be resolved.
        member_id: String,
    },

    /// A command was issued before any call leg was joined.
    #[error("no call segment joined")]
    NotJoined,

    /// The transport rejected or failed the request.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// State could not be updated.
    #[error(transparent)]
    Core(CoreError),
}

impl SessionError {
    /// Returns true if this error indicates a bug or protocol violation.
    ///
    /// Resolution and not-joined errors are caller mistakes against current
    /// state and are always transient.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Resolution { .. } | Self::NotJoined => false,
            Self::Transport(e) => e.is_fatal(),
            Self::Core(e) => e.is_fatal(),
        }
    }
}

impl From<CoreError> for SessionError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Resolution { member_id } => Self::Resolution { member_id },
            CoreError::NotJoined => Self::NotJoined,
            other => Self::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_resolution_maps_to_session_resolution() {
        let err = SessionError::from(CoreError::Resolution { member_id: "z".to_string() });
        assert!(matches!(err, SessionError::Resolution { ref member_id } if member_id == "z"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn transport_errors_pass_through() {
        let inner = TransportError::Unavailable { reason: "socket closed".to_string() };
        let err = SessionError::from(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
    }

    #[test]
    fn duplicate_transform_is_fatal() {
        let err = SessionError::from(CoreError::DuplicateTransform {
            event_type: "call.joined".to_string(),
        });
        assert!(err.is_fatal());
    }
}
