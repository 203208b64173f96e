//! Transport seam.
//!
//! The session never talks to the network itself. It hands fully-built
//! [`RpcRequest`]s to an [`RpcTransport`] and returns whatever comes back.
//! Request correlation, retries and reconnects live behind this trait.

use async_trait::async_trait;
use callsync_proto::RpcRequest;
use serde_json::Value;
use thiserror::Error;

/// Executes outbound RPC requests.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Submit a request and wait for its result object.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on network, auth or server-side failure.
    async fn execute(&self, request: RpcRequest) -> Result<Value, TransportError>;
}

/// Failures reported by the transport.
///
/// The session does not interpret these; they reach the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with an error.
    #[error("rpc {method} rejected ({code}): {message}")]
    Rejected {
        /// Method that was rejected.
        method: String,
        /// Server error code.
        code: String,
        /// Server error message.
        message: String,
    },

    /// The connection is down or the request could not be sent.
    #[error("transport unavailable: {reason}")]
    Unavailable {
        /// Why the request could not be delivered.
        reason: String,
    },

    /// No response arrived in time.
    #[error("rpc {method} timed out")]
    Timeout {
        /// Method that timed out.
        method: String,
    },
}

impl TransportError {
    /// Returns true if retrying the same request cannot succeed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Rejected { .. } => true,
            Self::Unavailable { .. } | Self::Timeout { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_fatal() {
        let err = TransportError::Rejected {
            method: "call.mute".to_string(),
            code: "403".to_string(),
            message: "forbidden".to_string(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "rpc call.mute rejected (403): forbidden");
    }

    #[test]
    fn timeout_is_transient() {
        assert!(!TransportError::Timeout { method: "call.end".to_string() }.is_fatal());
    }
}
