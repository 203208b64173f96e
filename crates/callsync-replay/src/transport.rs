//! Transport that logs requests instead of sending them.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use callsync_client::{RpcTransport, TransportError};
use callsync_proto::RpcRequest;
use serde_json::{Value, json};

/// Acknowledges every request with `{}`.
#[derive(Debug, Default)]
pub struct LoggingTransport {
    sent: AtomicUsize,
}

impl LoggingTransport {
    /// Fresh transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests executed so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RpcTransport for LoggingTransport {
    async fn execute(&self, request: RpcRequest) -> Result<Value, TransportError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!(method = %request.method, params = %request.params, "rpc");
        Ok(json!({}))
    }
}
