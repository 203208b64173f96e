//! Recording transport.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use callsync_client::{RpcTransport, TransportError};
use callsync_proto::RpcRequest;
use serde_json::{Value, json};

/// Transport that records requests and replies without any I/O.
///
/// Successful replies echo the method: `{ "code": "200", "method": .. }`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<RpcRequest>>,
    failure: Mutex<Option<TransportError>>,
}

impl RecordingTransport {
    /// Transport that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every following request with `err` until [`Self::succeed`].
    pub fn fail_with(&self, err: TransportError) {
        *lock(&self.failure) = Some(err);
    }

    /// Stop failing requests.
    pub fn succeed(&self) {
        *lock(&self.failure) = None;
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RpcRequest> {
        lock(&self.requests).clone()
    }

    /// Most recent request.
    pub fn last(&self) -> Option<RpcRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Number of requests received.
    pub fn len(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Whether no request was received.
    pub fn is_empty(&self) -> bool {
        lock(&self.requests).is_empty()
    }

    /// Forget recorded requests.
    pub fn clear(&self) {
        lock(&self.requests).clear();
    }
}

#[async_trait]
impl RpcTransport for RecordingTransport {
    async fn execute(&self, request: RpcRequest) -> Result<Value, TransportError> {
        tracing::trace!(method = %request.method, "recording request");
        let method = request.method.clone();
        lock(&self.requests).push(request);
        match lock(&self.failure).clone() {
            Some(err) => Err(err),
            None => Ok(json!({ "code": "200", "method": method })),
        }
    }
}

// A panicking test thread must not hide the requests from the others.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
