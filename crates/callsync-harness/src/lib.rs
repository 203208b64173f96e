//! Test harness for the callsync session layer.
//!
//! - [`RecordingTransport`]: an in-memory transport that records every request
//!   and answers immediately, optionally with a scripted failure.
//! - [`wire`]: builders for the signaling events a server would send.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of segment and
//! roster tracking. Operations are applied to both the model and a real
//! `Session`, and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
mod transport;
pub mod wire;

pub use model::{
    LegId, MemberSlot, ModelLeg, ModelMember, ModelWorld, ObservableState, Operation,
    OperationError, OperationResult,
};
pub use transport::RecordingTransport;
