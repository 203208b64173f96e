//! Call session for the callsync signaling layer.
//!
//! [`Session`] owns all call state for one client: it consumes inbound
//! signaling events in delivery order, keeps the segment stack and rosters
//! consistent, and turns commands into RPC requests addressed to the right
//! leg and participant.
//!
//! # Architecture
//!
//! ```text
//! transport ─ WireEvent ─▶ Session::handle ─▶ SegmentTracker / MemberRegistry
//!                               │                      │
//!                               ▼                      ▼
//!                         SessionNotice          InstanceCache
//!
//! caller ─ ActionRequest ─▶ Session::execute_action ─ RpcRequest ─▶ RpcTransport
//! ```
//!
//! Event handling is synchronous. Command futures are independent of the
//! session once created, so several may be in flight while events keep
//! arriving.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod event;
pub mod executor;
pub mod handles;
mod session;
mod transport;

pub use config::{DEFAULT_COMMAND_NAMESPACE, DEFAULT_NOTIFICATION_CAPACITY, SessionConfig};
pub use error::SessionError;
pub use event::{RosterSnapshot, SessionNotice};
pub use executor::ActionRequest;
pub use session::Session;
pub use transport::{RpcTransport, TransportError};
