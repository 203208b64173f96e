//! Wire-level types for the callsync signaling layer.
//!
//! This crate knows nothing about call state. It describes what arrives from
//! the transport and what leaves through it:
//!
//! - [`WireEvent`]: an ordered, already-demultiplexed signaling record
//! - [`EventFamily`]: classification of an event type string
//! - [`payloads`]: typed views over the `params` object of each family
//! - [`RpcRequest`]: the outbound `{ method, params }` shape
//! - [`naming`]: key-casing translation between wire and external JSON

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
pub mod naming;
pub mod payloads;
mod rpc;

pub use error::ProtoError;
pub use event::{EventFamily, Lifecycle, WireEvent};
pub use naming::{ConversionOptions, ExternalObject, ExternalValue};
pub use rpc::{MemberRef, RpcRequest};
