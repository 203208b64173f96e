//! Call state for the callsync signaling layer.
//!
//! Pure, synchronous state: nothing here performs I/O or spawns tasks. Every
//! mutation happens inside the handler for one inbound event, in delivery
//! order.
//!
//! # Components
//!
//! - [`Member`]: one participant's attributes, merged from partial updates
//! - [`MemberRegistry`]: insertion-ordered roster of a single call leg
//! - [`SegmentTracker`]: the stack of call legs, self/target resolution
//! - [`TransformRegistry`]: event type → [`TransformKind`] mapping
//! - [`InstanceCache`]: stable behavior handles keyed by `(type, entity id)`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod instance;
mod member;
mod registry;
pub mod segment;
pub mod transform;

pub use error::CoreError;
pub use instance::{InstanceCache, InstanceKey, InstanceView};
pub use member::{Member, MemberId, MemberScope};
pub use registry::{MemberRegistry, RosterChange};
pub use segment::{
    JoinOutcome, RosterUpdate, Segment, SegmentIndex, SegmentRecord, SegmentTracker,
};
pub use transform::{EventTransform, TransformKind, TransformRegistry};
