//! Reference model for model-based testing.
//!
//! The model tracks legs and rosters with plain vectors and none of the
//! payload handling of the real session. It is the oracle the real
//! implementation is checked against.
//!
//! # Design Principles
//!
//! - Simplicity: the model should be obviously correct
//! - Observable behavior only: which leg is current, who is on which roster,
//!   whom a command addresses
//! - Deterministic: same operations, same state

pub mod operation;
mod world;

pub use operation::{LegId, MemberSlot, Operation, OperationError, OperationResult};
pub use world::{ModelLeg, ModelMember, ModelWorld, ObservableState};
