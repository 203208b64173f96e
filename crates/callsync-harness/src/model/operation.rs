//! Operations for model-based testing.
//!
//! Operations are the inbound events and outbound commands a session sees.
//! They are generated randomly by proptest (or decoded from fuzzer input) and
//! applied to both the model and the real session.

use arbitrary::Arbitrary;
use callsync_proto::WireEvent;
use serde_json::json;

use crate::wire;

/// Call leg identifier (mapped onto a handful of call ids).
pub type LegId = u8;

/// Member identifier (mapped onto a handful of member ids).
pub type MemberSlot = u8;

const LEGS: u8 = 4;
const MEMBERS: u8 = 6;
const MAX_ROSTER: usize = 4;

/// Call id a leg maps to.
pub fn call_id(leg: LegId) -> String {
    format!("c{}", leg % LEGS)
}

/// Member id a slot maps to.
pub fn member_id(slot: MemberSlot) -> String {
    format!("m{}", slot % MEMBERS)
}

/// The participant's own call leg, as room-addressed events report it.
pub fn member_call_id(slot: MemberSlot) -> String {
    format!("p{}", slot % MEMBERS)
}

/// Operations that can be applied to a session.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Server joins us to a leg (or re-sends the join of an active one).
    Join {
        /// Leg joined.
        leg: LegId,
        /// Our member id in the leg.
        self_slot: MemberSlot,
        /// Full roster as listed by the server.
        roster: Vec<MemberSlot>,
    },

    /// Server tears a leg down.
    Leave {
        /// Leg torn down.
        leg: LegId,
    },

    /// A member joins a leg's roster.
    MemberJoin {
        /// Leg of the roster.
        leg: LegId,
        /// Member joining.
        member: MemberSlot,
        /// Addressed by room session, carrying the member's own call id.
        by_room: bool,
    },

    /// A member leaves a leg's roster.
    MemberLeave {
        /// Leg of the roster.
        leg: LegId,
        /// Member leaving.
        member: MemberSlot,
        /// Addressed by room session, carrying the member's own call id.
        by_room: bool,
    },

    /// A member's microphone state changes.
    MemberUpdate {
        /// Leg of the roster.
        leg: LegId,
        /// Member updated.
        member: MemberSlot,
        /// New mute state.
        audio_muted: bool,
        /// Addressed by room session, carrying the member's own call id.
        by_room: bool,
    },

    /// Issue a mute command.
    Execute {
        /// Explicit target, or the current self.
        target: Option<MemberSlot>,
    },

    /// Drop all call state.
    Teardown,
}

impl Operation {
    /// Roster ids of a join, capped to keep cases small.
    pub fn roster_ids(roster: &[MemberSlot]) -> Vec<String> {
        roster.iter().take(MAX_ROSTER).map(|&slot| member_id(slot)).collect()
    }

    /// The wire event this operation delivers, if it is an inbound event.
    pub fn to_event(&self) -> Option<WireEvent> {
        let event = match self {
            Self::Join { leg, self_slot, roster } => {
                let ids = Self::roster_ids(roster);
                let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
                wire::joined(&call_id(*leg), &member_id(*self_slot), &ids)
            },
            Self::Leave { leg } => wire::left(&call_id(*leg)),
            Self::MemberJoin { leg, member, by_room: false } => {
                wire::member_joined(&call_id(*leg), &member_id(*member))
            },
            Self::MemberJoin { leg, member, by_room: true } => wire::member_joined_in_room(
                &room_session_of(*leg),
                &member_id(*member),
                &member_call_id(*member),
            ),
            Self::MemberLeave { leg, member, by_room: false } => {
                wire::member_left(&call_id(*leg), &member_id(*member))
            },
            Self::MemberLeave { leg, member, by_room: true } => wire::member_left_in_room(
                &room_session_of(*leg),
                &member_id(*member),
                &member_call_id(*member),
            ),
            Self::MemberUpdate { leg, member, audio_muted, by_room: false } => wire::member_updated(
                &call_id(*leg),
                &member_id(*member),
                json!({ "audio_muted": audio_muted }),
            ),
            Self::MemberUpdate { leg, member, audio_muted, by_room: true } => {
                wire::member_updated_in_room(
                    &room_session_of(*leg),
                    &member_id(*member),
                    &member_call_id(*member),
                    json!({ "audio_muted": audio_muted }),
                )
            },
            Self::Execute { .. } | Self::Teardown => return None,
        };
        Some(event)
    }
}

fn room_session_of(leg: LegId) -> String {
    wire::room_session_id(&call_id(leg))
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The event changed session state (possibly to an identical value).
    Applied,

    /// The event referenced a leg or member that is not tracked.
    Ignored,

    /// A command was sent to `member_id` in leg `call_id`.
    Sent {
        /// Resolved target member.
        member_id: String,
        /// Leg the target was resolved in.
        call_id: String,
    },

    /// A command failed before reaching the transport.
    Failed(OperationError),
}

/// Expected command failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// No leg is active.
    NotJoined,

    /// The explicit target is not addressable.
    Unresolved,
}

impl OperationResult {
    /// Whether the operation took effect.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Applied | Self::Sent { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_wrap() {
        assert_eq!(call_id(5), "c1");
        assert_eq!(member_id(6), "m0");
    }

    #[test]
    fn roster_is_capped() {
        assert_eq!(Operation::roster_ids(&[0, 1, 2, 3, 4, 5]).len(), MAX_ROSTER);
    }

    #[test]
    fn commands_have_no_event() {
        assert!(Operation::Execute { target: None }.to_event().is_none());
        assert!(Operation::Teardown.to_event().is_none());
        assert!(Operation::Leave { leg: 1 }.to_event().is_some());
    }

    #[test]
    fn room_addressed_events_name_the_room_session() {
        let op = Operation::MemberUpdate { leg: 1, member: 2, audio_muted: true, by_room: true };
        let event = op.to_event().unwrap();
        assert_eq!(event.params["room_session_id"], json!("rs-c1"));
        assert_eq!(event.params["member"]["call_id"], json!("p2"));
        assert!(event.params.get("call_id").is_none());
    }
}
