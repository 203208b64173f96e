//! Model world: the reference session.

use super::operation::{
    MemberSlot, Operation, OperationError, OperationResult, call_id, member_call_id, member_id,
};

/// Observable state for oracle comparison.
///
/// This is the subset of session state that can be read back from the real
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Active legs root first, as `(call_id, self_id)`.
    pub legs: Vec<(String, String)>,
    /// Roster of each active leg in insertion order, as `(member_id, audio_muted)`.
    pub rosters: Vec<Vec<(String, bool)>>,
    /// Root leg's self, if it is still on the root roster.
    pub self_member: Option<String>,
    /// Current leg's self, if it is still on the current roster.
    pub target_member: Option<String>,
}

/// One roster entry in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMember {
    /// Member id.
    pub id: String,
    /// Microphone state.
    pub audio_muted: bool,
    /// The member's own call leg: the roster's leg until an event names
    /// another.
    pub call_id: String,
}

/// One active leg in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLeg {
    /// Call id.
    pub call_id: String,
    /// Our member id in this leg.
    pub self_id: String,
    /// Roster in insertion order.
    pub roster: Vec<ModelMember>,
}

impl ModelLeg {
    fn position(&self, member_id: &str) -> Option<usize> {
        self.roster.iter().position(|m| m.id == member_id)
    }

    fn get(&self, member_id: &str) -> Option<&ModelMember> {
        self.roster.iter().find(|m| m.id == member_id)
    }

    fn contains(&self, member_id: &str) -> bool {
        self.position(member_id).is_some()
    }

    fn add(&mut self, member_id: &str) -> usize {
        self.position(member_id).unwrap_or_else(|| {
            self.roster.push(ModelMember {
                id: member_id.to_string(),
                audio_muted: false,
                call_id: self.call_id.clone(),
            });
            self.roster.len() - 1
        })
    }

    /// Call id commands to our own member carry.
    fn self_call_id(&self) -> String {
        self.get(&self.self_id).map_or_else(|| self.call_id.clone(), |m| m.call_id.clone())
    }

    fn observed_roster(&self) -> Vec<(String, bool)> {
        self.roster.iter().map(|m| (m.id.clone(), m.audio_muted)).collect()
    }
}

/// Model world: a stack of legs and nothing else.
#[derive(Debug, Clone, Default)]
pub struct ModelWorld {
    stack: Vec<ModelLeg>,
}

impl ModelWorld {
    /// Empty world, not joined to anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Active legs, root first.
    pub fn legs(&self) -> &[ModelLeg] {
        &self.stack
    }

    /// Number of active legs.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Apply an operation and return the result the real session must match.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Join { leg, self_slot, roster } => {
                let listed = Operation::roster_ids(roster);
                self.apply_join(&call_id(*leg), &member_id(*self_slot), &listed)
            },
            Operation::Leave { leg } => self.apply_leave(&call_id(*leg)),
            Operation::MemberJoin { leg, member, by_room } => {
                let own_call = by_room.then(|| member_call_id(*member));
                let member = member_id(*member);
                let Some(leg) = self.leg_mut(&call_id(*leg)) else {
                    return OperationResult::Ignored;
                };
                let pos = leg.add(&member);
                if let Some(own_call) = own_call {
                    leg.roster[pos].call_id = own_call;
                }
                OperationResult::Applied
            },
            Operation::MemberLeave { leg, member, .. } => {
                let member = member_id(*member);
                let Some(leg) = self.leg_mut(&call_id(*leg)) else {
                    return OperationResult::Ignored;
                };
                match leg.position(&member) {
                    Some(pos) => {
                        leg.roster.remove(pos);
                        OperationResult::Applied
                    },
                    None => OperationResult::Ignored,
                }
            },
            Operation::MemberUpdate { leg, member, audio_muted, by_room } => {
                let own_call = by_room.then(|| member_call_id(*member));
                let member = member_id(*member);
                let Some(leg) = self.leg_mut(&call_id(*leg)) else {
                    return OperationResult::Ignored;
                };
                match leg.position(&member) {
                    Some(pos) => {
                        leg.roster[pos].audio_muted = *audio_muted;
                        if let Some(own_call) = own_call {
                            leg.roster[pos].call_id = own_call;
                        }
                        OperationResult::Applied
                    },
                    None => OperationResult::Ignored,
                }
            },
            Operation::Execute { target } => self.apply_execute(*target),
            Operation::Teardown => {
                self.stack.clear();
                OperationResult::Applied
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let self_of = |leg: Option<&ModelLeg>| {
            leg.filter(|l| l.contains(&l.self_id)).map(|l| l.self_id.clone())
        };
        ObservableState {
            legs: self.stack.iter().map(|l| (l.call_id.clone(), l.self_id.clone())).collect(),
            rosters: self.stack.iter().map(ModelLeg::observed_roster).collect(),
            self_member: self_of(self.stack.first()),
            target_member: self_of(self.stack.last()),
        }
    }

    fn leg_mut(&mut self, call_id: &str) -> Option<&mut ModelLeg> {
        self.stack.iter_mut().find(|l| l.call_id == call_id)
    }

    /// A join for an active leg reconciles its roster; otherwise a leg is pushed.
    fn apply_join(&mut self, call_id: &str, self_id: &str, listed: &[String]) -> OperationResult {
        if let Some(leg) = self.leg_mut(call_id) {
            for id in listed {
                leg.add(id);
            }
            let keep = leg.self_id.clone();
            leg.roster.retain(|m| m.id == keep || listed.contains(&m.id));
            leg.add(&keep);
            return OperationResult::Applied;
        }

        let mut leg = ModelLeg {
            call_id: call_id.to_string(),
            self_id: self_id.to_string(),
            roster: Vec::new(),
        };
        for id in listed {
            leg.add(id);
        }
        leg.add(self_id);
        self.stack.push(leg);
        OperationResult::Applied
    }

    /// Only the current leg can be torn down.
    fn apply_leave(&mut self, call_id: &str) -> OperationResult {
        match self.stack.last() {
            Some(top) if top.call_id == call_id => {
                self.stack.pop();
                OperationResult::Applied
            },
            _ => OperationResult::Ignored,
        }
    }

    /// Two-tier resolution: any active self id, then the current roster.
    ///
    /// The resolved call id is the member's own leg.
    fn apply_execute(&self, target: Option<MemberSlot>) -> OperationResult {
        let Some(current) = self.stack.last() else {
            return OperationResult::Failed(OperationError::NotJoined);
        };
        let Some(target) = target.map(member_id) else {
            return OperationResult::Sent {
                member_id: current.self_id.clone(),
                call_id: current.self_call_id(),
            };
        };

        if let Some(leg) = self.stack.iter().find(|l| l.self_id == target) {
            return OperationResult::Sent { member_id: target, call_id: leg.self_call_id() };
        }
        if let Some(member) = current.get(&target) {
            return OperationResult::Sent { member_id: target, call_id: member.call_id.clone() };
        }
        OperationResult::Failed(OperationError::Unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(leg: u8, self_slot: u8, roster: &[u8]) -> Operation {
        Operation::Join { leg, self_slot, roster: roster.to_vec() }
    }

    #[test]
    fn transfer_chain() {
        let mut world = ModelWorld::new();
        world.apply(&join(1, 0, &[0, 1]));
        world.apply(&join(2, 2, &[2, 3]));

        assert_eq!(
            world.apply(&Operation::Execute { target: Some(0) }),
            OperationResult::Sent { member_id: "m0".to_string(), call_id: "c1".to_string() }
        );
        assert_eq!(
            world.apply(&Operation::Execute { target: Some(3) }),
            OperationResult::Sent { member_id: "m3".to_string(), call_id: "c2".to_string() }
        );
        assert_eq!(
            world.apply(&Operation::Execute { target: Some(1) }),
            OperationResult::Failed(OperationError::Unresolved)
        );

        assert_eq!(world.apply(&Operation::Leave { leg: 1 }), OperationResult::Ignored);
        assert_eq!(world.apply(&Operation::Leave { leg: 2 }), OperationResult::Applied);
        assert_eq!(world.depth(), 1);
        assert_eq!(world.observable_state().target_member.as_deref(), Some("m0"));
    }

    #[test]
    fn rejoin_reconciles_and_keeps_self() {
        let mut world = ModelWorld::new();
        world.apply(&join(1, 0, &[1, 2]));
        world.apply(&Operation::MemberUpdate {
            leg: 1,
            member: 1,
            audio_muted: true,
            by_room: false,
        });
        world.apply(&join(1, 5, &[1]));

        let state = world.observable_state();
        assert_eq!(state.legs, vec![("c1".to_string(), "m0".to_string())]);
        assert_eq!(
            state.rosters[0],
            vec![("m1".to_string(), true), ("m0".to_string(), false)]
        );
    }

    #[test]
    fn self_can_leave_its_roster() {
        let mut world = ModelWorld::new();
        world.apply(&join(0, 0, &[]));
        world.apply(&Operation::MemberLeave { leg: 0, member: 0, by_room: false });

        let state = world.observable_state();
        assert!(state.self_member.is_none());
        // still addressable by id
        assert!(world.apply(&Operation::Execute { target: Some(0) }).is_ok());
    }

    #[test]
    fn room_addressed_member_keeps_its_own_leg() {
        let mut world = ModelWorld::new();
        world.apply(&join(1, 0, &[0]));
        let joined = Operation::MemberJoin { leg: 1, member: 3, by_room: true };
        assert_eq!(world.apply(&joined), OperationResult::Applied);

        assert_eq!(world.observable_state().rosters[0].len(), 2);
        assert_eq!(
            world.apply(&Operation::Execute { target: Some(3) }),
            OperationResult::Sent { member_id: "m3".to_string(), call_id: "p3".to_string() }
        );
        assert_eq!(
            world.apply(&Operation::MemberLeave { leg: 2, member: 3, by_room: true }),
            OperationResult::Ignored
        );
    }
}
