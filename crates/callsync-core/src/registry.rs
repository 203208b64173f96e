//! Per-leg member roster.
//!
//! Ids are unique within a roster and listing follows insertion order. The
//! registry only stores; deciding which events may create members (joined)
//! and which may only touch existing ones (updated) is the caller's job, see
//! [`MemberRegistry::upsert`] and [`MemberRegistry::update`].

use std::collections::HashMap;

use callsync_proto::payloads::MemberPayload;

use crate::{
    CoreError,
    member::{Member, MemberId, MemberScope},
};

/// Outcome of a roster mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterChange {
    /// A new member was inserted.
    Joined(Member),
    /// An existing member was merged.
    Updated {
        /// Member after the merge.
        member: Member,
        /// Wire names of the fields that changed. Empty for a no-op update.
        changed: Vec<String>,
    },
    /// A member was removed.
    Left(Member),
}

impl RosterChange {
    /// The member this change concerns.
    pub fn member(&self) -> &Member {
        match self {
            Self::Joined(member) | Self::Left(member) | Self::Updated { member, .. } => member,
        }
    }

    /// Whether the change altered the roster at all.
    pub fn is_effective(&self) -> bool {
        match self {
            Self::Joined(_) | Self::Left(_) => true,
            Self::Updated { changed, .. } => !changed.is_empty(),
        }
    }
}

/// Insertion-ordered roster of one call leg.
#[derive(Debug, Clone, Default)]
pub struct MemberRegistry {
    members: HashMap<MemberId, Member>,
    order: Vec<MemberId>,
}

impl MemberRegistry {
    /// Empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a payload into the roster, creating the member if absent.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingIdentity` if the payload has no member id.
    pub fn upsert(
        &mut self,
        payload: &MemberPayload,
        scope: &MemberScope,
    ) -> Result<RosterChange, CoreError> {
        let id = payload.member_id().ok_or(CoreError::MissingIdentity { field: "member_id" })?;

        if let Some(existing) = self.members.get_mut(id) {
            let changed = existing.apply(payload);
            return Ok(RosterChange::Updated { member: existing.clone(), changed });
        }

        let member = Member::from_payload(payload, scope)
            .ok_or(CoreError::MissingIdentity { field: "member_id" })?;
        self.order.push(member.id.clone());
        self.members.insert(member.id.clone(), member.clone());
        Ok(RosterChange::Joined(member))
    }

    /// Insert a fully-formed member, replacing any entry with the same id.
    pub fn insert(&mut self, member: Member) {
        if !self.members.contains_key(&member.id) {
            self.order.push(member.id.clone());
        }
        self.members.insert(member.id.clone(), member);
    }

    /// Merge a payload into an existing member only.
    ///
    /// Returns `None` when the member is not on the roster; updates never
    /// introduce new ids.
    pub fn update(&mut self, payload: &MemberPayload) -> Option<RosterChange> {
        let id = payload.member_id()?;
        let Some(existing) = self.members.get_mut(id) else {
            tracing::debug!(member_id = id, "update for member not on roster");
            return None;
        };
        let changed = existing.apply(payload);
        Some(RosterChange::Updated { member: existing.clone(), changed })
    }

    /// Remove a member. Absent ids are a logged no-op.
    pub fn remove(&mut self, member_id: &str) -> Option<RosterChange> {
        let Some(member) = self.members.remove(member_id) else {
            tracing::debug!(member_id, "remove for member not on roster");
            return None;
        };
        self.order.retain(|id| id != member_id);
        Some(RosterChange::Left(member))
    }

    /// Look up a member.
    pub fn get(&self, member_id: &str) -> Option<&Member> {
        self.members.get(member_id)
    }

    /// Whether a member is on the roster.
    pub fn contains(&self, member_id: &str) -> bool {
        self.members.contains_key(member_id)
    }

    /// Members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Member> + '_ {
        self.order.iter().filter_map(|id| self.members.get(id))
    }

    /// Snapshot of the roster in insertion order.
    pub fn list(&self) -> Vec<Member> {
        self.iter().cloned().collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drop every member.
    pub fn clear(&mut self) {
        self.members.clear();
        self.order.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn payload(value: Value) -> MemberPayload {
        serde_json::from_value(value).unwrap()
    }

    fn scope() -> MemberScope {
        MemberScope { call_id: Some("c1".to_string()), ..MemberScope::default() }
    }

    #[test]
    fn upsert_creates_then_merges() {
        let mut roster = MemberRegistry::new();
        let joined = roster.upsert(&payload(json!({ "member_id": "m1" })), &scope()).unwrap();
        assert!(matches!(joined, RosterChange::Joined(_)));

        let updated = roster
            .upsert(&payload(json!({ "member_id": "m1", "deaf": true })), &scope())
            .unwrap();
        match updated {
            RosterChange::Updated { member, changed } => {
                assert!(member.deaf);
                assert_eq!(changed, vec!["deaf".to_string()]);
            },
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn update_never_introduces_ids() {
        let mut roster = MemberRegistry::new();
        assert!(roster.update(&payload(json!({ "id": "ghost", "deaf": true }))).is_none());
        assert!(roster.is_empty());
    }

    #[test]
    fn identical_update_twice_is_idempotent() {
        let mut roster = MemberRegistry::new();
        roster.upsert(&payload(json!({ "id": "m1" })), &scope()).unwrap();

        let update = payload(json!({ "id": "m1", "video_muted": true, "input_volume": 4.0 }));
        let first = roster.update(&update).unwrap();
        let after_first = roster.list();
        let second = roster.update(&update).unwrap();

        assert!(first.is_effective());
        assert!(!second.is_effective());
        assert_eq!(roster.list(), after_first);
    }

    #[test]
    fn remove_exactly_one_entry() {
        let mut roster = MemberRegistry::new();
        for id in ["a", "b", "c"] {
            roster.upsert(&payload(json!({ "id": id })), &scope()).unwrap();
        }
        assert!(matches!(roster.remove("b"), Some(RosterChange::Left(_))));
        assert!(roster.remove("b").is_none());

        let ids: Vec<_> = roster.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut roster = MemberRegistry::new();
        for id in ["z", "a", "m"] {
            roster.upsert(&payload(json!({ "id": id })), &scope()).unwrap();
        }
        let ids: Vec<_> = roster.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn upsert_without_id_fails() {
        let mut roster = MemberRegistry::new();
        let err = roster.upsert(&payload(json!({ "name": "anon" })), &scope()).unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity { .. }));
    }
}
