//! Call segment tracking.
//!
//! A call is modelled as a chain of signaling legs. Transfers and promotions
//! join a new leg on top of the current one; tearing the new leg down returns
//! to the previous one.
//!
//! ## Design
//!
//! - Append-only log: every segment ever joined stays in `log`; the active
//!   stack is a list of indices into it. Popping only marks the record closed,
//!   so the transfer chain remains inspectable through
//!   [`SegmentTracker::history`].
//! - Root self: the bottom segment's self member is the identity that
//!   persists across transfers ([`SegmentTracker::self_member`]).
//! - Current target: commands default to the top segment's self
//!   ([`SegmentTracker::target_member`]).
//!
//! ## Member resolution
//!
//! An explicit member id `X` resolves in two tiers:
//!
//! 1. `X` is the self id of any active segment: that segment's self.
//! 2. `X` is on the current segment's roster: that roster entry.
//!
//! Anything else is a [`CoreError::Resolution`]. Other participants are only
//! addressable within the leg they are currently part of, while our own
//! identities stay addressable after a transfer.

use callsync_proto::{
    MemberRef,
    payloads::{MemberEventParams, MemberPayload, SessionJoinedParams},
};

use crate::{
    CoreError,
    member::{Member, MemberId, MemberScope},
    registry::{MemberRegistry, RosterChange},
};

/// Index of a segment in the tracker's log.
pub type SegmentIndex = usize;

/// One leg of a call.
#[derive(Debug, Clone)]
pub struct Segment {
    call_id: String,
    origin_call_id: Option<String>,
    room_id: Option<String>,
    room_session_id: Option<String>,
    node_id: Option<String>,
    self_member_id: MemberId,
    roster: MemberRegistry,
}

impl Segment {
    /// Empty segment. The self member is added as a bare entry.
    pub fn new(call_id: impl Into<String>, self_member_id: impl Into<MemberId>) -> Self {
        let mut segment = Self {
            call_id: call_id.into(),
            origin_call_id: None,
            room_id: None,
            room_session_id: None,
            node_id: None,
            self_member_id: self_member_id.into(),
            roster: MemberRegistry::new(),
        };
        segment.ensure_self();
        segment
    }

    /// Build a segment from a joined event.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingIdentity` if the payload has neither a call
    /// id nor a room session id, or no way to determine our own member id.
    pub fn from_joined(params: &SessionJoinedParams) -> Result<Self, CoreError> {
        let call_id =
            params.segment_key().ok_or(CoreError::MissingIdentity { field: "call_id" })?;
        let self_member_id =
            params.self_member_id().ok_or(CoreError::MissingIdentity { field: "member_id" })?;

        let mut segment = Self {
            call_id: call_id.to_string(),
            origin_call_id: params.origin_call_id.clone(),
            room_id: params.room_id().map(str::to_string),
            room_session_id: params.room_session_id().map(str::to_string),
            node_id: params.node_id.clone(),
            self_member_id: self_member_id.to_string(),
            roster: MemberRegistry::new(),
        };

        let scope = segment.scope();
        for payload in params.members() {
            if let Err(e) = segment.roster.upsert(payload, &scope) {
                tracing::warn!(call_id, error = %e, "skipping roster entry without id");
            }
        }
        segment.ensure_self();
        Ok(segment)
    }

    fn ensure_self(&mut self) {
        if !self.roster.contains(&self.self_member_id) {
            let member = Member::new(self.self_member_id.clone(), &self.scope());
            self.roster.insert(member);
        }
    }

    /// Call id (or room session id for namespaces without call ids).
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Leg this one was promoted or transferred from.
    pub fn origin_call_id(&self) -> Option<&str> {
        self.origin_call_id.as_deref()
    }

    /// Room id.
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// Room session id.
    pub fn room_session_id(&self) -> Option<&str> {
        self.room_session_id.as_deref()
    }

    /// Media node.
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// Our own member id in this leg.
    pub fn self_member_id(&self) -> &str {
        &self.self_member_id
    }

    /// Our own member record in this leg.
    pub fn self_member(&self) -> Option<&Member> {
        self.roster.get(&self.self_member_id)
    }

    /// Identity descriptor for our own member.
    pub fn self_ref(&self) -> MemberRef {
        let scope = self.scope();
        self.self_member().map_or_else(
            || MemberRef {
                member_id: self.self_member_id.clone(),
                call_id: self.call_id.clone(),
                node_id: self.node_id.clone().unwrap_or_default(),
            },
            |member| member.as_ref_in(&scope),
        )
    }

    /// Identifiers lent to members that omit them.
    pub fn scope(&self) -> MemberScope {
        MemberScope {
            call_id: Some(self.call_id.clone()),
            node_id: self.node_id.clone(),
            room_id: self.room_id.clone(),
            room_session_id: self.room_session_id.clone(),
        }
    }

    /// The roster.
    pub fn roster(&self) -> &MemberRegistry {
        &self.roster
    }

    /// Mutable roster.
    pub fn roster_mut(&mut self) -> &mut MemberRegistry {
        &mut self.roster
    }

    /// Whether this segment belongs to room session `room_session_id`.
    fn in_room(&self, room_session_id: &str) -> bool {
        self.room_session_id.as_deref() == Some(room_session_id) || self.call_id == room_session_id
    }

    /// Reconcile the roster with a fresh full member list.
    fn refresh(&mut self, members: &[MemberPayload]) -> Vec<RosterChange> {
        let scope = self.scope();
        let mut changes = Vec::new();
        let mut seen = Vec::with_capacity(members.len());

        for payload in members {
            let Some(id) = payload.member_id() else { continue };
            seen.push(id.to_string());
            match self.roster.upsert(payload, &scope) {
                Ok(change) if change.is_effective() => changes.push(change),
                Ok(_) => {},
                Err(e) => tracing::warn!(call_id = %self.call_id, error = %e, "bad roster entry"),
            }
        }

        let stale: Vec<MemberId> = self
            .roster
            .iter()
            .map(|m| m.id.clone())
            .filter(|id| !seen.contains(id) && *id != self.self_member_id)
            .collect();
        for id in stale {
            changes.extend(self.roster.remove(&id));
        }

        self.ensure_self();
        changes
    }
}

/// A segment plus its lifecycle bookkeeping.
#[derive(Debug, Clone)]
pub struct SegmentRecord {
    /// The segment (frozen at pop time once closed).
    pub segment: Segment,
    /// Stack depth the segment was pushed at (0 = root).
    pub depth: usize,
    /// Whether the segment has been popped.
    pub closed: bool,
}

/// Result of applying a joined event.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// A new segment became the current one.
    Pushed(SegmentIndex),
    /// The event named an already active leg; its roster was reconciled.
    Refreshed {
        /// Log index of the refreshed segment.
        index: SegmentIndex,
        /// Roster changes produced by the reconciliation.
        changes: Vec<RosterChange>,
    },
}

/// A roster change and the leg it happened in.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterUpdate {
    /// Leg whose roster changed.
    pub call_id: String,
    /// What changed.
    pub change: RosterChange,
}

/// Stack of call segments.
#[derive(Debug, Clone, Default)]
pub struct SegmentTracker {
    log: Vec<SegmentRecord>,
    active: Vec<SegmentIndex>,
}

impl SegmentTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a joined event: push a new leg or refresh an active one.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingIdentity` if the payload cannot identify the
    /// leg or our own member.
    pub fn join(&mut self, params: &SessionJoinedParams) -> Result<JoinOutcome, CoreError> {
        let key = params.segment_key().ok_or(CoreError::MissingIdentity { field: "call_id" })?;

        if let Some(index) = self.active_index(key) {
            let changes = self.log[index].segment.refresh(params.members());
            tracing::debug!(call_id = key, changes = changes.len(), "refreshed active segment");
            return Ok(JoinOutcome::Refreshed { index, changes });
        }

        let segment = Segment::from_joined(params)?;
        Ok(JoinOutcome::Pushed(self.push(segment)))
    }

    /// Push a segment on top of the stack.
    pub fn push(&mut self, segment: Segment) -> SegmentIndex {
        let index = self.log.len();
        let depth = self.active.len();
        tracing::debug!(call_id = segment.call_id(), depth, "segment pushed");
        self.log.push(SegmentRecord { segment, depth, closed: false });
        self.active.push(index);
        index
    }

    /// Pop the top segment if it is the named leg.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::StateInconsistency` if the stack is empty or the
    /// top segment is a different leg. State is unchanged in that case.
    pub fn pop(&mut self, call_id: &str) -> Result<&Segment, CoreError> {
        let Some(&top) = self.active.last() else {
            return Err(CoreError::inconsistent(format!("left {call_id} with no segments")));
        };
        if self.log[top].segment.call_id != call_id {
            return Err(CoreError::inconsistent(format!(
                "left {call_id} but current segment is {}",
                self.log[top].segment.call_id
            )));
        }

        self.active.pop();
        let record = &mut self.log[top];
        record.closed = true;
        tracing::debug!(call_id, depth = self.active.len(), "segment popped");
        Ok(&record.segment)
    }

    /// Apply a member-joined event to its segment.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::StateInconsistency` if no active segment matches.
    pub fn member_joined(
        &mut self,
        params: &MemberEventParams,
    ) -> Result<RosterUpdate, CoreError> {
        let segment = self.segment_for_event(params)?;
        let scope = segment.scope();
        let change = segment.roster.upsert(&params.member, &scope)?;
        Ok(RosterUpdate { call_id: segment.call_id.clone(), change })
    }

    /// Apply a member-updated event to its segment.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::StateInconsistency` if no active segment matches
    /// or the member is not on its roster.
    pub fn member_updated(
        &mut self,
        params: &MemberEventParams,
    ) -> Result<RosterUpdate, CoreError> {
        let segment = self.segment_for_event(params)?;
        let call_id = segment.call_id.clone();
        let change = segment.roster.update(&params.member).ok_or_else(|| {
            CoreError::inconsistent(format!(
                "update for {} not on roster of {call_id}",
                params.member.member_id().unwrap_or_default()
            ))
        })?;
        Ok(RosterUpdate { call_id, change })
    }

    /// Apply a member-left event to its segment.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::StateInconsistency` if no active segment matches
    /// or the member is not on its roster.
    pub fn member_left(
        &mut self,
        params: &MemberEventParams,
    ) -> Result<RosterUpdate, CoreError> {
        let member_id = params.member.member_id().unwrap_or_default().to_string();
        let segment = self.segment_for_event(params)?;
        let call_id = segment.call_id.clone();
        let change = segment.roster.remove(&member_id).ok_or_else(|| {
            CoreError::inconsistent(format!("{member_id} left but is not on roster of {call_id}"))
        })?;
        Ok(RosterUpdate { call_id, change })
    }

    fn segment_for_event(&mut self, params: &MemberEventParams) -> Result<&mut Segment, CoreError> {
        let call_id = params.call_id();
        let room_session_id = params.room_session_id();
        self.segment_for_mut(call_id, room_session_id).ok_or_else(|| {
            CoreError::inconsistent(format!(
                "no segment for call {} / room session {}",
                call_id.unwrap_or("-"),
                room_session_id.unwrap_or("-")
            ))
        })
    }

    /// Active segment addressed by a call id or room session id.
    ///
    /// With neither identifier the current segment is returned. Otherwise an
    /// exact call id match wins, then the topmost segment of the room session.
    pub fn segment_for(
        &self,
        call_id: Option<&str>,
        room_session_id: Option<&str>,
    ) -> Option<&Segment> {
        self.address(call_id, room_session_id).map(|i| &self.log[i].segment)
    }

    /// Mutable variant of [`SegmentTracker::segment_for`].
    pub fn segment_for_mut(
        &mut self,
        call_id: Option<&str>,
        room_session_id: Option<&str>,
    ) -> Option<&mut Segment> {
        let index = self.address(call_id, room_session_id)?;
        Some(&mut self.log[index].segment)
    }

    fn address(
        &self,
        call_id: Option<&str>,
        room_session_id: Option<&str>,
    ) -> Option<SegmentIndex> {
        if call_id.is_none() && room_session_id.is_none() {
            return self.active.last().copied();
        }
        call_id.and_then(|id| self.active_index(id)).or_else(|| {
            let rs = room_session_id?;
            self.active.iter().rev().copied().find(|&i| self.log[i].segment.in_room(rs))
        })
    }

    fn active_index(&self, call_id: &str) -> Option<SegmentIndex> {
        self.active.iter().copied().find(|&i| self.log[i].segment.call_id == call_id)
    }

    /// Top (current) segment.
    pub fn current(&self) -> Option<&Segment> {
        self.active.last().map(|&i| &self.log[i].segment)
    }

    /// Bottom (root) segment.
    pub fn root(&self) -> Option<&Segment> {
        self.active.first().map(|&i| &self.log[i].segment)
    }

    /// Number of active segments.
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    /// Whether no segment is active.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active segments from root to current.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.active.iter().map(|&i| &self.log[i].segment)
    }

    /// Every segment ever pushed, in push order, closed ones included.
    pub fn history(&self) -> &[SegmentRecord] {
        &self.log
    }

    /// Our persistent identity: the root segment's self member.
    pub fn self_member(&self) -> Option<&Member> {
        self.root().and_then(Segment::self_member)
    }

    /// Default command target: the current segment's self member.
    pub fn target_member(&self) -> Option<&Member> {
        self.current().and_then(Segment::self_member)
    }

    /// Current segment's roster snapshot.
    pub fn members(&self) -> Vec<Member> {
        self.current().map(|s| s.roster.list()).unwrap_or_default()
    }

    /// Identity descriptor for `self` in commands.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotJoined` before the first join.
    pub fn self_ref(&self) -> Result<MemberRef, CoreError> {
        self.root().map(Segment::self_ref).ok_or(CoreError::NotJoined)
    }

    /// Resolve the `target` of a command.
    ///
    /// `None` targets the current segment's self.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotJoined` before the first join and
    /// `CoreError::Resolution` when an explicit id is unknown.
    pub fn resolve_target(&self, member_id: Option<&str>) -> Result<MemberRef, CoreError> {
        let current = self.current().ok_or(CoreError::NotJoined)?;
        let Some(member_id) = member_id else {
            return Ok(current.self_ref());
        };

        if let Some(segment) = self.segments().find(|s| s.self_member_id == member_id) {
            return Ok(segment.self_ref());
        }

        if let Some(member) = current.roster.get(member_id) {
            return Ok(member.as_ref_in(&current.scope()));
        }

        if let Some(segment) = self.segments().find(|s| s.roster.contains(member_id)) {
            tracing::debug!(
                member_id,
                call_id = segment.call_id(),
                "member only present in a non-current segment"
            );
        }
        Err(CoreError::Resolution { member_id: member_id.to_string() })
    }

    /// Drop every segment, history included.
    pub fn clear(&mut self) {
        self.log.clear();
        self.active.clear();
    }
}
