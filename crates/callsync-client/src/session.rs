//! Session state machine.
//!
//! The `Session` consumes inbound signaling events one at a time, in delivery
//! order, and keeps the segment stack, rosters and instance cache consistent
//! with them. Outbound commands live in [`crate::executor`].
//!
//! # Error policy
//!
//! Inbound events never fail the session for expected conditions:
//!
//! - Events referencing legs or members we do not track (reconnects, duplicate
//!   delivery) are logged at debug level and reported as
//!   [`SessionNotice::Ignored`].
//! - Malformed payloads are logged at warn level and reported the same way.
//!
//! Only fatal errors (see [`SessionError::is_fatal`]) are returned.

use std::sync::Arc;

use callsync_core::{
    CoreError, InstanceCache, InstanceKey, InstanceView, JoinOutcome, Member, RosterChange,
    RosterUpdate, Segment, SegmentRecord, SegmentTracker, TransformKind, TransformRegistry,
};
use callsync_proto::{
    EventFamily, Lifecycle, WireEvent, naming,
    payloads::{self, MemberEventParams, SessionJoinedParams, SessionLeftParams},
};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{
    SessionError, SessionNotice,
    config::SessionConfig,
    event::RosterSnapshot,
    handles::{MemberHandle, Transforms},
    transport::RpcTransport,
};

/// Client-side view of one call.
///
/// # Type Parameters
///
/// - `T`: transport that executes outbound requests
pub struct Session<T: RpcTransport> {
    pub(crate) config: SessionConfig,
    pub(crate) transport: Arc<T>,
    pub(crate) segments: SegmentTracker,
    registry: TransformRegistry,
    transforms: Transforms,
    instances: InstanceCache,
    roster_tx: broadcast::Sender<RosterSnapshot>,
}

impl<T: RpcTransport> Session<T> {
    /// Create a session with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(Arc::new(transport), SessionConfig::default())
    }

    /// Create a session sharing `transport` with other owners.
    pub fn with_config(transport: Arc<T>, config: SessionConfig) -> Self {
        let (roster_tx, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            transforms: Transforms::new(&config.command_namespace),
            instances: InstanceCache::with_options(config.conversion_options()),
            registry: TransformRegistry::with_defaults(),
            segments: SegmentTracker::new(),
            transport,
            roster_tx,
            config,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The transport commands are sent through.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Map an extra event type to an existing transform kind.
    ///
    /// Entity kinds registered this way produce `Updated` notices.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Core` if the event type is already mapped.
    pub fn register_transform(
        &mut self,
        event_type: impl Into<String>,
        kind: TransformKind,
    ) -> Result<(), SessionError> {
        Ok(self.registry.register(event_type, kind)?)
    }

    /// Process one inbound event.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` only for fatal conditions; see the module docs.
    pub fn handle(&mut self, event: WireEvent) -> Result<Vec<SessionNotice>, SessionError> {
        let family = event.family();
        tracing::trace!(event_type = %event.event_type, ?family, "handling event");

        let result = match family {
            EventFamily::SessionJoined => self.handle_joined(&event),
            EventFamily::SessionLeft => self.handle_left(&event),
            EventFamily::MemberJoined => self.handle_member_joined(&event),
            EventFamily::MemberLeft => self.handle_member_left(&event),
            EventFamily::MemberUpdated { .. } | EventFamily::MemberTalking => {
                self.handle_member_updated(&event, &family)
            },
            EventFamily::Recording(phase) => {
                self.handle_entity(&event, TransformKind::Recording, phase)
            },
            EventFamily::Playback(phase) => {
                self.handle_entity(&event, TransformKind::Playback, phase)
            },
            EventFamily::Stream(phase) => self.handle_entity(&event, TransformKind::Stream, phase),
            EventFamily::LayoutChanged => Ok(vec![SessionNotice::LayoutChanged {
                layout: naming::object_to_external_default(&event.params),
            }]),
            EventFamily::Unknown => self.handle_unknown(&event),
        };

        match result {
            Ok(notices) => Ok(notices),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(CoreError::Proto(e)) => {
                let event_type = event.event_type.as_str();
                tracing::warn!(event_type, error = %e, "malformed event dropped");
                Ok(vec![ignored(&event, e.to_string())])
            },
            Err(e) => {
                tracing::debug!(event_type = %event.event_type, error = %e, "event ignored");
                Ok(vec![ignored(&event, e.to_string())])
            },
        }
    }

    fn handle_joined(&mut self, event: &WireEvent) -> Result<Vec<SessionNotice>, CoreError> {
        let params = SessionJoinedParams::parse(&event.event_type, &event.params)?;
        let mut notices = Vec::new();

        match self.segments.join(&params)? {
            JoinOutcome::Pushed(_) => {
                let call_id = self.current_call_id()?;
                let room = self.instances.view(&self.transforms.room, &event.params)?;
                tracing::info!(call_id = %call_id, depth = self.segments.depth(), "segment joined");
                notices.push(SessionNotice::SegmentPushed {
                    call_id: call_id.clone(),
                    depth: self.segments.depth(),
                    room,
                });

                let (recordings, playbacks, streams) = params.active_entities();
                let room_session_id = params.room_session_id();
                for (kind, entities) in [
                    (TransformKind::Recording, recordings),
                    (TransformKind::Playback, playbacks),
                    (TransformKind::Stream, streams),
                ] {
                    for raw in entities {
                        let raw = with_room_session(raw, room_session_id);
                        // already running when we joined: reported as updates
                        match self.entity_notice(kind, Lifecycle::Updated, &raw) {
                            Ok(notice) => notices.push(notice),
                            Err(e) => tracing::warn!(call_id = %call_id, error = %e, "bad entity"),
                        }
                    }
                }

                notices.push(self.roster_changed(&call_id));
            },
            JoinOutcome::Refreshed { index, changes } => {
                let call_id = self.segments.history()[index].segment.call_id().to_string();
                notices.push(SessionNotice::SegmentRefreshed { call_id: call_id.clone() });
                let effective = !changes.is_empty();
                for change in changes {
                    if let RosterChange::Left(member) = &change {
                        self.evict_departed(&member.id);
                    }
                    push_member_notices(&mut notices, &call_id, change);
                }
                if effective {
                    notices.push(self.roster_changed(&call_id));
                }
            },
        }
        Ok(notices)
    }

    fn handle_left(&mut self, event: &WireEvent) -> Result<Vec<SessionNotice>, CoreError> {
        let params = SessionLeftParams::parse(&event.event_type, &event.params)?;
        let key = params.segment_key().ok_or(CoreError::MissingIdentity { field: "call_id" })?;
        let popped = self.segments.pop(key)?;
        let call_id = popped.call_id().to_string();
        let room_id = room_entity_id(popped).to_string();
        let departed: Vec<String> = popped.roster().iter().map(|m| m.id.clone()).collect();
        let depth = self.segments.depth();
        tracing::info!(call_id = %call_id, depth, reason = ?params.reason, "segment left");

        if !self.segments.segments().any(|s| room_entity_id(s) == room_id) {
            self.instances.evict(&InstanceKey::new(TransformKind::RoomSession, room_id));
        }
        for member_id in &departed {
            self.evict_departed(member_id);
        }

        let mut notices =
            vec![SessionNotice::SegmentPopped { call_id, depth, reason: params.reason.clone() }];
        if let Some(current) = self.segments.current().map(|s| s.call_id().to_string()) {
            notices.push(self.roster_changed(&current));
        }
        Ok(notices)
    }

    fn handle_member_joined(
        &mut self,
        event: &WireEvent,
    ) -> Result<Vec<SessionNotice>, CoreError> {
        let params = MemberEventParams::parse(&event.event_type, &event.params)?;
        let update = self.segments.member_joined(&params)?;
        Ok(self.member_notices(update))
    }

    fn handle_member_left(&mut self, event: &WireEvent) -> Result<Vec<SessionNotice>, CoreError> {
        let params = MemberEventParams::parse(&event.event_type, &event.params)?;
        let update = self.segments.member_left(&params)?;
        self.evict_departed(&update.change.member().id);
        Ok(self.member_notices(update))
    }

    fn handle_member_updated(
        &mut self,
        event: &WireEvent,
        family: &EventFamily,
    ) -> Result<Vec<SessionNotice>, CoreError> {
        let mut params = MemberEventParams::parse(&event.event_type, &event.params)?;
        if *family == EventFamily::MemberTalking && params.member.talking.is_none() {
            params.member.talking = talking_from_type(&event.event_type);
        }
        let update = self.segments.member_updated(&params)?;
        Ok(self.member_notices(update))
    }

    fn handle_entity(
        &mut self,
        event: &WireEvent,
        kind: TransformKind,
        phase: Lifecycle,
    ) -> Result<Vec<SessionNotice>, CoreError> {
        if self.registry.lookup(event) != Some(kind) {
            return Ok(vec![ignored(event, "no transform registered")]);
        }
        let Some(key) = kind.params_key() else {
            return Ok(vec![ignored(event, "not an entity event")]);
        };
        let raw = payloads::entity_object(&event.event_type, &event.params, key)?;
        Ok(vec![self.entity_notice(kind, phase, &raw)?])
    }

    fn handle_unknown(&mut self, event: &WireEvent) -> Result<Vec<SessionNotice>, CoreError> {
        match self.registry.lookup(event) {
            Some(
                kind @ (TransformKind::Recording | TransformKind::Playback | TransformKind::Stream),
            ) => self.handle_entity(event, kind, Lifecycle::Updated),
            _ => {
                tracing::trace!(event_type = %event.event_type, "unrecognized event type");
                Ok(vec![ignored(event, "unrecognized event type")])
            },
        }
    }

    fn entity_notice(
        &mut self,
        kind: TransformKind,
        phase: Lifecycle,
        raw: &Value,
    ) -> Result<SessionNotice, CoreError> {
        let (notice, key) = match kind {
            TransformKind::Recording => {
                let view = self.instances.view(&self.transforms.recording, raw)?;
                let key = view.key().clone();
                (SessionNotice::Recording { phase, view }, key)
            },
            TransformKind::Playback => {
                let view = self.instances.view(&self.transforms.playback, raw)?;
                let key = view.key().clone();
                (SessionNotice::Playback { phase, view }, key)
            },
            TransformKind::Stream => {
                let view = self.instances.view(&self.transforms.stream, raw)?;
                let key = view.key().clone();
                (SessionNotice::Stream { phase, view }, key)
            },
            TransformKind::RoomSession | TransformKind::Member => {
                return Err(CoreError::StateInconsistency {
                    reason: format!("{} is not an entity kind", kind.type_name()),
                });
            },
        };

        if phase == Lifecycle::Ended {
            self.instances.evict(&key);
        }
        tracing::debug!(key = %key, ?phase, "entity event");
        Ok(notice)
    }

    /// Drop the member handle once `member_id` is no longer addressable.
    fn evict_departed(&mut self, member_id: &str) {
        let addressable = self
            .segments
            .segments()
            .any(|s| s.self_member_id() == member_id || s.roster().contains(member_id));
        if addressable {
            return;
        }
        if self.instances.evict(&InstanceKey::new(TransformKind::Member, member_id)) {
            tracing::trace!(member_id, "member handle dropped");
        }
    }

    fn member_notices(&self, update: RosterUpdate) -> Vec<SessionNotice> {
        let RosterUpdate { call_id, change } = update;
        let effective = change.is_effective();
        let mut notices = Vec::new();
        push_member_notices(&mut notices, &call_id, change);
        if effective {
            notices.push(self.roster_changed(&call_id));
        }
        notices
    }

    /// Build and broadcast the consolidated roster notice for a leg.
    fn roster_changed(&self, call_id: &str) -> SessionNotice {
        let members = self
            .segments
            .segment_for(Some(call_id), None)
            .map(|s| s.roster().list())
            .unwrap_or_default();
        let snapshot = RosterSnapshot { call_id: call_id.to_string(), members };
        if self.roster_tx.send(snapshot.clone()).is_err() {
            tracing::trace!(call_id, "no roster subscribers");
        }
        SessionNotice::MemberListUpdated(snapshot)
    }

    fn current_call_id(&self) -> Result<String, CoreError> {
        self.segments.current().map(|s| s.call_id().to_string()).ok_or(CoreError::NotJoined)
    }

    /// Our persistent identity (root segment's self).
    pub fn self_member(&self) -> Option<&Member> {
        self.segments.self_member()
    }

    /// Default command target (current segment's self).
    pub fn target_member(&self) -> Option<&Member> {
        self.segments.target_member()
    }

    /// Current segment's roster.
    pub fn members(&self) -> Vec<Member> {
        self.segments.members()
    }

    /// Active segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.segments.segments()
    }

    /// Every segment joined during this session, closed ones included.
    pub fn history(&self) -> &[SegmentRecord] {
        self.segments.history()
    }

    /// Number of active segments.
    pub fn depth(&self) -> usize {
        self.segments.depth()
    }

    /// Number of behavior handles currently cached.
    pub fn cached_instances(&self) -> usize {
        self.instances.len()
    }

    /// Subscribe to consolidated roster changes.
    pub fn subscribe(&self) -> broadcast::Receiver<RosterSnapshot> {
        self.roster_tx.subscribe()
    }

    /// View of a member addressable by commands.
    ///
    /// # Errors
    ///
    /// `SessionError::NotJoined` before the first join and
    /// `SessionError::Resolution` if the member is not addressable.
    pub fn member_view(
        &mut self,
        member_id: &str,
    ) -> Result<InstanceView<MemberHandle>, SessionError> {
        self.segments.resolve_target(Some(member_id))?;
        let raw = self
            .segments
            .segments()
            .find(|s| s.self_member_id() == member_id)
            .and_then(Segment::self_member)
            .or_else(|| self.segments.current().and_then(|s| s.roster().get(member_id)))
            .map(Member::to_wire)
            .ok_or_else(|| SessionError::Resolution { member_id: member_id.to_string() })?;
        Ok(self.instances.view(&self.transforms.member, &raw)?)
    }

    /// Drop all call state.
    ///
    /// Commands already in flight are not affected; their futures still
    /// complete with whatever the transport returns.
    pub fn teardown(&mut self) {
        tracing::info!(depth = self.segments.depth(), instances = self.instances.len(), "teardown");
        self.segments.clear();
        self.instances.clear();
    }
}

/// Entity id the room-session handle of `segment` is cached under.
fn room_entity_id(segment: &Segment) -> &str {
    segment.room_session_id().unwrap_or_else(|| segment.call_id())
}

fn ignored(event: &WireEvent, reason: impl Into<String>) -> SessionNotice {
    SessionNotice::Ignored { event_type: event.event_type.clone(), reason: reason.into() }
}

fn push_member_notices(notices: &mut Vec<SessionNotice>, call_id: &str, change: RosterChange) {
    let call_id = call_id.to_string();
    match change {
        RosterChange::Joined(member) => {
            notices.push(SessionNotice::MemberJoined { call_id, member });
        },
        RosterChange::Left(member) => notices.push(SessionNotice::MemberLeft { call_id, member }),
        RosterChange::Updated { member, changed } => {
            let member_id = member.id.clone();
            let fields = changed.clone();
            notices.push(SessionNotice::MemberUpdated {
                call_id: call_id.clone(),
                member,
                changed,
            });
            for field in fields {
                notices.push(SessionNotice::MemberFieldUpdated {
                    call_id: call_id.clone(),
                    member_id: member_id.clone(),
                    field,
                });
            }
        },
    }
}

/// `member.talking.started` / `member.talking.ended` without a `talking` field.
fn talking_from_type(event_type: &str) -> Option<bool> {
    match event_type.rsplit('.').next()? {
        "started" | "start" => Some(true),
        "ended" | "stop" => Some(false),
        _ => None,
    }
}

fn with_room_session(raw: &Value, room_session_id: Option<&str>) -> Value {
    let mut raw = raw.clone();
    if let (Some(obj), Some(rs)) = (raw.as_object_mut(), room_session_id) {
        obj.entry("room_session_id").or_insert_with(|| Value::String(rs.to_string()));
    }
    raw
}
