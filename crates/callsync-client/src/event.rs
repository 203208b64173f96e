//! Session notices.
//!
//! [`Session::handle`](crate::Session::handle) returns the notices one inbound
//! event produced, in the order consumers should see them. Roster mutations
//! come in two granularities: per-member notices for field-level reactions and
//! a trailing [`SessionNotice::MemberListUpdated`] carrying the whole roster.

use callsync_core::{InstanceView, Member};
use callsync_proto::{ExternalObject, Lifecycle};
use serde::Serialize;

use crate::handles::{PlaybackHandle, RecordingHandle, RoomSessionHandle, StreamHandle};

/// Roster of one leg after a mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterSnapshot {
    /// Leg the roster belongs to.
    pub call_id: String,
    /// Members in insertion order.
    pub members: Vec<Member>,
}

/// Something that changed while handling an event.
#[derive(Debug, Clone)]
pub enum SessionNotice {
    /// A new leg became the current segment.
    SegmentPushed {
        /// The new leg.
        call_id: String,
        /// Stack depth after the push.
        depth: usize,
        /// View of the joined room session.
        room: InstanceView<RoomSessionHandle>,
    },

    /// A joined event for an already active leg reconciled its roster.
    SegmentRefreshed {
        /// The refreshed leg.
        call_id: String,
    },

    /// The current leg was torn down.
    SegmentPopped {
        /// The popped leg.
        call_id: String,
        /// Stack depth after the pop.
        depth: usize,
        /// Server-supplied reason.
        reason: Option<String>,
    },

    /// A member entered a roster.
    MemberJoined {
        /// Leg of the roster.
        call_id: String,
        /// The new member.
        member: Member,
    },

    /// A member left a roster.
    MemberLeft {
        /// Leg of the roster.
        call_id: String,
        /// The member as last known.
        member: Member,
    },

    /// A member update was applied. `changed` is empty for a repeated update.
    MemberUpdated {
        /// Leg of the roster.
        call_id: String,
        /// The member after the merge.
        member: Member,
        /// Wire names of the fields that changed.
        changed: Vec<String>,
    },

    /// One field of a member changed.
    MemberFieldUpdated {
        /// Leg of the roster.
        call_id: String,
        /// The member.
        member_id: String,
        /// Wire name of the field.
        field: String,
    },

    /// Consolidated roster-changed signal, after every roster mutation.
    MemberListUpdated(RosterSnapshot),

    /// Recording lifecycle.
    Recording {
        /// Lifecycle phase.
        phase: Lifecycle,
        /// Latest view of the recording.
        view: InstanceView<RecordingHandle>,
    },

    /// Playback lifecycle.
    Playback {
        /// Lifecycle phase.
        phase: Lifecycle,
        /// Latest view of the playback.
        view: InstanceView<PlaybackHandle>,
    },

    /// Outbound stream lifecycle.
    Stream {
        /// Lifecycle phase.
        phase: Lifecycle,
        /// Latest view of the stream.
        view: InstanceView<StreamHandle>,
    },

    /// The room layout changed. Passed through for rendering code.
    LayoutChanged {
        /// External form of the event params.
        layout: ExternalObject,
    },

    /// The event changed nothing.
    Ignored {
        /// Event type.
        event_type: String,
        /// Why it was dropped.
        reason: String,
    },
}

impl SessionNotice {
    /// Whether this notice reports a roster mutation.
    pub fn is_roster_change(&self) -> bool {
        matches!(self, Self::MemberListUpdated(_))
    }
}
