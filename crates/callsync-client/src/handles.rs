//! Behavior handles and the transforms that build them.
//!
//! A handle is the stable half of an [`InstanceView`](callsync_core::InstanceView):
//! it knows which entity it addresses and builds the requests that act on it.
//! Handles never send anything; room-level requests go through
//! [`Session::execute_raw`](crate::Session::execute_raw) and member actions
//! through [`Session::execute_action`](crate::Session::execute_action), so
//! self/target resolution stays in one place.

use callsync_core::{EventTransform, TransformKind};
use callsync_proto::{RpcRequest, payloads::SessionJoinedParams};
use serde_json::{Map, Value, json};

use crate::executor::ActionRequest;

fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn entity_channel(kind: TransformKind, raw: &Value) -> Option<String> {
    str_field(raw, "id").map(|id| format!("{}.{id}", kind.type_name()))
}

/// A joined room session.
#[derive(Debug)]
pub struct RoomSessionHandle {
    namespace: String,
    room_session_id: String,
}

impl RoomSessionHandle {
    /// Room session id (or call id when the leg has none).
    pub fn room_session_id(&self) -> &str {
        &self.room_session_id
    }

    fn request(&self, verb: &str, extra: Map<String, Value>) -> RpcRequest {
        let mut params = Map::new();
        params.insert("room_session_id".to_string(), json!(self.room_session_id));
        params.extend(extra);
        RpcRequest::with_params(format!("{}.{verb}", self.namespace), Value::Object(params))
    }

    /// Start recording the room.
    pub fn start_recording(&self) -> RpcRequest {
        self.request("recording.start", Map::new())
    }

    /// Play media into the room.
    pub fn play(&self, url: &str, volume: Option<f64>) -> RpcRequest {
        let mut extra = Map::new();
        extra.insert("url".to_string(), json!(url));
        if let Some(volume) = volume {
            extra.insert("volume".to_string(), json!(volume));
        }
        self.request("play", extra)
    }

    /// Stream the room to an RTMP endpoint.
    pub fn start_stream(&self, url: &str) -> RpcRequest {
        let mut extra = Map::new();
        extra.insert("url".to_string(), json!(url));
        self.request("stream.start", extra)
    }

    /// Fetch the server's view of the roster.
    pub fn get_members(&self) -> RpcRequest {
        self.request("members.get", Map::new())
    }
}

/// A room member.
#[derive(Debug)]
pub struct MemberHandle {
    namespace: String,
    member_id: String,
}

impl MemberHandle {
    /// Member id.
    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Mute the member's microphone.
    pub fn audio_mute(&self) -> ActionRequest {
        ActionRequest::audio_mute(&self.namespace, Some(&self.member_id))
    }

    /// Unmute the member's microphone.
    pub fn audio_unmute(&self) -> ActionRequest {
        ActionRequest::audio_unmute(&self.namespace, Some(&self.member_id))
    }

    /// Mute the member's camera.
    pub fn video_mute(&self) -> ActionRequest {
        ActionRequest::video_mute(&self.namespace, Some(&self.member_id))
    }

    /// Unmute the member's camera.
    pub fn video_unmute(&self) -> ActionRequest {
        ActionRequest::video_unmute(&self.namespace, Some(&self.member_id))
    }

    /// Remove the member from the room.
    pub fn remove(&self) -> ActionRequest {
        ActionRequest::remove_member(&self.namespace, &self.member_id)
    }
}

/// Shared shape of recording, playback and stream handles.
#[derive(Debug)]
struct EntityRef {
    namespace: String,
    room_session_id: Option<String>,
    id: String,
}

impl EntityRef {
    fn from_raw(namespace: &str, raw: &Value) -> Self {
        Self {
            namespace: namespace.to_string(),
            room_session_id: str_field(raw, "room_session_id"),
            id: str_field(raw, "id").unwrap_or_default(),
        }
    }

    fn request(&self, kind: TransformKind, verb: &str, extra: Map<String, Value>) -> RpcRequest {
        let type_name = kind.type_name();
        let mut params = Map::new();
        if let Some(rs) = &self.room_session_id {
            params.insert("room_session_id".to_string(), json!(rs));
        }
        params.insert(format!("{type_name}_id"), json!(self.id));
        params.extend(extra);
        RpcRequest::with_params(
            format!("{}.{type_name}.{verb}", self.namespace),
            Value::Object(params),
        )
    }
}

/// A room recording.
#[derive(Debug)]
pub struct RecordingHandle(EntityRef);

impl RecordingHandle {
    /// Recording id.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Pause the recording.
    pub fn pause(&self) -> RpcRequest {
        self.0.request(TransformKind::Recording, "pause", Map::new())
    }

    /// Resume a paused recording.
    pub fn resume(&self) -> RpcRequest {
        self.0.request(TransformKind::Recording, "resume", Map::new())
    }

    /// Stop the recording.
    pub fn stop(&self) -> RpcRequest {
        self.0.request(TransformKind::Recording, "stop", Map::new())
    }
}

/// A media playback.
#[derive(Debug)]
pub struct PlaybackHandle(EntityRef);

impl PlaybackHandle {
    /// Playback id.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Pause the playback.
    pub fn pause(&self) -> RpcRequest {
        self.0.request(TransformKind::Playback, "pause", Map::new())
    }

    /// Resume a paused playback.
    pub fn resume(&self) -> RpcRequest {
        self.0.request(TransformKind::Playback, "resume", Map::new())
    }

    /// Stop the playback.
    pub fn stop(&self) -> RpcRequest {
        self.0.request(TransformKind::Playback, "stop", Map::new())
    }

    /// Change the playback volume.
    pub fn set_volume(&self, volume: f64) -> RpcRequest {
        let mut extra = Map::new();
        extra.insert("volume".to_string(), json!(volume));
        self.0.request(TransformKind::Playback, "set_volume", extra)
    }
}

/// An outbound stream.
#[derive(Debug)]
pub struct StreamHandle(EntityRef);

impl StreamHandle {
    /// Stream id.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Stop the stream.
    pub fn stop(&self) -> RpcRequest {
        self.0.request(TransformKind::Stream, "stop", Map::new())
    }
}

/// Builds [`RoomSessionHandle`]s from joined-event params.
#[derive(Debug, Clone)]
pub struct RoomSessionTransform {
    namespace: String,
}

impl RoomSessionTransform {
    /// Transform issuing commands under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }
}

impl EventTransform for RoomSessionTransform {
    type Instance = RoomSessionHandle;

    fn kind(&self) -> TransformKind {
        TransformKind::RoomSession
    }

    fn entity_id(&self, raw: &Value) -> Option<String> {
        let params = SessionJoinedParams::parse("joined", raw).ok()?;
        params.room_session_id().or_else(|| params.segment_key()).map(str::to_string)
    }

    fn instance(&self, raw: &Value) -> RoomSessionHandle {
        RoomSessionHandle {
            namespace: self.namespace.clone(),
            room_session_id: self.entity_id(raw).unwrap_or_default(),
        }
    }

    fn namespace(&self, raw: &Value) -> Option<String> {
        self.entity_id(raw)
    }

    fn channel(&self, raw: &Value) -> Option<String> {
        self.entity_id(raw).map(|id| format!("{}.{id}", TransformKind::RoomSession.type_name()))
    }
}

/// Builds [`MemberHandle`]s from wire member objects.
#[derive(Debug, Clone)]
pub struct MemberTransform {
    namespace: String,
}

impl MemberTransform {
    /// Transform issuing commands under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }
}

impl EventTransform for MemberTransform {
    type Instance = MemberHandle;

    fn kind(&self) -> TransformKind {
        TransformKind::Member
    }

    fn entity_id(&self, raw: &Value) -> Option<String> {
        str_field(raw, "id").or_else(|| str_field(raw, "member_id"))
    }

    fn instance(&self, raw: &Value) -> MemberHandle {
        MemberHandle {
            namespace: self.namespace.clone(),
            member_id: self.entity_id(raw).unwrap_or_default(),
        }
    }

    fn namespace(&self, raw: &Value) -> Option<String> {
        str_field(raw, "room_session_id")
    }

    fn channel(&self, raw: &Value) -> Option<String> {
        self.entity_id(raw).map(|id| format!("{}.{id}", TransformKind::Member.type_name()))
    }
}

/// Builds [`RecordingHandle`]s.
#[derive(Debug, Clone)]
pub struct RecordingTransform {
    namespace: String,
}

impl RecordingTransform {
    /// Transform issuing commands under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }
}

impl EventTransform for RecordingTransform {
    type Instance = RecordingHandle;

    fn kind(&self) -> TransformKind {
        TransformKind::Recording
    }

    fn instance(&self, raw: &Value) -> RecordingHandle {
        RecordingHandle(EntityRef::from_raw(&self.namespace, raw))
    }

    fn namespace(&self, raw: &Value) -> Option<String> {
        str_field(raw, "room_session_id")
    }

    fn channel(&self, raw: &Value) -> Option<String> {
        entity_channel(self.kind(), raw)
    }
}

/// Builds [`PlaybackHandle`]s.
#[derive(Debug, Clone)]
pub struct PlaybackTransform {
    namespace: String,
}

impl PlaybackTransform {
    /// Transform issuing commands under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }
}

impl EventTransform for PlaybackTransform {
    type Instance = PlaybackHandle;

    fn kind(&self) -> TransformKind {
        TransformKind::Playback
    }

    fn instance(&self, raw: &Value) -> PlaybackHandle {
        PlaybackHandle(EntityRef::from_raw(&self.namespace, raw))
    }

    fn namespace(&self, raw: &Value) -> Option<String> {
        str_field(raw, "room_session_id")
    }

    fn channel(&self, raw: &Value) -> Option<String> {
        entity_channel(self.kind(), raw)
    }
}

/// Builds [`StreamHandle`]s.
#[derive(Debug, Clone)]
pub struct StreamTransform {
    namespace: String,
}

impl StreamTransform {
    /// Transform issuing commands under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }
}

impl EventTransform for StreamTransform {
    type Instance = StreamHandle;

    fn kind(&self) -> TransformKind {
        TransformKind::Stream
    }

    fn instance(&self, raw: &Value) -> StreamHandle {
        StreamHandle(EntityRef::from_raw(&self.namespace, raw))
    }

    fn namespace(&self, raw: &Value) -> Option<String> {
        str_field(raw, "room_session_id")
    }

    fn channel(&self, raw: &Value) -> Option<String> {
        entity_channel(self.kind(), raw)
    }
}

/// The built-in transforms of one session.
#[derive(Debug, Clone)]
pub(crate) struct Transforms {
    pub(crate) room: RoomSessionTransform,
    pub(crate) member: MemberTransform,
    pub(crate) recording: RecordingTransform,
    pub(crate) playback: PlaybackTransform,
    pub(crate) stream: StreamTransform,
}

impl Transforms {
    pub(crate) fn new(namespace: &str) -> Self {
        Self {
            room: RoomSessionTransform::new(namespace),
            member: MemberTransform::new(namespace),
            recording: RecordingTransform::new(namespace),
            playback: PlaybackTransform::new(namespace),
            stream: StreamTransform::new(namespace),
        }
    }
}
