//! Command executor.
//!
//! Commands are built as [`ActionRequest`]s and turned into [`RpcRequest`]s
//! against the session's state at the moment they are issued:
//!
//! ```text
//! { method, params: { channels?: [channel], self, target, ...extra_params } }
//! ```
//!
//! `self` is always the root segment's self. `target` is the current
//! segment's self unless the action names a member, which is then resolved
//! with the two-tier rule of [`SegmentTracker::resolve_target`].
//!
//! The returned future owns everything it needs. Pushing or popping a segment
//! while a command is in flight cannot change whom that command addresses, and
//! nothing in local state is touched when the response arrives.
//!
//! [`SegmentTracker::resolve_target`]: callsync_core::SegmentTracker::resolve_target

use std::{future::Future, sync::Arc};

use callsync_proto::{MemberRef, RpcRequest};
use serde_json::{Map, Value, json};

use crate::{Session, SessionError, transport::RpcTransport};

/// A member or room command before identity resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    /// Fully-qualified method.
    pub method: String,
    /// Media channel the command applies to (`audio`, `video`).
    pub channel: Option<String>,
    /// Explicit target. `None` targets the current segment's self.
    pub member_id: Option<String>,
    /// Parameters merged after `self`/`target`; may override them.
    pub extra_params: Map<String, Value>,
}

impl ActionRequest {
    /// Action for `method` targeting the current self.
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into(), channel: None, member_id: None, extra_params: Map::new() }
    }

    /// Restrict the action to a media channel.
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Target an explicit member, or the current self with `None`.
    #[must_use]
    pub fn target(mut self, member_id: Option<&str>) -> Self {
        self.member_id = member_id.map(str::to_string);
        self
    }

    /// Add an extra parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Assemble the request from resolved identities.
    pub fn build(&self, self_ref: &MemberRef, target: &MemberRef) -> RpcRequest {
        let mut params = Map::new();
        if let Some(channel) = &self.channel {
            params.insert("channels".to_string(), json!([channel]));
        }
        params.insert("self".to_string(), json!(self_ref));
        params.insert("target".to_string(), json!(target));
        for (key, value) in &self.extra_params {
            params.insert(key.clone(), value.clone());
        }
        RpcRequest::with_params(self.method.clone(), Value::Object(params))
    }

    fn verb(namespace: &str, verb: &str) -> Self {
        Self::new(format!("{namespace}.{verb}"))
    }

    /// Mute a member's microphone.
    pub fn audio_mute(namespace: &str, member_id: Option<&str>) -> Self {
        Self::verb(namespace, "mute").channel("audio").target(member_id)
    }

    /// Unmute a member's microphone.
    pub fn audio_unmute(namespace: &str, member_id: Option<&str>) -> Self {
        Self::verb(namespace, "unmute").channel("audio").target(member_id)
    }

    /// Mute a member's camera.
    pub fn video_mute(namespace: &str, member_id: Option<&str>) -> Self {
        Self::verb(namespace, "mute").channel("video").target(member_id)
    }

    /// Unmute a member's camera.
    pub fn video_unmute(namespace: &str, member_id: Option<&str>) -> Self {
        Self::verb(namespace, "unmute").channel("video").target(member_id)
    }

    /// Stop a member from hearing the room.
    pub fn deaf(namespace: &str, member_id: Option<&str>) -> Self {
        Self::verb(namespace, "deaf").target(member_id)
    }

    /// Let a member hear the room again.
    pub fn undeaf(namespace: &str, member_id: Option<&str>) -> Self {
        Self::verb(namespace, "undeaf").target(member_id)
    }

    /// Set a member's microphone gain.
    pub fn set_input_volume(namespace: &str, member_id: Option<&str>, volume: f64) -> Self {
        Self::verb(namespace, "microphone.volume.set").target(member_id).param("volume", volume)
    }

    /// Set a member's speaker volume.
    pub fn set_output_volume(namespace: &str, member_id: Option<&str>, volume: f64) -> Self {
        Self::verb(namespace, "speaker.volume.set").target(member_id).param("volume", volume)
    }

    /// Set a member's noise-gate sensitivity.
    pub fn set_input_sensitivity(namespace: &str, member_id: Option<&str>, value: f64) -> Self {
        Self::verb(namespace, "microphone.sensitivity.set").target(member_id).param("value", value)
    }

    /// Remove a member. The target is always explicit.
    pub fn remove_member(namespace: &str, member_id: &str) -> Self {
        Self::verb(namespace, "member.remove").target(Some(member_id))
    }

    /// Raise or lower a member's hand.
    pub fn set_raised_hand(namespace: &str, member_id: Option<&str>, raised: bool) -> Self {
        let verb = if raised { "member.raisehand" } else { "member.lowerhand" };
        Self::verb(namespace, verb).target(member_id)
    }

    /// Pin a member to a layout position.
    pub fn set_member_position(namespace: &str, member_id: Option<&str>, position: &str) -> Self {
        Self::verb(namespace, "member.position.set").target(member_id).param("position", position)
    }
}

impl<T: RpcTransport> Session<T> {
    /// Resolve identities and build the request for an action.
    ///
    /// # Errors
    ///
    /// `SessionError::NotJoined` before the first join and
    /// `SessionError::Resolution` for an unknown explicit member.
    pub fn prepare_action(&self, action: &ActionRequest) -> Result<RpcRequest, SessionError> {
        let target = self.segments.resolve_target(action.member_id.as_deref())?;
        let self_ref = self.segments.self_ref()?;
        Ok(action.build(&self_ref, &target))
    }

    /// Execute an action.
    ///
    /// Identities are captured when this is called, not when the future is
    /// first polled. Resolution failures are returned without touching the
    /// transport; transport results are returned unchanged.
    pub fn execute_action(
        &self,
        action: ActionRequest,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        let prepared = self.prepare_action(&action);
        if let Err(e) = &prepared {
            tracing::debug!(method = %action.method, error = %e, "command not sent");
        }
        let transport = Arc::clone(&self.transport);
        async move {
            let request = prepared?;
            tracing::debug!(method = %request.method, "executing command");
            Ok(transport.execute(request).await?)
        }
    }

    /// Execute a pre-built request, e.g. from a behavior handle.
    pub fn execute_raw(
        &self,
        request: RpcRequest,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        let transport = Arc::clone(&self.transport);
        async move {
            tracing::debug!(method = %request.method, "executing request");
            Ok(transport.execute(request).await?)
        }
    }

    fn ns(&self) -> &str {
        &self.config.command_namespace
    }

    /// Mute a member's microphone (`None`: current self).
    pub fn audio_mute(
        &self,
        member_id: Option<&str>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::audio_mute(self.ns(), member_id))
    }

    /// Unmute a member's microphone.
    pub fn audio_unmute(
        &self,
        member_id: Option<&str>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::audio_unmute(self.ns(), member_id))
    }

    /// Mute a member's camera.
    pub fn video_mute(
        &self,
        member_id: Option<&str>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::video_mute(self.ns(), member_id))
    }

    /// Unmute a member's camera.
    pub fn video_unmute(
        &self,
        member_id: Option<&str>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::video_unmute(self.ns(), member_id))
    }

    /// Stop a member from hearing the room.
    pub fn deaf(
        &self,
        member_id: Option<&str>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::deaf(self.ns(), member_id))
    }

    /// Let a member hear the room again.
    pub fn undeaf(
        &self,
        member_id: Option<&str>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::undeaf(self.ns(), member_id))
    }

    /// Set a member's microphone gain.
    pub fn set_input_volume(
        &self,
        member_id: Option<&str>,
        volume: f64,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::set_input_volume(self.ns(), member_id, volume))
    }

    /// Set a member's speaker volume.
    pub fn set_output_volume(
        &self,
        member_id: Option<&str>,
        volume: f64,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::set_output_volume(self.ns(), member_id, volume))
    }

    /// Set a member's noise-gate sensitivity.
    pub fn set_input_sensitivity(
        &self,
        member_id: Option<&str>,
        value: f64,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::set_input_sensitivity(self.ns(), member_id, value))
    }

    /// Remove a member from the room.
    pub fn remove_member(
        &self,
        member_id: &str,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::remove_member(self.ns(), member_id))
    }

    /// Raise or lower a member's hand.
    pub fn set_raised_hand(
        &self,
        member_id: Option<&str>,
        raised: bool,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::set_raised_hand(self.ns(), member_id, raised))
    }

    /// Pin a member to a layout position.
    pub fn set_member_position(
        &self,
        member_id: Option<&str>,
        position: &str,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::set_member_position(self.ns(), member_id, position))
    }

    /// Switch the room layout.
    pub fn set_layout(
        &self,
        name: &str,
        positions: Option<Map<String, Value>>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        let mut action = ActionRequest::verb(self.ns(), "layout.set").param("layout", name);
        if let Some(positions) = positions {
            action = action.param("positions", Value::Object(positions));
        }
        self.execute_action(action)
    }

    /// List the layouts available to the room.
    pub fn get_layouts(&self) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::verb(self.ns(), "layout.list"))
    }

    /// Assign layout positions to several members at once (member id → position).
    pub fn set_positions(
        &self,
        positions: Map<String, Value>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        let action =
            ActionRequest::verb(self.ns(), "layout.positions.set").param("positions", positions);
        self.execute_action(action)
    }

    /// Lock the room against new participants.
    pub fn lock(&self) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::verb(self.ns(), "lock"))
    }

    /// Unlock the room.
    pub fn unlock(&self) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::verb(self.ns(), "unlock"))
    }

    /// End the call for everyone.
    pub fn end(&self) -> impl Future<Output = Result<Value, SessionError>> + Send + use<T> {
        self.execute_action(ActionRequest::verb(self.ns(), "end"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn member(id: &str, call: &str) -> MemberRef {
        MemberRef { member_id: id.to_string(), call_id: call.to_string(), node_id: "n".to_string() }
    }

    #[test]
    fn build_places_channel_identities_and_extras() {
        let action = ActionRequest::audio_mute("call", Some("B")).param("reason", "noise");
        let request = action.build(&member("A", "c1"), &member("B", "c2"));

        assert_eq!(request.method, "call.mute");
        assert_eq!(
            request.params,
            json!({
                "channels": ["audio"],
                "self": { "member_id": "A", "call_id": "c1", "node_id": "n" },
                "target": { "member_id": "B", "call_id": "c2", "node_id": "n" },
                "reason": "noise",
            })
        );
    }

    #[test]
    fn no_channel_key_without_channel() {
        let request = ActionRequest::deaf("call", None).build(&member("A", "c"), &member("A", "c"));
        assert!(request.param("channels").is_none());
    }

    #[test]
    fn extra_params_may_override_target() {
        let action = ActionRequest::new("call.custom").param("target", "raw");
        let request = action.build(&member("A", "c"), &member("A", "c"));
        assert_eq!(request.param("target"), Some(&json!("raw")));
    }

    #[test]
    fn raised_hand_picks_verb() {
        assert_eq!(
            ActionRequest::set_raised_hand("video", None, true).method,
            "video.member.raisehand"
        );
        assert_eq!(
            ActionRequest::set_raised_hand("video", None, false).method,
            "video.member.lowerhand"
        );
    }
}
