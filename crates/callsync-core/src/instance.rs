//! Instance cache.
//!
//! Every event about the same entity yields a fresh [`InstanceView`] wrapping
//! the same behavior handle. The handle is created by the first event for a
//! `(type, entity id)` key and reused for every later one, whatever that
//! later payload says. Views carry the latest converted payload as an
//! immutable snapshot, so consumers get fresh data with stable behavior.
//!
//! The cache is owned by one session. Two sessions tracking entities with the
//! same ids never share handles.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::Arc,
};

use callsync_proto::{ConversionOptions, ExternalObject, ExternalValue};
use serde_json::Value;

use crate::{
    CoreError,
    transform::{EventTransform, TransformKind},
};

type AnyInstance = Arc<dyn Any + Send + Sync>;

/// Cache key: transform type name plus entity id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    /// Transform type name.
    pub type_name: &'static str,
    /// Entity id within that type.
    pub entity_id: String,
}

impl InstanceKey {
    /// Key of entity `entity_id` of `kind`.
    pub fn new(kind: TransformKind, entity_id: impl Into<String>) -> Self {
        Self { type_name: kind.type_name(), entity_id: entity_id.into() }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.entity_id)
    }
}

/// Session-scoped store of behavior handles.
#[derive(Default)]
pub struct InstanceCache {
    instances: HashMap<InstanceKey, AnyInstance>,
    options: ConversionOptions,
}

impl fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCache")
            .field("keys", &self.instances.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl InstanceCache {
    /// Empty cache using the default naming options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache converting payloads with `options`.
    pub fn with_options(options: ConversionOptions) -> Self {
        Self { instances: HashMap::new(), options }
    }

    /// View of the entity described by `raw`, creating its handle on first use.
    ///
    /// # Errors
    ///
    /// - `CoreError::MissingIdentity` if the transform finds no entity id.
    /// - `CoreError::InstanceTypeMismatch` if the key is already cached with a
    ///   handle of a different type (two transforms sharing a type name).
    pub fn view<T: EventTransform>(
        &mut self,
        transform: &T,
        raw: &Value,
    ) -> Result<InstanceView<T::Instance>, CoreError> {
        let type_name = transform.kind().type_name();
        let entity_id = transform.entity_id(raw).ok_or(CoreError::MissingIdentity { field: "id" })?;
        let key = InstanceKey { type_name, entity_id };

        let entry = self.instances.entry(key.clone()).or_insert_with(|| {
            tracing::trace!(key = %key, "instance created");
            Arc::new(transform.instance(raw)) as AnyInstance
        });
        let instance = Arc::clone(entry)
            .downcast::<T::Instance>()
            .map_err(|_| CoreError::InstanceTypeMismatch { type_name })?;

        Ok(InstanceView {
            key,
            instance,
            snapshot: Arc::new(transform.payload(raw, &self.options)),
            namespace: transform.namespace(raw),
            channel: transform.channel(raw),
        })
    }

    /// Cached handle for a key, without creating one.
    pub fn instance<H: Send + Sync + 'static>(&self, key: &InstanceKey) -> Option<Arc<H>> {
        self.instances.get(key).and_then(|i| Arc::clone(i).downcast::<H>().ok())
    }

    /// Whether a handle exists for `key`.
    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.instances.contains_key(key)
    }

    /// Drop the handle for `key`. Outstanding views keep theirs alive.
    pub fn evict(&mut self, key: &InstanceKey) -> bool {
        self.instances.remove(key).is_some()
    }

    /// Naming options used for snapshots.
    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Drop every handle.
    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

/// A behavior handle paired with the payload snapshot of one event.
pub struct InstanceView<H> {
    key: InstanceKey,
    instance: Arc<H>,
    snapshot: Arc<ExternalObject>,
    namespace: Option<String>,
    channel: Option<String>,
}

impl<H> InstanceView<H> {
    /// Cache key of the underlying handle.
    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    /// Entity id.
    pub fn entity_id(&self) -> &str {
        &self.key.entity_id
    }

    /// The shared behavior handle.
    pub fn instance(&self) -> &Arc<H> {
        &self.instance
    }

    /// Property of the converted payload.
    pub fn get(&self, property: &str) -> Option<&ExternalValue> {
        self.snapshot.get(property)
    }

    /// The whole converted payload.
    pub fn snapshot(&self) -> &ExternalObject {
        &self.snapshot
    }

    /// Namespace resolved from the raw payload.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Channel resolved from the raw payload.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Whether two views wrap the same handle.
    pub fn shares_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }

    /// JSON string of the payload snapshot, timestamps as RFC 3339.
    pub fn to_json_string(&self) -> String {
        let map = self.snapshot.iter().map(|(k, v)| (k.clone(), v.to_display_json())).collect();
        Value::Object(map).to_string()
    }
}

impl<H> Clone for InstanceView<H> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            instance: Arc::clone(&self.instance),
            snapshot: Arc::clone(&self.snapshot),
            namespace: self.namespace.clone(),
            channel: self.channel.clone(),
        }
    }
}

impl<H> fmt::Debug for InstanceView<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceView")
            .field("key", &self.key)
            .field("snapshot", &self.snapshot)
            .field("namespace", &self.namespace)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    struct Handle {
        created_from: String,
    }

    struct Counting {
        kind: TransformKind,
        built: AtomicUsize,
    }

    impl Counting {
        fn new(kind: TransformKind) -> Self {
            Self { kind, built: AtomicUsize::new(0) }
        }
    }

    impl EventTransform for Counting {
        type Instance = Handle;

        fn kind(&self) -> TransformKind {
            self.kind
        }

        fn instance(&self, raw: &Value) -> Handle {
            self.built.fetch_add(1, Ordering::SeqCst);
            Handle { created_from: raw["state"].as_str().unwrap_or_default().to_string() }
        }

        fn namespace(&self, raw: &Value) -> Option<String> {
            raw["room_session_id"].as_str().map(str::to_string)
        }
    }

    struct Other;

    impl EventTransform for Other {
        type Instance = u32;

        fn kind(&self) -> TransformKind {
            TransformKind::Recording
        }

        fn instance(&self, _raw: &Value) -> u32 {
            7
        }
    }

    #[test]
    fn same_key_shares_one_instance() {
        let mut cache = InstanceCache::new();
        let transform = Counting::new(TransformKind::Recording);

        let first = cache.view(&transform, &json!({ "id": "r1", "state": "recording" })).unwrap();
        let second = cache.view(&transform, &json!({ "id": "r1", "state": "paused" })).unwrap();

        assert!(first.shares_instance(&second));
        assert_eq!(transform.built.load(Ordering::SeqCst), 1);
        // first payload wins for the handle, latest payload wins for the data
        assert_eq!(second.instance().created_from, "recording");
        assert_eq!(second.get("state").unwrap().as_str(), Some("paused"));
        assert_eq!(first.get("state").unwrap().as_str(), Some("recording"));
    }

    #[test]
    fn different_types_never_share() {
        let mut cache = InstanceCache::new();
        let recording = Counting::new(TransformKind::Recording);
        let playback = Counting::new(TransformKind::Playback);

        let a = cache.view(&recording, &json!({ "id": "x" })).unwrap();
        let b = cache.view(&playback, &json!({ "id": "x" })).unwrap();
        assert!(!Arc::ptr_eq(a.instance(), b.instance()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn different_entities_never_share() {
        let mut cache = InstanceCache::new();
        let transform = Counting::new(TransformKind::Stream);

        let a = cache.view(&transform, &json!({ "id": "s1" })).unwrap();
        let b = cache.view(&transform, &json!({ "id": "s2" })).unwrap();
        assert!(!a.shares_instance(&b));
    }

    #[test]
    fn resolvers_read_raw_payload() {
        let mut cache = InstanceCache::new();
        let transform = Counting::new(TransformKind::Recording);
        let view = cache.view(&transform, &json!({ "id": "r1", "room_session_id": "rs" })).unwrap();

        assert_eq!(view.namespace(), Some("rs"));
        assert!(view.get("roomSessionId").is_some());
        assert!(view.get("room_session_id").is_none());
    }

    #[test]
    fn json_string_is_external() {
        let mut cache = InstanceCache::new();
        let transform = Counting::new(TransformKind::Recording);
        let view = cache.view(&transform, &json!({ "id": "r1", "started_at": 1 })).unwrap();

        let parsed: Value = serde_json::from_str(&view.to_json_string()).unwrap();
        assert_eq!(parsed, json!({ "id": "r1", "startedAt": "1970-01-01T00:00:01.000Z" }));
    }

    #[test]
    fn missing_id_is_rejected() {
        let mut cache = InstanceCache::new();
        let transform = Counting::new(TransformKind::Recording);
        let err = cache.view(&transform, &json!({ "state": "x" })).unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn type_mismatch_is_fatal() {
        let mut cache = InstanceCache::new();
        cache.view(&Counting::new(TransformKind::Recording), &json!({ "id": "r" })).unwrap();
        let err = cache.view(&Other, &json!({ "id": "r" })).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn evict_and_clear() {
        let mut cache = InstanceCache::new();
        let transform = Counting::new(TransformKind::Playback);
        let view = cache.view(&transform, &json!({ "id": "p" })).unwrap();

        assert!(cache.instance::<Handle>(view.key()).is_some());
        assert!(cache.evict(view.key()));
        assert!(!cache.contains(view.key()));
        // views keep their handle alive
        assert_eq!(view.instance().created_from, "");

        cache.view(&transform, &json!({ "id": "q" })).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
