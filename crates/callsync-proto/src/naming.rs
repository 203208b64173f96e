//! Key-casing translation between wire and external JSON.
//!
//! The wire speaks `snake_case`; consumers see `lowerCamelCase`. Conversion is
//! recursive over objects. Arrays are only walked when their key is listed as
//! convertible (member lists, recording/playback/stream lists, the `updated`
//! diff array); plain strings inside such arrays are case-converted too, so
//! `updated: ["audio_muted"]` becomes `updated: ["audioMuted"]`.
//!
//! On the wire → external direction, properties whose external name ends with
//! the timestamp suffix (`At`) carry epoch seconds and become
//! [`ExternalValue::Timestamp`]. The reverse direction turns timestamps back
//! into epoch seconds; sub-microsecond precision does not survive.
//!
//! An object holding [`EXTERNAL_MARKER`] is already external and passes through
//! either direction untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use heck::{ToLowerCamelCase, ToSnakeCase};
use serde_json::{Map, Number, Value};

/// Key that flags an object as already converted.
pub const EXTERNAL_MARKER: &str = "__external";

/// Array-valued keys converted element-wise by default.
pub const DEFAULT_CONVERTIBLE_KEYS: &[&str] =
    &["members", "recordings", "playbacks", "streams", "layers", "updated"];

/// Suffix of external property names carrying epoch-second timestamps.
pub const DEFAULT_TIMESTAMP_SUFFIX: &str = "At";

/// External object representation with deterministic key order.
pub type ExternalObject = BTreeMap<String, ExternalValue>;

/// A JSON-like value in external casing.
///
/// Mirrors [`serde_json::Value`] with one addition: timestamps decoded from
/// epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalValue {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number.
    Number(Number),
    /// JSON string.
    String(String),
    /// Epoch-seconds value decoded into a UTC date.
    Timestamp(DateTime<Utc>),
    /// JSON array.
    List(Vec<ExternalValue>),
    /// JSON object.
    Object(ExternalObject),
}

impl ExternalValue {
    /// Borrow as an object.
    pub fn as_object(&self) -> Option<&ExternalObject> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Read as a timestamp.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Render as display JSON without changing key casing.
    ///
    /// Timestamps become RFC 3339 strings, which is what consumers expect when
    /// stringifying a snapshot.
    pub fn to_display_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::List(items) => Value::Array(items.iter().map(Self::to_display_json).collect()),
            Self::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_display_json())).collect(),
            ),
        }
    }

    /// Structural copy of a JSON value, no key conversion.
    fn verbatim(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::verbatim).collect()),
            Value::Object(map) => {
                Self::Object(map.iter().map(|(k, v)| (k.clone(), Self::verbatim(v))).collect())
            },
        }
    }

    /// Structural copy into wire JSON, no key conversion.
    fn to_wire_verbatim(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => timestamp_to_seconds(*ts),
            Self::List(items) => Value::Array(items.iter().map(Self::to_wire_verbatim).collect()),
            Self::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_wire_verbatim())).collect(),
            ),
        }
    }

    fn is_marked(&self) -> bool {
        self.as_object().is_some_and(|map| map.contains_key(EXTERNAL_MARKER))
    }
}

impl From<&Value> for ExternalValue {
    /// Structural copy; keys are taken as already external.
    fn from(value: &Value) -> Self {
        Self::verbatim(value)
    }
}

/// Tunables for the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Array-valued keys whose elements are converted.
    pub convertible_keys: Vec<String>,
    /// External-name suffix identifying timestamp properties.
    pub timestamp_suffix: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            convertible_keys: DEFAULT_CONVERTIBLE_KEYS.iter().map(|k| (*k).to_string()).collect(),
            timestamp_suffix: DEFAULT_TIMESTAMP_SUFFIX.to_string(),
        }
    }
}

impl ConversionOptions {
    /// Add extra convertible list keys on top of the defaults.
    #[must_use]
    pub fn with_convertible_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if !self.convertible_keys.contains(&key) {
                self.convertible_keys.push(key);
            }
        }
        self
    }

    fn is_convertible(&self, key: &str) -> bool {
        self.convertible_keys.iter().any(|k| k == key)
    }

    fn is_timestamp(&self, external_key: &str) -> bool {
        external_key.len() > self.timestamp_suffix.len()
            && external_key.ends_with(&self.timestamp_suffix)
    }
}

/// `audio_muted` → `audioMuted`.
pub fn snake_to_camel(value: &str) -> String {
    value.to_lower_camel_case()
}

/// `audioMuted` → `audio_muted`.
pub fn camel_to_snake(value: &str) -> String {
    value.to_snake_case()
}

/// Convert wire JSON to external form with default options.
pub fn to_external(value: &Value) -> ExternalValue {
    to_external_with(value, &ConversionOptions::default())
}

/// Convert wire JSON to external form.
pub fn to_external_with(value: &Value, options: &ConversionOptions) -> ExternalValue {
    match value {
        Value::Object(map) if map.contains_key(EXTERNAL_MARKER) => ExternalValue::verbatim(value),
        Value::Object(map) => ExternalValue::Object(object_to_external(map, options)),
        Value::Array(items) => {
            ExternalValue::List(items.iter().map(|v| to_external_with(v, options)).collect())
        },
        other => ExternalValue::verbatim(other),
    }
}

/// Convert a wire object to an external object with default options.
///
/// Non-object input yields an empty object.
pub fn object_to_external_default(value: &Value) -> ExternalObject {
    match to_external(value) {
        ExternalValue::Object(map) => map,
        _ => ExternalObject::new(),
    }
}

fn object_to_external(map: &Map<String, Value>, options: &ConversionOptions) -> ExternalObject {
    let mut out = ExternalObject::new();
    for (key, value) in map {
        let prop = snake_to_camel(key);
        let converted = match value {
            Value::Array(items) if options.is_convertible(key) => ExternalValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => ExternalValue::String(snake_to_camel(s)),
                        other => to_external_with(other, options),
                    })
                    .collect(),
            ),
            Value::Array(_) => ExternalValue::verbatim(value),
            Value::Object(_) => to_external_with(value, options),
            Value::Number(n) if options.is_timestamp(&prop) => seconds_to_timestamp(n)
                .map_or_else(|| ExternalValue::verbatim(value), ExternalValue::Timestamp),
            other => ExternalValue::verbatim(other),
        };
        out.insert(prop, converted);
    }
    out
}

/// Convert external form back to wire JSON with default options.
pub fn to_wire(value: &ExternalValue) -> Value {
    to_wire_with(value, &ConversionOptions::default())
}

/// Convert external form back to wire JSON.
pub fn to_wire_with(value: &ExternalValue, options: &ConversionOptions) -> Value {
    match value {
        ExternalValue::Object(_) if value.is_marked() => value.to_wire_verbatim(),
        ExternalValue::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let wire_key = camel_to_snake(key);
                let converted = match value {
                    ExternalValue::List(items) if options.is_convertible(&wire_key) => {
                        Value::Array(
                            items
                                .iter()
                                .map(|item| match item {
                                    ExternalValue::String(s) => Value::String(camel_to_snake(s)),
                                    other => to_wire_with(other, options),
                                })
                                .collect(),
                        )
                    },
                    ExternalValue::List(_) => value.to_wire_verbatim(),
                    other => to_wire_with(other, options),
                };
                out.insert(wire_key, converted);
            }
            Value::Object(out)
        },
        ExternalValue::List(items) => {
            Value::Array(items.iter().map(|v| to_wire_with(v, options)).collect())
        },
        other => other.to_wire_verbatim(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn seconds_to_timestamp(n: &Number) -> Option<DateTime<Utc>> {
    let secs = n.as_f64()?;
    if secs == 0.0 || !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
}

#[allow(clippy::cast_precision_loss)]
fn timestamp_to_seconds(ts: DateTime<Utc>) -> Value {
    let micros = ts.timestamp_micros();
    if micros % 1_000_000 == 0 {
        return Value::Number(Number::from(micros / 1_000_000));
    }
    Number::from_f64(micros as f64 / 1_000_000.0).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn converts_nested_keys() {
        let wire = json!({
            "room_session_id": "rs-1",
            "member": { "audio_muted": true, "input_volume": -6 }
        });

        let external = to_external(&wire);
        let obj = external.as_object().unwrap();
        assert_eq!(obj["roomSessionId"].as_str(), Some("rs-1"));
        let member = obj["member"].as_object().unwrap();
        assert_eq!(member["audioMuted"].as_bool(), Some(true));
        assert_eq!(member["inputVolume"].as_f64(), Some(-6.0));
    }

    #[test]
    fn convertible_lists_are_walked() {
        let wire = json!({
            "members": [{ "member_id": "m1", "video_muted": false }],
            "updated": ["audio_muted", "input_volume"],
        });

        let external = to_external(&wire);
        let obj = external.as_object().unwrap();
        let ExternalValue::List(members) = &obj["members"] else { panic!("members not a list") };
        assert!(members[0].as_object().unwrap().contains_key("memberId"));
        assert_eq!(
            obj["updated"],
            ExternalValue::List(vec![
                ExternalValue::String("audioMuted".to_string()),
                ExternalValue::String("inputVolume".to_string()),
            ])
        );
    }

    #[test]
    fn other_lists_are_copied_verbatim() {
        let wire = json!({ "layout_positions": [{ "member_id": "m1" }] });
        let external = to_external(&wire);
        let obj = external.as_object().unwrap();
        let ExternalValue::List(items) = &obj["layoutPositions"] else { panic!("not a list") };
        assert!(items[0].as_object().unwrap().contains_key("member_id"));
    }

    #[test]
    fn timestamps_become_dates_outbound_only() {
        let wire = json!({ "started_at": 1_700_000_000.25, "ended_at": 0 });
        let external = to_external(&wire);
        let obj = external.as_object().unwrap();

        let started = obj["startedAt"].as_timestamp().unwrap();
        assert_eq!(started.timestamp(), 1_700_000_000);
        assert_eq!(started.timestamp_subsec_millis(), 250);
        // zero means "not set" and stays numeric
        assert_eq!(obj["endedAt"].as_f64(), Some(0.0));

        let back = to_wire(&external);
        assert_eq!(back["started_at"], json!(1_700_000_000.25));
    }

    #[test]
    fn marked_objects_pass_through() {
        let wire = json!({
            "recording": { "__external": true, "roomSessionId": "keep", "started_at": 5 }
        });
        let external = to_external(&wire);
        let obj = external.as_object().unwrap();
        let recording = obj["recording"].as_object().unwrap();
        assert!(recording.contains_key("roomSessionId"));
        assert!(recording.contains_key("started_at"));

        let back = to_wire(&external);
        assert_eq!(back["recording"]["roomSessionId"], json!("keep"));
    }

    #[test]
    fn extra_convertible_keys() {
        let options = ConversionOptions::default().with_convertible_keys(["participants"]);
        let wire = json!({ "participants": [{ "call_id": "c1" }] });
        let external = to_external_with(&wire, &options);
        let obj = external.as_object().unwrap();
        let ExternalValue::List(items) = &obj["participants"] else { panic!("not a list") };
        assert!(items[0].as_object().unwrap().contains_key("callId"));
    }

    #[test]
    fn display_json_renders_dates() {
        let external = to_external(&json!({ "started_at": 0.5 }));
        let rendered = external.to_display_json();
        assert_eq!(rendered["startedAt"], json!("1970-01-01T00:00:00.500Z"));
    }

    #[test]
    fn string_case_helpers() {
        assert_eq!(snake_to_camel("room_session_id"), "roomSessionId");
        assert_eq!(camel_to_snake("roomSessionId"), "room_session_id");
        assert_eq!(snake_to_camel("id"), "id");
    }
}
