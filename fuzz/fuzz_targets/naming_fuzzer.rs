//! Fuzz target for the naming translator
//!
//! # Invariants
//!
//! - Conversion in either direction NEVER panics, whatever the nesting
//! - Objects carrying the `__external` marker pass through both directions
//!   unchanged
//! - Display rendering of any external value is valid JSON

#![no_main]

use arbitrary::Arbitrary;
use callsync_proto::{
    ConversionOptions,
    naming::{self, EXTERNAL_MARKER},
};
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Arbitrary)]
enum FuzzValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<FuzzValue>),
    Object(Vec<(String, FuzzValue)>),
}

impl FuzzValue {
    fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::Number((*n).into()),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(entries) => Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect::<Map<_, _>>(),
            ),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    value: FuzzValue,
    extra_keys: Vec<String>,
    mark: bool,
}

fuzz_target!(|input: FuzzInput| {
    let options = ConversionOptions::default().with_convertible_keys(input.extra_keys);
    let mut wire = input.value.to_json();

    if input.mark {
        if let Value::Object(map) = &mut wire {
            map.insert(EXTERNAL_MARKER.to_string(), Value::Bool(true));
        }
    }

    let external = naming::to_external_with(&wire, &options);
    let back = naming::to_wire_with(&external, &options);
    let _ = external.to_display_json();

    if input.mark && wire.is_object() {
        // BTreeMap ordering may differ from insertion order; compare as values
        assert_eq!(sorted(&back), sorted(&wire), "marked object was converted");
    }
});

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
        },
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
