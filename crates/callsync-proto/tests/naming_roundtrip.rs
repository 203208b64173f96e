//! Property tests for the naming translator.

use callsync_proto::{
    ExternalValue,
    naming::{camel_to_snake, snake_to_camel, to_external, to_wire},
};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// A canonical external key: lowerCamelCase built from two-plus-letter words.
fn external_key() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{2,6}", 1..4).prop_map(|words| snake_to_camel(&words.join("_")))
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::Number(n.into())),
        "[a-z ]{0,8}".prop_map(Value::String),
    ]
}

/// Nested external-cased objects without timestamp-suffixed keys.
fn external_object() -> impl Strategy<Value = Value> {
    let leaf = prop::collection::btree_map(external_key(), scalar(), 0..4)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>()));
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop::collection::btree_map(external_key(), prop_oneof![scalar(), inner], 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>()))
    })
    .prop_filter("timestamp-suffixed keys change value type", |v| !has_timestamp_key(v))
}

fn has_timestamp_key(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(k, v)| k.ends_with("At") || has_timestamp_key(v)),
        Value::Array(items) => items.iter().any(has_timestamp_key),
        _ => false,
    }
}

fn key_set(value: &Value, prefix: &str, out: &mut Vec<String>) {
    if let Value::Object(map) = value {
        for (k, v) in map {
            let path = format!("{prefix}/{k}");
            key_set(v, &path, out);
            out.push(path);
        }
    }
}

proptest! {
    #[test]
    fn prop_key_casing_roundtrips(key in external_key()) {
        prop_assert_eq!(snake_to_camel(&camel_to_snake(&key)), key);
    }

    #[test]
    fn prop_external_wire_external_is_lossless(obj in external_object()) {
        let external = ExternalValue::from(&obj);
        let wire = to_wire(&external);
        let back = to_external(&wire);

        let mut expected = Vec::new();
        key_set(&obj, "", &mut expected);
        let mut on_wire = Vec::new();
        key_set(&wire, "", &mut on_wire);

        // PROPERTY: every key is recased on the wire and restored on the way back
        prop_assert_eq!(expected.len(), on_wire.len());
        prop_assert!(on_wire.iter().all(|path| !path.chars().any(|c| c.is_ascii_uppercase())));
        prop_assert_eq!(back, external);
    }
}
