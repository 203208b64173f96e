//! Outbound RPC request shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity descriptor sent as `self` or `target` in member commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    /// Member id.
    pub member_id: String,
    /// Call leg the member belongs to.
    pub call_id: String,
    /// Media node hosting the member.
    pub node_id: String,
}

/// A request handed to the transport's `execute` capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Fully-qualified method, `<namespace>.<verb>`.
    pub method: String,
    /// Parameters in wire casing.
    pub params: Value,
}

impl RpcRequest {
    /// Request with an empty params object.
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into(), params: Value::Object(Map::new()) }
    }

    /// Request with the given params.
    pub fn with_params(method: impl Into<String>, params: Value) -> Self {
        Self { method: method.into(), params }
    }

    /// Read a top-level param.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn member_ref_serializes_in_wire_casing() {
        let member = MemberRef {
            member_id: "m1".to_string(),
            call_id: "c1".to_string(),
            node_id: "n1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&member).unwrap(),
            json!({ "member_id": "m1", "call_id": "c1", "node_id": "n1" })
        );
    }

    #[test]
    fn empty_request_has_object_params() {
        let request = RpcRequest::new("call.lock");
        assert!(request.params.as_object().unwrap().is_empty());
        assert!(request.param("self").is_none());
    }
}
