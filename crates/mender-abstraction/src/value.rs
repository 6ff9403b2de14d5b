//! The payload a recovered operation hands back.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Output of a successful recovery.
///
/// Degraded results look like ordinary values apart from their `fallback` and
/// `message` flags; callers that care inspect the strategy that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum RecoveredValue {
    /// Structured output from an operation, a handler, or a degraded path.
    Value(Value),
    /// Bytes served from the enhancement cache.
    Cached {
        /// Cached blob.
        #[serde(serialize_with = "serialize_base64")]
        data: Bytes,
        /// Metadata stored alongside the blob.
        metadata: Value,
    },
    /// The operation was omitted.
    Skipped,
}

impl RecoveredValue {
    /// Builds a degraded descriptor with `fallback: true` and a message.
    pub fn degraded(message: impl Into<String>, fields: &[(&str, Value)]) -> Self {
        let mut map = serde_json::Map::new();
        map.insert("fallback".to_string(), Value::Bool(true));
        map.insert("message".to_string(), Value::String(message.into()));
        for (key, value) in fields {
            map.insert((*key).to_string(), value.clone());
        }
        Self::Value(Value::Object(map))
    }

    /// Whether this value came from a fallback path rather than the operation.
    pub fn is_fallback(&self) -> bool {
        match self {
            Self::Value(value) => value.get("fallback").and_then(Value::as_bool).unwrap_or(false),
            Self::Cached { .. } | Self::Skipped => true,
        }
    }

    /// The structured value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

fn serialize_base64<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}
