//! Values written to the cache

use cachewire_transport::JsonCodec;
use serde::Serialize;
use serde_json::Value;

/// Body of a write. Text is stored verbatim; anything else is JSON-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Text(String),
    Json(Value),
}

impl CacheValue {
    /// Convert a serializable value; values that serialize to a JSON string
    /// become [`CacheValue::Text`] so they are stored without quotes
    pub fn from_serialize<T>(codec: &JsonCodec, value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        Ok(match codec.to_value(value)? {
            Value::String(text) => CacheValue::Text(text),
            other => CacheValue::Json(other),
        })
    }

    /// Wire body for this value
    pub fn into_body(self, codec: &JsonCodec) -> Result<String, serde_json::Error> {
        match self {
            CacheValue::Text(text) => Ok(text),
            CacheValue::Json(value) => codec.encode(&value),
        }
    }
}

impl From<String> for CacheValue {
    fn from(text: String) -> Self {
        CacheValue::Text(text)
    }
}

impl From<&str> for CacheValue {
    fn from(text: &str) -> Self {
        CacheValue::Text(text.to_string())
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => CacheValue::Text(text),
            other => CacheValue::Json(other),
        }
    }
}
