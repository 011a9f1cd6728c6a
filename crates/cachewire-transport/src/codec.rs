//! JSON serialization contract shared by the transport and the cache manager

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// JSON codec with configurable null handling
///
/// With `skip_nulls` enabled (the default), object fields whose value is
/// `null` are dropped before the document is written. Array elements are
/// left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonCodec {
    skip_nulls: bool,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self { skip_nulls: true }
    }
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep or drop null object fields when encoding
    pub fn with_skip_nulls(mut self, skip_nulls: bool) -> Self {
        self.skip_nulls = skip_nulls;
        self
    }

    pub fn skip_nulls(&self) -> bool {
        self.skip_nulls
    }

    /// Convert a value into a JSON tree, applying the null policy
    pub fn to_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value, serde_json::Error> {
        let mut tree = serde_json::to_value(value)?;
        if self.skip_nulls {
            strip_nulls(&mut tree);
        }
        Ok(tree)
    }

    /// Serialize a value to a JSON string
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, serde_json::Error> {
        if !self.skip_nulls {
            return serde_json::to_string(value);
        }
        serde_json::to_string(&self.to_value(value)?)
    }

    /// Deserialize a JSON string
    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                strip_nulls(v);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_nulls(item);
            }
        }
        _ => {}
    }
}
