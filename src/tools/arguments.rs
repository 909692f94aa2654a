//! Typed access to tool call arguments.

use crate::error::WeaveError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn get_str(&self, key: &str) -> Result<&str, WeaveError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| WeaveError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, WeaveError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| WeaveError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, WeaveError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| WeaveError::InvalidArgument(format!("Missing number argument: {key}")))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, WeaveError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| WeaveError::InvalidArgument(format!("Missing boolean argument: {key}")))
    }

    /// Deserialize the entire arguments into a typed struct.
    ///
    /// Some engines send arguments as a JSON-encoded string; that form is
    /// decoded first.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, WeaveError> {
        let value = match &self.value {
            serde_json::Value::String(raw) if raw.trim().is_empty() => serde_json::json!({}),
            serde_json::Value::String(raw) => serde_json::from_str(raw.trim()).map_err(|e| {
                WeaveError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
            })?,
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        };
        serde_json::from_value(value)
            .map_err(|e| WeaveError::InvalidArgument(format!("Failed to deserialize arguments: {e}")))
    }
}
