//! Typed access to tool call arguments.

use crate::error::HelmError;

/// Wrapper around a tool call's argument value with typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn get_str(&self, key: &str) -> Result<&str, HelmError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| HelmError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, HelmError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| HelmError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    pub fn get_bool_opt(&self, key: &str) -> Option<bool> {
        self.value.get(key).and_then(|v| v.as_bool())
    }

    /// String items of an array argument, non-strings skipped.
    pub fn get_str_array(&self, key: &str) -> Result<Vec<String>, HelmError> {
        let items = self
            .value
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| HelmError::InvalidArgument(format!("Missing array argument: {key}")))?;
        Ok(items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect())
    }

    /// Deserialize the whole argument value into a typed struct. A string
    /// value is treated as embedded JSON, which covers arguments kept raw
    /// after a failed stream-end parse.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, HelmError> {
        let value = match &self.value {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str::<serde_json::Value>(trimmed).map_err(|e| {
                        HelmError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
                    })?
                }
            }
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| {
            HelmError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

impl From<serde_json::Value> for ToolArguments {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}
