//! JSON Schema parameter definitions for tools.

use serde::{Deserialize, Serialize};

/// JSON Schema describing a tool's argument object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameters {
    pub schema: serde_json::Value,
}

impl ToolParameters {
    /// Create from a raw JSON Schema value.
    pub fn from_schema(schema: serde_json::Value) -> Self {
        Self { schema }
    }

    /// Schema accepting an empty argument object.
    pub fn empty() -> Self {
        Self {
            schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        }
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }
}

/// Builder for constructing tool parameter schemas.
pub struct ParameterBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    fn property(
        mut self,
        name: String,
        schema: serde_json::Value,
        required: bool,
    ) -> Self {
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }

    pub fn string(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let schema = serde_json::json!({
            "type": "string",
            "description": description.into(),
        });
        self.property(name.into(), schema, required)
    }

    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        let schema = serde_json::json!({
            "type": "string",
            "description": description.into(),
            "enum": values,
        });
        self.property(name.into(), schema, required)
    }

    pub fn integer(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let schema = serde_json::json!({
            "type": "integer",
            "description": description.into(),
        });
        self.property(name.into(), schema, required)
    }

    pub fn boolean(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let schema = serde_json::json!({
            "type": "boolean",
            "description": description.into(),
        });
        self.property(name.into(), schema, required)
    }

    /// Array property with string items.
    pub fn string_array(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let schema = serde_json::json!({
            "type": "array",
            "description": description.into(),
            "items": { "type": "string" },
        });
        self.property(name.into(), schema, required)
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters {
            schema: serde_json::json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}
