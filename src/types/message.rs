//! Conversation message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A message in the execution history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    /// Textual content. May be empty on `ai` entries that only carry tool
    /// calls.
    pub content: String,
    /// Tool invocations requested by this entry. Only populated on `ai`
    /// entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The call this entry answers. Only populated on `tool` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Structured outcome carried by `tool` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ToolOutcome>,
    /// Pinned entries are exempt from history eviction.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pinned: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn base(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            outcome: None,
            pinned: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::base(MessageRole::System, text)
    }

    /// Create a human message.
    pub fn human(text: impl Into<String>) -> Self {
        Self::base(MessageRole::Human, text)
    }

    /// Create a plain ai message.
    pub fn ai(text: impl Into<String>) -> Self {
        Self::base(MessageRole::Ai, text)
    }

    /// Create an ai message carrying tool calls.
    pub fn ai_with_tools(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::base(MessageRole::Ai, text)
        }
    }

    /// Create a tool result message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, outcome: ToolOutcome) -> Self {
        let content = outcome.render();
        Self {
            tool_call_id: Some(tool_call_id.into()),
            outcome: Some(outcome),
            ..Self::base(MessageRole::Tool, content)
        }
    }

    /// Create a browser-state snapshot message.
    pub fn browser_state(text: impl Into<String>) -> Self {
        Self::base(MessageRole::BrowserState, text)
    }

    /// Mark this entry as exempt from eviction.
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Whether this entry requests tool invocations.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn is_system(&self) -> bool {
        self.role == MessageRole::System
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MessageRole {
    System,
    Human,
    Ai,
    Tool,
    BrowserState,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The uniform result shape every tool invocation produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            ok: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Read a boolean flag from the output object, `false` when absent.
    pub fn flag(&self, key: &str) -> bool {
        self.output
            .as_ref()
            .and_then(|output| output.get(key))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Read a string field from the output object.
    pub fn output_str(&self, key: &str) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|output| output.get(key))
            .and_then(serde_json::Value::as_str)
    }

    /// Render the outcome as message content for the model.
    pub fn render(&self) -> String {
        match (&self.output, &self.error) {
            (Some(output), _) if self.ok => match output {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            },
            (_, Some(error)) => format!("Error: {error}"),
            _ => String::new(),
        }
    }
}
