//! Streaming chunk types.

use serde::{Deserialize, Serialize};

/// One chunk of a streamed model turn. A chunk may carry text, tool-call
/// fragments, both, or neither.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_fragments: Vec<ToolCallFragment>,
}

impl StreamChunk {
    /// Chunk carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_call_fragments: Vec::new(),
        }
    }

    /// Chunk carrying a single tool-call fragment.
    pub fn fragment(fragment: ToolCallFragment) -> Self {
        Self {
            text: None,
            tool_call_fragments: vec![fragment],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.tool_call_fragments.is_empty()
    }
}

/// An incremental piece of a tool call under assembly. The name arrives at
/// most once per call id; argument text arrives as fragments concatenated in
/// arrival order and parsed only after the stream ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallFragment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_fragment: Option<String>,
}

impl ToolCallFragment {
    /// Fragment that opens a call: carries the tool name.
    pub fn start(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            args_fragment: None,
        }
    }

    /// Fragment that extends a call's argument text.
    pub fn args(id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            args_fragment: Some(fragment.into()),
        }
    }
}
