//! Model provider contract.
//!
//! The crate ships no network client. Hosts implement [`ModelProvider`]
//! against whatever transport they already have and hand it to the
//! orchestrator; [`ScriptedProvider`] covers tests and demos.

pub mod scripted;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::HelmError;
use crate::tools::Tool;
use crate::types::{Message, StreamChunk};

pub use scripted::{ScriptedEvent, ScriptedProvider};

/// Stream of chunks making up one model turn.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, HelmError>>;

/// Tool surface advertised to the model for a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters().schema.clone(),
        }
    }
}

/// Everything a provider needs to produce one streamed turn.
#[derive(Clone)]
pub struct TurnRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// Canceled when the run is aborting; providers may use it to tear
    /// down the underlying request early.
    pub cancellation: CancellationToken,
}

/// A model client capable of streaming tool-calling turns.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Open one streaming turn. The returned stream yields chunks until
    /// the model stops; an `Err` item ends the turn.
    async fn stream_turn(&self, request: TurnRequest) -> Result<ChunkStream, HelmError>;
}

/// A provider paired with a fixed tool surface.
///
/// Binding happens once per run, so per-turn callers only supply the
/// conversation and a cancellation token.
#[derive(Clone)]
pub struct BoundModel {
    provider: Arc<dyn ModelProvider>,
    tools: Vec<ToolDefinition>,
}

/// Bind `tools` to `provider`, capturing their wire definitions.
pub fn bind_tools(provider: Arc<dyn ModelProvider>, tools: &[Arc<dyn Tool>]) -> BoundModel {
    let tools = tools
        .iter()
        .map(|tool| ToolDefinition::from_tool(tool.as_ref()))
        .collect();
    BoundModel { provider, tools }
}

impl BoundModel {
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub async fn stream(
        &self,
        messages: Vec<Message>,
        cancellation: CancellationToken,
    ) -> Result<ChunkStream, HelmError> {
        self.provider
            .stream_turn(TurnRequest {
                messages,
                tools: self.tools.clone(),
                cancellation,
            })
            .await
    }
}
