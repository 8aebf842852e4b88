//! Scripted provider that replays canned turns.
//!
//! Used by the crate's own tests and handy for host-side smoke tests:
//! queue the turns a model would produce and drive the orchestrator
//! against them without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChunkStream, ModelProvider, TurnRequest};
use crate::error::HelmError;
use crate::types::{StreamChunk, ToolCallFragment};

/// One scripted stream item.
#[derive(Debug, Clone)]
pub enum ScriptedEvent {
    /// Yield a text chunk.
    Text(String),
    /// Yield the opening fragment of a tool call.
    ToolStart { id: String, name: String },
    /// Yield an argument fragment for a previously opened call.
    ToolArgs { id: String, fragment: String },
    /// Sleep before yielding the next item.
    Pause(Duration),
    /// Yield a stream error and end the turn.
    Fail(String),
}

/// Replays queued turns, one per `stream_turn` call.
///
/// Running out of queued turns fails the stream open, which surfaces
/// runaway loops in tests instead of hanging them.
#[derive(Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Vec<ScriptedEvent>>>,
    requests: Mutex<Vec<TurnRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a turn from raw events.
    pub fn push_turn(&self, events: Vec<ScriptedEvent>) {
        self.turns.lock().unwrap().push_back(events);
    }

    /// Queue a text-only turn, split into small chunks like a live stream.
    pub fn push_text_turn(&self, text: &str) {
        let events = text
            .chars()
            .collect::<Vec<_>>()
            .chunks(8)
            .map(|piece| ScriptedEvent::Text(piece.iter().collect()))
            .collect();
        self.push_turn(events);
    }

    /// Queue a turn calling one tool, its argument JSON split across
    /// fragments the way live providers deliver it.
    pub fn push_tool_turn(&self, id: &str, name: &str, arguments: &serde_json::Value) {
        let raw = arguments.to_string();
        let mut events = vec![ScriptedEvent::ToolStart {
            id: id.to_string(),
            name: name.to_string(),
        }];
        for piece in raw.chars().collect::<Vec<_>>().chunks(6) {
            events.push(ScriptedEvent::ToolArgs {
                id: id.to_string(),
                fragment: piece.iter().collect(),
            });
        }
        self.push_turn(events);
    }

    /// Queue a turn that yields nothing, ever. Pairs with cancellation
    /// tests that abort mid-stream.
    pub fn push_stalled_turn(&self) {
        self.push_turn(vec![ScriptedEvent::Pause(Duration::from_secs(3600))]);
    }

    /// Turn requests seen so far, for asserting on the sent conversation.
    pub fn requests(&self) -> Vec<TurnRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining_turns(&self) -> usize {
        self.turns.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_turn(&self, request: TurnRequest) -> Result<ChunkStream, HelmError> {
        self.requests.lock().unwrap().push(request);
        let events = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| HelmError::Stream("scripted provider has no turns left".to_string()))?;

        let stream = async_stream::stream! {
            for event in events {
                match event {
                    ScriptedEvent::Text(text) => yield Ok(StreamChunk::text(text)),
                    ScriptedEvent::ToolStart { id, name } => {
                        yield Ok(StreamChunk::fragment(ToolCallFragment::start(id, name)));
                    }
                    ScriptedEvent::ToolArgs { id, fragment } => {
                        yield Ok(StreamChunk::fragment(ToolCallFragment::args(id, fragment)));
                    }
                    ScriptedEvent::Pause(duration) => tokio::time::sleep(duration).await,
                    ScriptedEvent::Fail(message) => {
                        yield Err(HelmError::Stream(message));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
