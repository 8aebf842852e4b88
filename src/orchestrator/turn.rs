//! Streaming turn execution and tool-call assembly.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::{HelmError, Result};
use crate::events::{ProgressEmitter, ProgressPayload};
use crate::provider::BoundModel;
use crate::types::{StreamChunk, ToolCall, ToolCallFragment};

/// Everything one model turn produced once its stream closed.
#[derive(Debug, Clone, Default)]
pub struct AssembledTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssembledTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tool_calls.is_empty()
    }
}

/// Accumulates tool-call fragments by call id during a stream.
///
/// Argument text is only concatenated while the stream is live; parsing
/// happens once, in [`finish`](Self::finish), after the stream closed.
#[derive(Debug, Default)]
struct ToolCallAssembler {
    pending: Vec<PendingCall>,
}

#[derive(Debug)]
struct PendingCall {
    id: String,
    name: Option<String>,
    args: String,
}

impl ToolCallAssembler {
    fn new() -> Self {
        Self::default()
    }

    fn absorb(&mut self, fragment: ToolCallFragment) {
        let pos = match self.pending.iter().position(|call| call.id == fragment.id) {
            Some(pos) => pos,
            None => {
                self.pending.push(PendingCall {
                    id: fragment.id.clone(),
                    name: None,
                    args: String::new(),
                });
                self.pending.len() - 1
            }
        };
        let call = &mut self.pending[pos];
        if let Some(name) = fragment.name {
            if call.name.is_none() {
                call.name = Some(name);
            }
        }
        if let Some(piece) = fragment.args_fragment {
            call.args.push_str(&piece);
        }
    }

    /// Close out the accumulator: concatenated argument text is parsed as
    /// JSON, falling back to a raw string value when it does not parse.
    /// Groups that never received a name are dropped.
    fn finish(self) -> Vec<ToolCall> {
        self.pending
            .into_iter()
            .filter_map(|call| {
                let Some(name) = call.name else {
                    warn!(call_id = %call.id, "dropping tool call fragments that never named a tool");
                    return None;
                };
                let arguments = if call.args.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&call.args)
                        .unwrap_or(serde_json::Value::String(call.args.clone()))
                };
                Some(ToolCall::new(call.id, name, arguments))
            })
            .collect()
    }
}

/// Runs single model turns against the shared context.
pub struct TurnExecutor {
    model: BoundModel,
    context: Arc<ExecutionContext>,
    idle_timeout: Duration,
}

impl TurnExecutor {
    pub fn new(model: BoundModel, context: Arc<ExecutionContext>, idle_timeout: Duration) -> Self {
        Self {
            model,
            context,
            idle_timeout,
        }
    }

    /// Stream one turn over the current history snapshot.
    ///
    /// Cancellation is checked before the stream opens and on every chunk;
    /// a canceled turn abandons its partial output and returns the
    /// cancellation error. A stream that stays silent past the idle
    /// timeout fails the turn. A stream with zero chunks is a valid,
    /// empty turn.
    pub async fn run_turn(
        &self,
        turn_index: usize,
        emitter: &ProgressEmitter,
    ) -> Result<AssembledTurn> {
        self.context.check_canceled()?;

        let messages = self.context.history().lock().unwrap().snapshot();
        let token = self.context.cancellation_token();
        emitter.emit(ProgressPayload::TurnStart { turn_index });

        let mut stream = self.model.stream(messages, token.clone()).await?;
        let mut text = String::new();
        let mut assembler = ToolCallAssembler::new();
        let mut idle_sleep = Box::pin(time::sleep(self.idle_timeout));

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    return Err(self.context.cancellation_error());
                }
                _ = idle_sleep.as_mut() => {
                    return Err(HelmError::Timeout(self.idle_timeout.as_millis() as u64));
                }
                chunk = stream.next() => {
                    let Some(chunk) = chunk else { break; };
                    let chunk = chunk?;
                    self.context.check_canceled()?;
                    idle_sleep.as_mut().reset(time::Instant::now() + self.idle_timeout);
                    self.absorb_chunk(chunk, &mut text, &mut assembler, emitter);
                }
            }
        }

        let tool_calls = assembler.finish();
        emitter.emit(ProgressPayload::TurnEnd {
            turn_index,
            tool_calls: tool_calls.len(),
        });
        debug!(
            turn_index,
            tool_calls = tool_calls.len(),
            text_len = text.len(),
            "turn stream closed"
        );

        Ok(AssembledTurn { text, tool_calls })
    }

    fn absorb_chunk(
        &self,
        chunk: StreamChunk,
        text: &mut String,
        assembler: &mut ToolCallAssembler,
        emitter: &ProgressEmitter,
    ) {
        if let Some(piece) = chunk.text {
            if !piece.is_empty() {
                text.push_str(&piece);
                emitter.emit(ProgressPayload::TurnChunk { text: piece });
            }
        }
        for fragment in chunk.tool_call_fragments {
            assembler.absorb(fragment);
        }
    }
}
