//! Sequential dispatch of assembled tool calls.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use super::turn::AssembledTurn;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::events::{ProgressEmitter, ProgressPayload};
use crate::tools::{
    self, is_mutating_todo_action, validate_arguments, ToolArguments, ToolRegistry,
};
use crate::types::{HumanInputRequest, Message, ToolCall, ToolOutcome};

/// Control signals a dispatched batch produced.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// The `done` tool ran successfully.
    pub completion_signaled: bool,
    /// Summary the `done` call carried, if any.
    pub completion_summary: Option<String>,
    /// The `human_input` tool raised a request the loop must wait on.
    pub human_input_requested: Option<HumanInputRequest>,
}

/// Executes the calls of one assembled turn strictly in order.
///
/// The `ai` entry is recorded first, then every call receives exactly one
/// `tool` entry under the same id, whether it ran, failed, was unknown, or
/// was overtaken by cancellation.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    context: Arc<ExecutionContext>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, context: Arc<ExecutionContext>) -> Self {
        Self { registry, context }
    }

    pub async fn run_all(
        &self,
        turn: AssembledTurn,
        emitter: &ProgressEmitter,
    ) -> Result<DispatchOutcome> {
        let mut routed = DispatchOutcome::default();
        if turn.is_empty() {
            return Ok(routed);
        }

        let entry = if turn.has_tool_calls() {
            Message::ai_with_tools(turn.text.clone(), turn.tool_calls.clone())
        } else {
            Message::ai(turn.text.clone())
        };
        self.context.history().lock().unwrap().append(entry);

        for (index, call) in turn.tool_calls.iter().enumerate() {
            if let Err(err) = self.context.check_canceled() {
                self.synthesize_canceled(&turn.tool_calls[index..], emitter);
                return Err(err);
            }

            emitter.emit(ProgressPayload::ToolStart {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            });

            let outcome = self.execute_one(call).await;
            self.context.metrics().record_tool_call();
            if !outcome.ok {
                self.context.metrics().record_error();
            }

            emitter.emit(ProgressPayload::ToolEnd {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                ok: outcome.ok,
            });
            self.context
                .history()
                .lock()
                .unwrap()
                .append(Message::tool_result(&call.id, outcome.clone()));
            self.route_protocol(call, &outcome, &mut routed);

            if let Err(err) = self.context.check_canceled() {
                self.synthesize_canceled(&turn.tool_calls[index + 1..], emitter);
                return Err(err);
            }
        }

        Ok(routed)
    }

    /// Run one call against the registry, converting every failure mode
    /// into a result instead of an error.
    async fn execute_one(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.registry.get(&call.name) else {
            return ToolOutcome::failure(format!("Tool '{}' not found", call.name));
        };
        if let Err(validation_error) = validate_arguments(&call.arguments, &tool.parameters().schema)
        {
            return ToolOutcome::failure(format!(
                "Argument validation failed: {validation_error}"
            ));
        }
        let args = ToolArguments::new(call.arguments.clone());
        match tool.execute(&args).await {
            Ok(value) => ToolOutcome::success(value),
            Err(error) => ToolOutcome::failure(error.to_string()),
        }
    }

    /// Record canceled results for calls the batch never reached, keeping
    /// every call paired with a result.
    fn synthesize_canceled(&self, calls: &[ToolCall], emitter: &ProgressEmitter) {
        let reason = self.context.cancellation_error().to_string();
        let history_arc = self.context.history();
        let mut history = history_arc.lock().unwrap();
        for call in calls {
            emitter.emit(ProgressPayload::ToolEnd {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                ok: false,
            });
            history.append(Message::tool_result(&call.id, ToolOutcome::failure(&reason)));
        }
    }

    fn route_protocol(&self, call: &ToolCall, outcome: &ToolOutcome, routed: &mut DispatchOutcome) {
        match call.name.as_str() {
            tools::DONE_TOOL if outcome.ok => {
                routed.completion_signaled = true;
                routed.completion_summary = outcome.output_str("summary").map(str::to_string);
            }
            tools::HUMAN_INPUT_TOOL if outcome.ok && outcome.flag("requested") => {
                let id = outcome
                    .output_str("request_id")
                    .and_then(|raw| Uuid::parse_str(raw).ok());
                match id {
                    Some(id) => {
                        routed.human_input_requested = Some(HumanInputRequest {
                            id,
                            prompt: outcome.output_str("prompt").unwrap_or_default().to_string(),
                            requested_at: Utc::now(),
                        });
                    }
                    None => warn!(
                        call_id = %call.id,
                        "human input result without a parseable request id"
                    ),
                }
            }
            tools::TODO_MANAGER_TOOL if outcome.ok && is_mutating_todo_action(&call.arguments) => {
                self.context.history().lock().unwrap().queue_reminder(format!(
                    "The todo list changed:\n{}",
                    self.context.todos().render()
                ));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HelmConfig;
    use crate::error::HelmError;
    use crate::tools::{ClosureTool, Tool, ToolParameters};
    use crate::types::MessageRole;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        context: Arc<ExecutionContext>,
        dispatcher: ToolDispatcher,
    }

    fn fixture(extra: Vec<Arc<dyn Tool>>) -> Fixture {
        let context = Arc::new(ExecutionContext::new(&HelmConfig::default()));
        let mut registry = ToolRegistry::new();
        registry.register(tools::done_tool()).unwrap();
        registry
            .register(tools::todo_manager_tool(context.clone()))
            .unwrap();
        for tool in extra {
            registry.register(tool).unwrap();
        }
        let dispatcher = ToolDispatcher::new(Arc::new(registry), context.clone());
        Fixture {
            context,
            dispatcher,
        }
    }

    fn echo_tool() -> Arc<dyn Tool> {
        Arc::new(ClosureTool::new(
            "echo",
            "Echo the text argument back",
            ToolParameters::object()
                .string("text", "Text to echo", true)
                .build(),
            |args| async move {
                Ok(serde_json::json!({ "text": args.get_str("text").unwrap_or_default() }))
            },
        ))
    }

    fn failing_tool() -> Arc<dyn Tool> {
        Arc::new(ClosureTool::new(
            "always_fails",
            "Fails every time",
            ToolParameters::empty(),
            |_args| async move {
                Err::<serde_json::Value, _>(HelmError::tool("always_fails", "element not found"))
            },
        ))
    }

    fn turn(calls: Vec<ToolCall>) -> AssembledTurn {
        AssembledTurn {
            text: "working on it".to_string(),
            tool_calls: calls,
        }
    }

    fn emitter() -> ProgressEmitter {
        ProgressEmitter::new(Uuid::new_v4(), None)
    }

    fn history_roles(context: &ExecutionContext) -> Vec<MessageRole> {
        context
            .history()
            .lock()
            .unwrap()
            .snapshot()
            .iter()
            .map(|m| m.role)
            .collect()
    }

    #[tokio::test]
    async fn pairs_every_call_with_one_result() {
        let fx = fixture(vec![echo_tool()]);
        let calls = vec![
            ToolCall::new("call_1", "echo", serde_json::json!({"text": "a"})),
            ToolCall::new("call_2", "echo", serde_json::json!({"text": "b"})),
        ];
        fx.dispatcher.run_all(turn(calls), &emitter()).await.unwrap();

        let snapshot = fx.context.history().lock().unwrap().snapshot();
        assert_eq!(
            history_roles(&fx.context),
            vec![MessageRole::Ai, MessageRole::Tool, MessageRole::Tool]
        );
        assert_eq!(snapshot[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(snapshot[2].tool_call_id.as_deref(), Some("call_2"));
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_stopping_the_batch() {
        let fx = fixture(vec![echo_tool()]);
        let calls = vec![
            ToolCall::new("call_1", "no_such_tool", serde_json::json!({})),
            ToolCall::new("call_2", "echo", serde_json::json!({"text": "still runs"})),
        ];
        let routed = fx.dispatcher.run_all(turn(calls), &emitter()).await.unwrap();

        let snapshot = fx.context.history().lock().unwrap().snapshot();
        let first = snapshot[1].outcome.as_ref().unwrap();
        assert!(!first.ok);
        assert!(first.error.as_ref().unwrap().contains("not found"));
        let second = snapshot[2].outcome.as_ref().unwrap();
        assert!(second.ok);
        assert!(!routed.completion_signaled);
        assert_eq!(fx.context.metrics().snapshot().errors, 1);
    }

    #[tokio::test]
    async fn handler_error_becomes_a_failed_result() {
        let fx = fixture(vec![failing_tool(), echo_tool()]);
        let calls = vec![
            ToolCall::new("call_1", "always_fails", serde_json::json!({})),
            ToolCall::new("call_2", "echo", serde_json::json!({"text": "after"})),
        ];
        fx.dispatcher.run_all(turn(calls), &emitter()).await.unwrap();

        let snapshot = fx.context.history().lock().unwrap().snapshot();
        let failed = snapshot[1].outcome.as_ref().unwrap();
        assert!(!failed.ok);
        assert!(failed.error.as_ref().unwrap().contains("element not found"));
        assert!(snapshot[2].outcome.as_ref().unwrap().ok);

        let metrics = fx.context.metrics().snapshot();
        assert_eq!(metrics.tool_calls, 2);
        assert_eq!(metrics.errors, 1);
    }

    #[tokio::test]
    async fn invalid_arguments_skip_the_handler() {
        let invoked = Arc::new(AtomicBool::new(false));
        let seen = invoked.clone();
        let strict: Arc<dyn Tool> = Arc::new(ClosureTool::new(
            "strict",
            "Requires a text argument",
            ToolParameters::object()
                .string("text", "Required text", true)
                .build(),
            move |_args| {
                let seen = seen.clone();
                async move {
                    seen.store(true, Ordering::SeqCst);
                    Ok(serde_json::json!({}))
                }
            },
        ));
        let fx = fixture(vec![strict]);
        let calls = vec![ToolCall::new("call_1", "strict", serde_json::json!({}))];
        fx.dispatcher.run_all(turn(calls), &emitter()).await.unwrap();

        assert!(!invoked.load(Ordering::SeqCst));
        let snapshot = fx.context.history().lock().unwrap().snapshot();
        let outcome = snapshot[1].outcome.as_ref().unwrap();
        assert!(!outcome.ok);
        assert!(outcome.error.as_ref().unwrap().contains("validation failed"));
    }

    #[tokio::test]
    async fn done_signals_completion() {
        let fx = fixture(Vec::new());
        let calls = vec![ToolCall::new(
            "call_1",
            tools::DONE_TOOL,
            serde_json::json!({"success": true, "summary": "logged in"}),
        )];
        let routed = fx.dispatcher.run_all(turn(calls), &emitter()).await.unwrap();

        assert!(routed.completion_signaled);
        assert_eq!(routed.completion_summary.as_deref(), Some("logged in"));
    }

    #[tokio::test]
    async fn mutating_todo_call_queues_a_deferred_reminder() {
        let fx = fixture(vec![echo_tool()]);
        let calls = vec![
            ToolCall::new(
                "call_1",
                tools::TODO_MANAGER_TOOL,
                serde_json::json!({"action": "add", "items": ["check inbox"]}),
            ),
            ToolCall::new("call_2", "echo", serde_json::json!({"text": "later"})),
        ];
        fx.dispatcher.run_all(turn(calls), &emitter()).await.unwrap();

        let snapshot = fx.context.history().lock().unwrap().snapshot();
        // ai, tool, tool, then the reminder flushed once the batch closed.
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[3].role, MessageRole::Human);
        assert!(snapshot[3].content.contains("check inbox"));
    }

    #[tokio::test]
    async fn listing_todos_queues_no_reminder() {
        let fx = fixture(Vec::new());
        let calls = vec![ToolCall::new(
            "call_1",
            tools::TODO_MANAGER_TOOL,
            serde_json::json!({"action": "list"}),
        )];
        fx.dispatcher.run_all(turn(calls), &emitter()).await.unwrap();

        let snapshot = fx.context.history().lock().unwrap().snapshot();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_mid_batch_synthesizes_results_for_the_rest() {
        let context = Arc::new(ExecutionContext::new(&HelmConfig::default()));
        let cancel_target = context.clone();
        let canceling: Arc<dyn Tool> = Arc::new(ClosureTool::new(
            "pull_the_plug",
            "Cancels the run from inside a handler",
            ToolParameters::empty(),
            move |_args| {
                let context = cancel_target.clone();
                async move {
                    context.cancellation_token().cancel();
                    Ok(serde_json::json!({"pulled": true}))
                }
            },
        ));

        let mut registry = ToolRegistry::new();
        registry.register(canceling).unwrap();
        registry.register(echo_tool()).unwrap();
        let dispatcher = ToolDispatcher::new(Arc::new(registry), context.clone());

        let calls = vec![
            ToolCall::new("call_1", "pull_the_plug", serde_json::json!({})),
            ToolCall::new("call_2", "echo", serde_json::json!({"text": "unreached"})),
            ToolCall::new("call_3", "echo", serde_json::json!({"text": "unreached"})),
        ];
        let result = dispatcher.run_all(turn(calls), &emitter()).await;
        assert!(matches!(result, Err(HelmError::Canceled { .. })));

        let snapshot = context.history().lock().unwrap().snapshot();
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot[1].outcome.as_ref().unwrap().ok);
        for entry in &snapshot[2..] {
            let outcome = entry.outcome.as_ref().unwrap();
            assert!(!outcome.ok);
            assert!(outcome.error.as_ref().unwrap().contains("Canceled"));
        }
        assert_eq!(snapshot[2].tool_call_id.as_deref(), Some("call_2"));
        assert_eq!(snapshot[3].tool_call_id.as_deref(), Some("call_3"));
    }

    #[tokio::test]
    async fn text_only_turn_records_the_ai_entry() {
        let fx = fixture(Vec::new());
        let routed = fx
            .dispatcher
            .run_all(turn(Vec::new()), &emitter())
            .await
            .unwrap();

        assert!(!routed.completion_signaled);
        assert_eq!(history_roles(&fx.context), vec![MessageRole::Ai]);
    }

    #[tokio::test]
    async fn empty_turn_records_nothing() {
        let fx = fixture(Vec::new());
        fx.dispatcher
            .run_all(AssembledTurn::default(), &emitter())
            .await
            .unwrap();

        assert!(fx.context.history().lock().unwrap().is_empty());
    }
}
