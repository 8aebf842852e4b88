//! Run orchestration: classification, strategy selection, and lifecycle.

pub mod dispatch;
pub mod human_input;
mod strategy;
pub mod support;
pub mod turn;

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::HelmConfig;
use crate::context::{ExecutionContext, ExecutionState, StateSink};
use crate::error::{HelmError, Result};
use crate::events::{ProgressEmitter, ProgressPayload, ProgressSink};
use crate::provider::{bind_tools, ModelProvider};
use crate::tools::{self, ToolRegistry};
use crate::types::{
    Message, RunId, RunStatus, RunSummary, StrategySelector, TaskClassification, TaskRequest,
};

pub use dispatch::{DispatchOutcome, ToolDispatcher};
pub use human_input::HumanInputBridge;
pub use support::SupportTools;
pub use turn::{AssembledTurn, TurnExecutor};

use strategy::StrategyRunner;

/// Produces a fresh browser-state snapshot ahead of a turn. `None` skips
/// the observation for that turn.
pub type ObservationSource = Arc<dyn Fn() -> BoxFuture<'static, Option<String>> + Send + Sync>;

const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous agent operating a web browser. \
Work the task step by step with the available tools, keep your todo list current, and call \
the done tool once the task is complete.";

/// Drives tasks through classify, execute, validate, and report phases.
///
/// All collaborators are explicit: the model provider, the tool registry,
/// and the optional host surfaces (progress sink, state sink, browser
/// observer). One orchestrator runs one task at a time; starting a new
/// task preempts the active one.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    context: Arc<ExecutionContext>,
    config: HelmConfig,
    event_sink: Option<ProgressSink>,
    bridge: HumanInputBridge,
    observer: Option<ObservationSource>,
}

impl Orchestrator {
    /// Build from explicit collaborators. The registry arrives with the
    /// host's tools; the protocol builtins are registered here, so a host
    /// tool squatting on a protocol name is an error.
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        mut registry: ToolRegistry,
        config: HelmConfig,
    ) -> Result<Self> {
        let context = Arc::new(ExecutionContext::new(&config));
        registry.register(tools::done_tool())?;
        registry.register(tools::human_input_tool())?;
        registry.register(tools::todo_manager_tool(context.clone()))?;
        Ok(Self {
            provider,
            registry: Arc::new(registry),
            context,
            config,
            event_sink: None,
            bridge: HumanInputBridge::new(),
            observer: None,
        })
    }

    /// Receive progress events for every run.
    pub fn with_event_sink(mut self, sink: ProgressSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Receive every accepted execution-state transition.
    pub fn with_state_sink(self, sink: StateSink) -> Self {
        self.context.set_state_sink(sink);
        self
    }

    /// Capture browser-state snapshots ahead of each turn.
    pub fn with_observer(mut self, observer: ObservationSource) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn context(&self) -> Arc<ExecutionContext> {
        self.context.clone()
    }

    /// The bridge hosts answer human-input requests through.
    pub fn human_input(&self) -> HumanInputBridge {
        self.bridge.clone()
    }

    /// Request cancellation of the active run; returns once the run has
    /// wound down or the grace period forced it.
    pub async fn cancel(&self, user_initiated: bool) {
        self.context.cancel(user_initiated).await;
    }

    /// Drive one task to its terminal state.
    ///
    /// Returns the summary on success. Cancellations surface as
    /// `HelmError::Canceled` after the state machine reached `Aborted`;
    /// fatal failures surface as their error after the state reached
    /// `Error`.
    pub async fn run(&self, request: TaskRequest) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let emitter = ProgressEmitter::new(run_id, self.event_sink.clone());

        self.context.preempt().await;
        self.context.reset();
        self.context.begin_task(run_id, request.task.clone())?;
        info!(%run_id, task = %request.task, "run starting");

        let outcome = self.drive(&request, &emitter).await;
        self.finish(run_id, outcome, &emitter)
    }

    async fn drive(
        &self,
        request: &TaskRequest,
        emitter: &ProgressEmitter,
    ) -> Result<(StrategySelector, String)> {
        let support = SupportTools::new(self.registry.clone());
        let classification = support.classify(&request.task).await;
        let strategy = request
            .strategy
            .unwrap_or_else(|| classification.strategy());
        info!(
            complexity = %classification.complexity,
            follow_up = classification.is_follow_up,
            %strategy,
            "task classified"
        );

        self.seed_history(request, &classification);

        self.context.check_canceled()?;
        if !self.context.set_state(ExecutionState::Running) {
            return Err(HelmError::InvalidState(format!(
                "expected a starting run, found {}",
                self.context.state()
            )));
        }

        let model = bind_tools(self.provider.clone(), &self.registry.all());
        let runner = StrategyRunner::new(
            TurnExecutor::new(
                model,
                self.context.clone(),
                self.config.stream_idle_timeout(),
            ),
            ToolDispatcher::new(self.registry.clone(), self.context.clone()),
            support,
            self.context.clone(),
            self.bridge.clone(),
            self.observer.clone(),
            self.config.clone(),
        );

        let completion = match strategy {
            StrategySelector::Direct => runner.run_direct(emitter).await?,
            StrategySelector::PlanExecuteValidate => {
                runner.run_plan_execute_validate(&request.task, emitter).await?
            }
        };

        // Result generation happens once; its failure never fails the run.
        let message = SupportTools::new(self.registry.clone())
            .final_result(&request.task)
            .await
            .or(completion)
            .unwrap_or_else(|| "Task completed.".to_string());
        Ok((strategy, message))
    }

    /// Seed the conversation for this run. A fresh task clears history and
    /// re-seeds the system prompt; a follow-up keeps the record. The task
    /// itself is always appended pinned.
    fn seed_history(&self, request: &TaskRequest, classification: &TaskClassification) {
        let history_arc = self.context.history();
        let mut history = history_arc.lock().unwrap();
        if !classification.is_follow_up {
            history.clear();
        } else if request.system_prompt.is_some() {
            // A follow-up carrying its own prompt replaces the old one.
            history.remove_system_entries();
        }
        if let Some(prompt) = &request.system_prompt {
            history.append(Message::system(prompt));
        } else if history.is_empty() {
            history.append(Message::system(DEFAULT_SYSTEM_PROMPT));
        }
        history.append(Message::human(&request.task).pinned());
    }

    fn finish(
        &self,
        run_id: RunId,
        outcome: Result<(StrategySelector, String)>,
        emitter: &ProgressEmitter,
    ) -> Result<RunSummary> {
        self.context.metrics().mark_finished();
        match outcome {
            Ok((strategy, message)) => {
                self.context.set_state(ExecutionState::Completed);
                emitter.emit(ProgressPayload::TaskResult {
                    status: RunStatus::Completed,
                    message: message.clone(),
                });
                info!(%run_id, "run completed");
                Ok(RunSummary {
                    run_id,
                    status: RunStatus::Completed,
                    message,
                    strategy,
                    metrics: self.context.metrics().snapshot(),
                    finished_at: Utc::now(),
                })
            }
            Err(err) if err.is_cancellation() => {
                self.context.ensure_aborted();
                emitter.emit(ProgressPayload::TaskResult {
                    status: RunStatus::Canceled,
                    message: err.to_string(),
                });
                info!(%run_id, error = %err, "run canceled");
                Err(err)
            }
            Err(err) => {
                if !self.context.set_state(ExecutionState::Error) {
                    warn!(state = %self.context.state(), "failed run could not enter the error state");
                }
                emitter.emit(ProgressPayload::TaskResult {
                    status: RunStatus::Failed,
                    message: err.to_string(),
                });
                error!(%run_id, error = %err, "run failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;
    use pretty_assertions::assert_eq;

    fn orchestrator(provider: ScriptedProvider) -> Orchestrator {
        Orchestrator::new(
            Arc::new(provider),
            ToolRegistry::new(),
            HelmConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn protocol_names_are_reserved() {
        let mut registry = ToolRegistry::new();
        registry.register(tools::done_tool()).unwrap();

        let result = Orchestrator::new(
            Arc::new(ScriptedProvider::new()),
            registry,
            HelmConfig::default(),
        );
        assert!(matches!(result, Err(HelmError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn fresh_task_reseeds_history_with_a_pinned_task() {
        let provider = ScriptedProvider::new();
        provider.push_tool_turn(
            "call_1",
            tools::DONE_TOOL,
            &serde_json::json!({"success": true, "summary": "done"}),
        );

        let orchestrator = orchestrator(provider);
        let request = TaskRequest::builder()
            .task("check the weather")
            .system_prompt("Browse carefully.")
            .strategy(StrategySelector::Direct)
            .build();
        let summary = orchestrator.run(request).await.unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        let history = orchestrator.context().history();
        let snapshot = history.lock().unwrap().snapshot();
        assert!(snapshot[0].is_system());
        assert_eq!(snapshot[0].content, "Browse carefully.");
        assert_eq!(snapshot[1].content, "check the weather");
        assert!(snapshot[1].pinned);
    }

    #[tokio::test]
    async fn completed_run_lands_in_the_completed_state() {
        let provider = ScriptedProvider::new();
        provider.push_tool_turn(
            "call_1",
            tools::DONE_TOOL,
            &serde_json::json!({"success": true}),
        );

        let orchestrator = orchestrator(provider);
        let request = TaskRequest::builder()
            .task("simple thing")
            .strategy(StrategySelector::Direct)
            .build();
        orchestrator.run(request).await.unwrap();

        assert_eq!(orchestrator.context().state(), ExecutionState::Completed);
    }

    #[tokio::test]
    async fn exhausted_direct_run_lands_in_the_error_state() {
        let provider = ScriptedProvider::new();
        for _ in 0..10 {
            provider.push_text_turn("no tools called");
        }

        let orchestrator = orchestrator(provider);
        let request = TaskRequest::builder()
            .task("never finishes")
            .strategy(StrategySelector::Direct)
            .build();
        let result = orchestrator.run(request).await;

        assert!(matches!(result, Err(HelmError::IterationsExhausted { .. })));
        assert_eq!(orchestrator.context().state(), ExecutionState::Error);
    }
}
