//! Control strategies: the direct loop and plan-execute-validate cycles.

use std::sync::Arc;

use tracing::{debug, info};

use super::dispatch::ToolDispatcher;
use super::human_input::HumanInputBridge;
use super::support::SupportTools;
use super::turn::TurnExecutor;
use super::ObservationSource;
use crate::config::HelmConfig;
use crate::context::ExecutionContext;
use crate::error::{HelmError, Result};
use crate::events::{NoticeLevel, ProgressEmitter};
use crate::types::{HumanInputRequest, Message, TodoItem};

/// What one loop iteration decided.
enum IterationSignal {
    Continue,
    /// The `done` tool fired; carries its summary when present.
    Done(Option<String>),
}

/// Drives one run's loop under a chosen strategy. Built per run, owns
/// clones of everything the loops touch.
pub(super) struct StrategyRunner {
    turns: TurnExecutor,
    dispatcher: ToolDispatcher,
    support: SupportTools,
    context: Arc<ExecutionContext>,
    bridge: HumanInputBridge,
    observer: Option<ObservationSource>,
    config: HelmConfig,
}

impl StrategyRunner {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        turns: TurnExecutor,
        dispatcher: ToolDispatcher,
        support: SupportTools,
        context: Arc<ExecutionContext>,
        bridge: HumanInputBridge,
        observer: Option<ObservationSource>,
        config: HelmConfig,
    ) -> Self {
        Self {
            turns,
            dispatcher,
            support,
            context,
            bridge,
            observer,
            config,
        }
    }

    /// Plain turn loop: iterate until `done` fires or the attempt budget
    /// runs out.
    pub(super) async fn run_direct(&self, emitter: &ProgressEmitter) -> Result<Option<String>> {
        let limit = self.config.max_direct_attempts;
        for turn_index in 0..limit {
            if let IterationSignal::Done(summary) = self.iterate(turn_index, emitter).await? {
                return Ok(summary);
            }
        }
        Err(HelmError::iterations("direct turn loop", limit))
    }

    /// Plan, execute, validate until validation passes or the cycle budget
    /// runs out. The planner replaces the todo list wholesale each cycle;
    /// validator feedback enters history before the next plan request.
    pub(super) async fn run_plan_execute_validate(
        &self,
        task: &str,
        emitter: &ProgressEmitter,
    ) -> Result<Option<String>> {
        let mut turn_index = 0usize;
        for cycle in 0..self.config.max_plan_cycles {
            self.context.check_canceled()?;
            self.refresh_plan(task, cycle, emitter).await;

            let mut completion: Option<Option<String>> = None;
            for _ in 0..self.config.max_turns_per_cycle {
                match self.iterate(turn_index, emitter).await? {
                    IterationSignal::Done(summary) => {
                        completion = Some(summary);
                        break;
                    }
                    IterationSignal::Continue => {}
                }
                turn_index += 1;
                let todos = self.context.todos();
                if !todos.is_empty() && todos.all_settled() {
                    debug!(cycle, "all todos settled, moving to validation");
                    break;
                }
            }

            let verdict = self.support.validate(task).await;
            if verdict.is_complete {
                info!(cycle, "validation passed");
                return Ok(completion.flatten());
            }

            let mut feedback = format!(
                "Validation found the task incomplete: {}",
                verdict.reasoning
            );
            for suggestion in &verdict.suggestions {
                feedback.push_str(&format!("\n- {suggestion}"));
            }
            self.context
                .history()
                .lock()
                .unwrap()
                .queue_reminder(feedback);
            emitter.notice(
                NoticeLevel::Info,
                format!("validation incomplete after cycle {cycle}, re-planning"),
            );
        }
        Err(HelmError::iterations(
            "plan-execute-validate cycles",
            self.config.max_plan_cycles,
        ))
    }

    /// One observe, turn, dispatch round.
    async fn iterate(
        &self,
        turn_index: usize,
        emitter: &ProgressEmitter,
    ) -> Result<IterationSignal> {
        self.context.check_canceled()?;
        self.observe().await;

        let turn = self.turns.run_turn(turn_index, emitter).await?;
        let outcome = self.dispatcher.run_all(turn, emitter).await?;

        if let Some(request) = outcome.human_input_requested {
            self.suspend_for_human(&request, emitter).await?;
        }
        if outcome.completion_signaled {
            return Ok(IterationSignal::Done(outcome.completion_summary));
        }
        Ok(IterationSignal::Continue)
    }

    /// Record a fresh browser-state snapshot when an observer is wired.
    async fn observe(&self) {
        let Some(observer) = &self.observer else {
            return;
        };
        if let Some(snapshot) = observer().await {
            self.context
                .history()
                .lock()
                .unwrap()
                .append(Message::browser_state(snapshot));
            self.context.metrics().record_observation();
        }
    }

    async fn refresh_plan(&self, task: &str, cycle: usize, emitter: &ProgressEmitter) {
        match self.support.plan(task).await {
            Some(plan) => {
                let items: Vec<TodoItem> = plan
                    .steps
                    .into_iter()
                    .map(|step| TodoItem::new(step.action))
                    .collect();
                self.context.todos().replace(items);
            }
            None if self.context.todos().is_empty() => {
                // No plan and nothing to work from: fall back to a single
                // catch-all step so the execute loop has a goal.
                self.context
                    .todos()
                    .replace(vec![TodoItem::new(format!("Complete the task: {task}"))]);
            }
            None => {
                debug!(cycle, "planner failed, keeping the existing todo list");
            }
        }
        self.context
            .history()
            .lock()
            .unwrap()
            .queue_reminder(format!("Current plan:\n{}", self.context.todos().render()));
        emitter.notice(
            NoticeLevel::Info,
            format!("plan cycle {cycle}: {} todos", self.context.todos().len()),
        );
    }

    /// Park the loop on the human-input bridge until the host answers.
    async fn suspend_for_human(
        &self,
        request: &HumanInputRequest,
        emitter: &ProgressEmitter,
    ) -> Result<()> {
        emitter.notice(
            NoticeLevel::Info,
            format!("waiting for human input: {}", request.prompt),
        );
        let response = self
            .bridge
            .await_response(
                request,
                &self.context,
                self.config.human_input_poll(),
                self.config.human_input_timeout(),
            )
            .await?;
        let acknowledgement = response
            .note
            .unwrap_or_else(|| "Proceed.".to_string());
        self.context
            .history()
            .lock()
            .unwrap()
            .append(Message::human(acknowledgement));
        Ok(())
    }
}
