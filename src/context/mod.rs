//! Shared per-run execution context.

pub mod metrics;
pub mod state;
pub mod todo;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::HelmConfig;
use crate::error::{HelmError, Result};
use crate::history::HistoryManager;
use crate::types::RunId;

pub use metrics::{ExecutionMetrics, MetricsSnapshot};
pub use state::{ExecutionState, StateCell, StateChange, StateSink};
pub use todo::TodoStore;

/// Identity of the task currently owning the context.
#[derive(Debug, Clone)]
pub struct TaskMetadata {
    pub run_id: RunId,
    pub task: String,
    pub started_at: DateTime<Utc>,
}

/// Everything one run shares across its components: the state machine, the
/// cancellation token, the history, the todo store, and the metrics.
///
/// At most one run owns the context at a time. Starting a new run preempts
/// the active one by force-canceling it first.
pub struct ExecutionContext {
    state: StateCell,
    cancellation: Mutex<CancellationToken>,
    cancel_user_initiated: AtomicBool,
    history: Arc<Mutex<HistoryManager>>,
    todos: TodoStore,
    metrics: ExecutionMetrics,
    task: Mutex<Option<TaskMetadata>>,
    cancel_grace: Duration,
}

impl ExecutionContext {
    pub fn new(config: &HelmConfig) -> Self {
        Self {
            state: StateCell::new(),
            cancellation: Mutex::new(CancellationToken::new()),
            cancel_user_initiated: AtomicBool::new(false),
            history: Arc::new(Mutex::new(HistoryManager::new(config.history_token_budget))),
            todos: TodoStore::new(),
            metrics: ExecutionMetrics::new(),
            task: Mutex::new(None),
            cancel_grace: config.cancel_grace(),
        }
    }

    /// Register the callback invoked on every accepted state transition.
    pub fn set_state_sink(&self, sink: StateSink) {
        self.state.set_sink(sink);
    }

    pub fn state(&self) -> ExecutionState {
        self.state.current()
    }

    pub fn set_state(&self, next: ExecutionState) -> bool {
        self.state.transition(next)
    }

    pub fn state_log(&self) -> Vec<StateChange> {
        self.state.log()
    }

    pub fn subscribe_state(&self) -> tokio::sync::watch::Receiver<ExecutionState> {
        self.state.subscribe()
    }

    /// The token components select on to wake promptly on cancel.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.lock().unwrap().clone()
    }

    /// Pure cancellation probe: no side effects, same answer until the
    /// context changes. Called at loop boundaries, around each tool call,
    /// and on each streamed chunk.
    pub fn check_canceled(&self) -> Result<()> {
        let canceled = self.cancellation.lock().unwrap().is_cancelled()
            || matches!(
                self.state.current(),
                ExecutionState::Aborting | ExecutionState::Aborted
            );
        if canceled {
            Err(self.cancellation_error())
        } else {
            Ok(())
        }
    }

    /// The error a canceled run terminates with.
    pub fn cancellation_error(&self) -> HelmError {
        HelmError::canceled(self.cancel_user_initiated.load(Ordering::SeqCst))
    }

    /// Request cancellation and wait, bounded, for the run to wind down.
    ///
    /// Applies `Running -> Aborting` (a no-op elsewhere), triggers the
    /// token, then awaits a terminal state. If the loop does not
    /// acknowledge within the grace period the state is forced to
    /// `Aborted`, so this always returns in bounded time.
    pub async fn cancel(&self, user_initiated: bool) {
        let before = self.state.current();
        if before.is_terminal() || before == ExecutionState::Idle {
            debug!(state = %before, "cancel requested with no run in flight");
            return;
        }
        self.cancel_user_initiated
            .store(user_initiated, Ordering::SeqCst);
        self.state.transition(ExecutionState::Aborting);
        self.cancellation.lock().unwrap().cancel();

        let mut states = self.state.subscribe();
        let acknowledged = async {
            loop {
                let current = *states.borrow_and_update();
                if current.is_terminal() {
                    break;
                }
                if states.changed().await.is_err() {
                    break;
                }
            }
        };
        if time::timeout(self.cancel_grace, acknowledged).await.is_err() {
            warn!(
                grace_ms = self.cancel_grace.as_millis() as u64,
                "run did not acknowledge cancellation in time, forcing aborted state"
            );
            self.state.force(ExecutionState::Aborted);
        }
    }

    /// Drive the state to `Aborted`, taking the legal path where one
    /// exists and forcing only when cancellation was observed before the
    /// run reached `Running`.
    pub fn ensure_aborted(&self) {
        match self.state.current() {
            ExecutionState::Aborted => {}
            ExecutionState::Aborting => {
                self.state.transition(ExecutionState::Aborted);
            }
            ExecutionState::Running => {
                self.state.transition(ExecutionState::Aborting);
                self.state.transition(ExecutionState::Aborted);
            }
            _ => {
                self.state.force(ExecutionState::Aborted);
            }
        }
    }

    /// Force-cancel whatever run is active so a new one can start.
    pub async fn preempt(&self) {
        if self.state.current().is_active() || self.state.current() == ExecutionState::Aborting {
            debug!("preempting active run");
            self.cancel(false).await;
        }
    }

    /// Re-arm after a terminal state: fresh token, `Idle`, cleared task
    /// metadata, todos, and metrics. History is left alone; follow-up
    /// handling decides whether it is kept.
    pub fn reset(&self) {
        self.state.reset();
        *self.cancellation.lock().unwrap() = CancellationToken::new();
        self.cancel_user_initiated.store(false, Ordering::SeqCst);
        self.todos.clear();
        self.metrics.reset();
        *self.task.lock().unwrap() = None;
    }

    /// Claim the context for a run: records metadata, starts metrics, and
    /// enters `Starting`. Fails if the context is not idle.
    pub fn begin_task(&self, run_id: RunId, task: impl Into<String>) -> Result<()> {
        if !self.state.transition(ExecutionState::Starting) {
            return Err(HelmError::InvalidState(format!(
                "cannot start a run while {}",
                self.state.current()
            )));
        }
        *self.task.lock().unwrap() = Some(TaskMetadata {
            run_id,
            task: task.into(),
            started_at: Utc::now(),
        });
        self.metrics.mark_started();
        Ok(())
    }

    pub fn task_metadata(&self) -> Option<TaskMetadata> {
        self.task.lock().unwrap().clone()
    }

    pub fn history(&self) -> Arc<Mutex<HistoryManager>> {
        self.history.clone()
    }

    pub fn todos(&self) -> &TodoStore {
        &self.todos
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn context() -> ExecutionContext {
        ExecutionContext::new(&HelmConfig::default())
    }

    #[test]
    fn check_canceled_is_idempotent() {
        let ctx = context();
        assert!(ctx.check_canceled().is_ok());
        assert!(ctx.check_canceled().is_ok());

        ctx.cancellation_token().cancel();
        assert!(ctx.check_canceled().is_err());
        assert!(ctx.check_canceled().is_err());
    }

    #[test]
    fn check_canceled_reports_who_initiated() {
        let ctx = context();
        ctx.set_state(ExecutionState::Starting);
        ctx.set_state(ExecutionState::Running);
        ctx.cancel_user_initiated.store(true, Ordering::SeqCst);
        ctx.cancellation.lock().unwrap().cancel();

        match ctx.check_canceled() {
            Err(HelmError::Canceled { user_initiated }) => assert!(user_initiated),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[test]
    fn begin_task_requires_idle() {
        let ctx = context();
        assert!(ctx.begin_task(Uuid::new_v4(), "first").is_ok());
        assert!(ctx.begin_task(Uuid::new_v4(), "second").is_err());
    }

    #[test]
    fn reset_rearms_a_terminal_context() {
        let ctx = context();
        ctx.begin_task(Uuid::new_v4(), "task").unwrap();
        ctx.set_state(ExecutionState::Running);
        ctx.cancellation_token().cancel();
        ctx.set_state(ExecutionState::Aborting);
        ctx.set_state(ExecutionState::Aborted);

        ctx.reset();

        assert_eq!(ctx.state(), ExecutionState::Idle);
        assert!(ctx.check_canceled().is_ok());
        assert!(ctx.task_metadata().is_none());
        assert!(ctx.begin_task(Uuid::new_v4(), "again").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_resolves_when_the_run_acknowledges() {
        let ctx = Arc::new(context());
        ctx.begin_task(Uuid::new_v4(), "task").unwrap();
        ctx.set_state(ExecutionState::Running);

        let acker = ctx.clone();
        let ack = tokio::spawn(async move {
            let mut states = acker.subscribe_state();
            loop {
                if *states.borrow_and_update() == ExecutionState::Aborting {
                    acker.set_state(ExecutionState::Aborted);
                    break;
                }
                if states.changed().await.is_err() {
                    break;
                }
            }
        });

        ctx.cancel(true).await;
        ack.await.unwrap();

        assert_eq!(ctx.state(), ExecutionState::Aborted);
        let log = ctx.state_log();
        assert!(log.iter().all(|change| !change.forced));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_forces_aborted_after_the_grace_period() {
        let ctx = context();
        ctx.begin_task(Uuid::new_v4(), "task").unwrap();
        ctx.set_state(ExecutionState::Running);

        // Nothing acknowledges; the grace timeout must force the state.
        ctx.cancel(true).await;

        assert_eq!(ctx.state(), ExecutionState::Aborted);
        assert!(ctx.state_log().last().unwrap().forced);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_a_run_returns_immediately() {
        let ctx = context();
        ctx.cancel(true).await;

        assert_eq!(ctx.state(), ExecutionState::Idle);
        assert!(ctx.check_canceled().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn preempt_force_cancels_an_unresponsive_run() {
        let ctx = context();
        ctx.begin_task(Uuid::new_v4(), "stuck").unwrap();
        ctx.set_state(ExecutionState::Running);

        ctx.preempt().await;

        assert_eq!(ctx.state(), ExecutionState::Aborted);
        ctx.reset();
        assert!(ctx.begin_task(Uuid::new_v4(), "next").is_ok());
    }
}
