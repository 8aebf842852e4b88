//! Execution state machine.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::watch;
use tracing::debug;

/// Lifecycle of one execution context.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    Starting,
    Running,
    Aborting,
    Aborted,
    Completed,
    Error,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Completed | Self::Error)
    }

    /// Whether a run currently owns the context.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    fn allows(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Starting, Self::Error)
                | (Self::Running, Self::Aborting)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Error)
                | (Self::Aborting, Self::Aborted)
        )
    }
}

/// One accepted transition, as recorded in the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateChange {
    pub from: ExecutionState,
    pub to: ExecutionState,
    /// Set when the transition bypassed the allow-list (grace-timeout path).
    pub forced: bool,
    pub at: DateTime<Utc>,
}

/// Callback invoked exactly once per accepted transition.
pub type StateSink = Arc<dyn Fn(StateChange) + Send + Sync>;

#[derive(Debug)]
struct StateInner {
    current: ExecutionState,
    log: Vec<StateChange>,
}

/// Shared state cell: validated transitions, a transition log, a `watch`
/// channel for awaiting states, and an optional notification sink.
pub struct StateCell {
    inner: Mutex<StateInner>,
    tx: watch::Sender<ExecutionState>,
    sink: Mutex<Option<StateSink>>,
}

impl std::fmt::Debug for StateCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell")
            .field("current", &self.current())
            .finish()
    }
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ExecutionState::Idle);
        Self {
            inner: Mutex::new(StateInner {
                current: ExecutionState::Idle,
                log: Vec::new(),
            }),
            tx,
            sink: Mutex::new(None),
        }
    }

    pub fn set_sink(&self, sink: StateSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    pub fn current(&self) -> ExecutionState {
        self.inner.lock().unwrap().current
    }

    /// Apply a transition if the allow-list permits it. Invalid requests are
    /// no-ops. Returns whether the transition applied.
    pub fn transition(&self, next: ExecutionState) -> bool {
        let change = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.current.allows(next) {
                debug!(from = %inner.current, to = %next, "state transition rejected");
                return false;
            }
            let change = StateChange {
                from: inner.current,
                to: next,
                forced: false,
                at: Utc::now(),
            };
            inner.current = next;
            inner.log.push(change.clone());
            change
        };
        self.publish(change);
        true
    }

    /// Force a state outside the allow-list. Only the cancellation
    /// grace-timeout path uses this. No-op when already in `next`.
    pub fn force(&self, next: ExecutionState) -> bool {
        let change = {
            let mut inner = self.inner.lock().unwrap();
            if inner.current == next {
                return false;
            }
            let change = StateChange {
                from: inner.current,
                to: next,
                forced: true,
                at: Utc::now(),
            };
            inner.current = next;
            inner.log.push(change.clone());
            change
        };
        self.publish(change);
        true
    }

    /// Return to `Idle` with an empty log. Not a transition: nothing is
    /// published or notified.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.current = ExecutionState::Idle;
        inner.log.clear();
        let _ = self.tx.send_replace(ExecutionState::Idle);
    }

    pub fn log(&self) -> Vec<StateChange> {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.tx.subscribe()
    }

    fn publish(&self, change: StateChange) {
        let _ = self.tx.send_replace(change.to);
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink(change);
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
