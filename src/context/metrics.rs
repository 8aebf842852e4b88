//! Per-run execution metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic counters and timing for one run. Counters are written by the
/// dispatcher (`tool_calls`, `errors`) and the orchestrator (`observations`).
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    tool_calls: AtomicU64,
    errors: AtomicU64,
    observations: AtomicU64,
    timing: Mutex<Timing>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Timing {
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Point-in-time copy of the metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub tool_calls: u64,
    pub errors: u64,
    pub observations: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_observation(&self) {
        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_started(&self) {
        let mut timing = self.timing.lock().unwrap();
        timing.started_at = Some(Utc::now());
        timing.finished_at = None;
    }

    pub fn mark_finished(&self) {
        self.timing.lock().unwrap().finished_at = Some(Utc::now());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let timing = *self.timing.lock().unwrap();
        let duration_ms = match (timing.started_at, timing.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().try_into().ok(),
            _ => None,
        };
        MetricsSnapshot {
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            observations: self.observations.load(Ordering::Relaxed),
            started_at: timing.started_at,
            finished_at: timing.finished_at,
            duration_ms,
        }
    }

    pub fn reset(&self) {
        self.tool_calls.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.observations.store(0, Ordering::Relaxed);
        *self.timing.lock().unwrap() = Timing::default();
    }
}
