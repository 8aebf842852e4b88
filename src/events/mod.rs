//! Progress event stream types and emitter.
//!
//! Events are one-way notifications for hosts (UI surfaces, logs). The
//! loop never blocks on a consumer: sinks are plain callbacks, and the
//! [`channel`] adapter drops events when its buffer is full.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::types::{RunId, RunStatus};

/// Severity of a [`ProgressPayload::Notice`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
    Debug,
}

/// Concrete event payloads emitted by a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressPayload {
    TurnStart {
        turn_index: usize,
    },
    /// Incremental assistant text.
    TurnChunk {
        text: String,
    },
    TurnEnd {
        turn_index: usize,
        tool_calls: usize,
    },
    ToolStart {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    ToolEnd {
        call_id: String,
        tool_name: String,
        ok: bool,
    },
    Notice {
        level: NoticeLevel,
        message: String,
    },
    /// Final outcome of the run.
    TaskResult {
        status: RunStatus,
        message: String,
    },
}

/// Envelope for streamed progress events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: RunId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: ProgressPayload,
}

/// Callback receiving progress events.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Stamps payloads with the run id, a monotonic sequence, and a
/// timestamp before handing them to the sink. Without a sink, emission
/// is a no-op.
pub struct ProgressEmitter {
    run_id: RunId,
    seq: AtomicU64,
    sink: Option<ProgressSink>,
}

impl ProgressEmitter {
    pub fn new(run_id: RunId, sink: Option<ProgressSink>) -> Self {
        Self {
            run_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub fn emit(&self, payload: ProgressPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(ProgressEvent {
            run_id: self.run_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(ProgressPayload::Notice {
            level,
            message: message.into(),
        });
    }
}

/// Adapt a bounded mpsc channel into a sink/stream pair. When the
/// consumer lags past `capacity` buffered events, further events are
/// dropped rather than blocking the loop.
pub fn channel(capacity: usize) -> (ProgressSink, ReceiverStream<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink: ProgressSink = Arc::new(move |event| {
        if tx.try_send(event).is_err() {
            tracing::trace!("progress consumer lagging, event dropped");
        }
    });
    (sink, ReceiverStream::new(rx))
}
