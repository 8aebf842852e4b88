//! Shared helpers for the scenario tests: canned support tools.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use autohelm::error::HelmError;
use autohelm::tools::{ClosureTool, Tool, ToolParameters};

/// Invocation count shared with a canned tool.
#[derive(Clone, Default)]
pub struct CallCount(Arc<AtomicUsize>);

impl CallCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A tool replaying queued payloads in order, repeating the last one once
/// the queue runs dry. Returns the counter alongside so tests can assert
/// how many times the loop consulted it.
pub fn sequenced_tool(
    name: &str,
    payloads: Vec<serde_json::Value>,
) -> (Arc<dyn Tool>, CallCount) {
    let count = CallCount::default();
    let calls = count.0.clone();
    let queue = Arc::new(Mutex::new(VecDeque::from(payloads)));
    let tool: Arc<dyn Tool> = Arc::new(ClosureTool::new(
        name,
        "Canned support tool",
        ToolParameters::empty(),
        move |_args| {
            calls.fetch_add(1, Ordering::SeqCst);
            let queue = queue.clone();
            async move {
                let mut queue = queue.lock().unwrap();
                let payload = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                payload.ok_or_else(|| {
                    HelmError::Strategy("canned tool has no payload queued".to_string())
                })
            }
        },
    ));
    (tool, count)
}

/// A tool answering every call with the same payload.
pub fn canned_tool(name: &str, payload: serde_json::Value) -> Arc<dyn Tool> {
    sequenced_tool(name, vec![payload]).0
}

/// A classifier reporting a fixed complexity for a fresh task.
pub fn classifier(complexity: &str) -> Arc<dyn Tool> {
    canned_tool(
        autohelm::tools::CLASSIFY_TOOL,
        serde_json::json!({ "complexity": complexity, "is_follow_up": false }),
    )
}
