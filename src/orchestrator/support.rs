//! Out-of-band invocation of the support tools.
//!
//! Classification, planning, validation, and result generation go through
//! the uniform tool contract but outside the dispatch loop: their calls
//! and results never enter history, and failures degrade to conservative
//! defaults instead of failing the run. Hosts register their own
//! implementations under the protocol names; a missing tool behaves like
//! a failing one.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{HelmError, Result};
use crate::tools::{self, ToolArguments, ToolRegistry};
use crate::types::{Plan, PlanStep, TaskClassification, ValidationVerdict};

pub struct SupportTools {
    registry: Arc<ToolRegistry>,
}

impl SupportTools {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Classify the task. Any failure yields the conservative default:
    /// complex and not a follow-up.
    pub async fn classify(&self, task: &str) -> TaskClassification {
        match self.invoke(tools::CLASSIFY_TOOL, serde_json::json!({ "task": task })).await {
            Ok(output) => parse_payload(output).unwrap_or_else(|| {
                warn!("classification output did not parse, using conservative default");
                TaskClassification::conservative()
            }),
            Err(err) => {
                warn!(error = %err, "classification failed, using conservative default");
                TaskClassification::conservative()
            }
        }
    }

    /// Ask the planner for a fresh plan. `None` means the caller keeps
    /// whatever todos it already has.
    pub async fn plan(&self, task: &str) -> Option<Plan> {
        match self.invoke(tools::PLANNER_TOOL, serde_json::json!({ "task": task })).await {
            Ok(output) => {
                let plan = parse_plan(output);
                if plan.is_none() {
                    warn!("planner output did not contain usable steps");
                }
                plan
            }
            Err(err) => {
                warn!(error = %err, "planner invocation failed");
                None
            }
        }
    }

    /// Validate the work done so far against the original task. Failures
    /// report incomplete so the outer loop re-plans rather than declaring
    /// unverified success.
    pub async fn validate(&self, task: &str) -> ValidationVerdict {
        match self.invoke(tools::VALIDATOR_TOOL, serde_json::json!({ "task": task })).await {
            Ok(output) => parse_payload(output).unwrap_or_else(|| {
                ValidationVerdict::inconclusive("validation output did not parse")
            }),
            Err(err) => {
                warn!(error = %err, "validation failed");
                ValidationVerdict::inconclusive(format!("validation failed: {err}"))
            }
        }
    }

    /// Produce the user-facing result text. `None` means the caller falls
    /// back to a generic message.
    pub async fn final_result(&self, task: &str) -> Option<String> {
        match self.invoke(tools::RESULT_TOOL, serde_json::json!({ "task": task })).await {
            Ok(Value::String(text)) => Some(text),
            Ok(output) => output
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(err) => {
                warn!(error = %err, "result generation failed, falling back");
                None
            }
        }
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<Value> {
        let Some(tool) = self.registry.get(name) else {
            return Err(HelmError::Strategy(format!(
                "support tool '{name}' is not registered"
            )));
        };
        let args = ToolArguments::new(arguments);
        tool.execute(&args).await
    }
}

/// Deserialize a support payload, unwrapping one level of string-embedded
/// JSON the way tool arguments are unwrapped.
fn parse_payload<T: DeserializeOwned>(value: Value) -> Option<T> {
    let value = unwrap_embedded(value);
    serde_json::from_value(value).ok()
}

fn unwrap_embedded(value: Value) -> Value {
    match value {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}

/// Accept plans as `{steps: [...]}` or a bare array, with steps given as
/// strings or `{action}` objects. No usable steps means no plan.
fn parse_plan(value: Value) -> Option<Plan> {
    let value = unwrap_embedded(value);
    let items = match &value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map.get("steps")?.as_array()?.clone(),
        _ => return None,
    };
    let steps: Vec<PlanStep> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(action) => Some(PlanStep { action }),
            Value::Object(map) => map
                .get("action")
                .and_then(Value::as_str)
                .map(|action| PlanStep {
                    action: action.to_string(),
                }),
            _ => None,
        })
        .collect();
    if steps.is_empty() {
        None
    } else {
        Some(Plan { steps })
    }
}
