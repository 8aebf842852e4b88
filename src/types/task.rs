//! Task request, classification, and run result types.

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Unique run identifier.
pub type RunId = Uuid;

/// A task submitted to the orchestrator.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct TaskRequest {
    /// The user-supplied goal.
    #[builder(into)]
    pub task: String,
    /// System prompt seeded at the head of history. Falls back to a minimal
    /// default when absent.
    #[builder(into)]
    pub system_prompt: Option<String>,
    /// Forces a strategy, bypassing classification-based selection.
    pub strategy: Option<StrategySelector>,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            system_prompt: None,
            strategy: None,
        }
    }
}

/// Control strategy driving a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StrategySelector {
    /// Plain turn loop for simple tasks.
    Direct,
    /// Plan, execute, validate cycles for complex tasks.
    PlanExecuteValidate,
}

/// Task complexity reported by classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskComplexity {
    Simple,
    Complex,
}

/// Result of the classification support tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TaskClassification {
    pub complexity: TaskComplexity,
    /// Whether the task continues the prior conversation.
    #[serde(default)]
    pub is_follow_up: bool,
}

impl TaskClassification {
    /// The fallback applied when classification fails: treat the task as a
    /// fresh, complex one.
    pub fn conservative() -> Self {
        Self {
            complexity: TaskComplexity::Complex,
            is_follow_up: false,
        }
    }

    pub fn strategy(&self) -> StrategySelector {
        match self.complexity {
            TaskComplexity::Simple => StrategySelector::Direct,
            TaskComplexity::Complex => StrategySelector::PlanExecuteValidate,
        }
    }
}

/// A plan produced by the planner support tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub action: String,
}

/// Verdict returned by the validation support tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationVerdict {
    pub is_complete: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ValidationVerdict {
    /// The fallback applied when validation fails: incomplete, so the outer
    /// loop re-plans instead of declaring unverified success.
    pub fn inconclusive(reason: impl Into<String>) -> Self {
        Self {
            is_complete: false,
            reasoning: reason.into(),
            suggestions: Vec::new(),
        }
    }
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Canceled,
}

/// Final report for a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    /// User-facing result text, produced by the result tool or a fallback.
    pub message: String,
    pub strategy: StrategySelector,
    pub metrics: crate::context::MetricsSnapshot,
    pub finished_at: DateTime<Utc>,
}

/// An outstanding request for human input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HumanInputRequest {
    pub id: Uuid,
    pub prompt: String,
    pub requested_at: DateTime<Utc>,
}

impl HumanInputRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            requested_at: Utc::now(),
        }
    }
}

/// A human answer to an input request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HumanResponse {
    /// Must match the outstanding request id; stale responses are ignored.
    pub request_id: Uuid,
    pub decision: HumanDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HumanDecision {
    /// Resume the run where it paused.
    Proceed,
    /// Terminate the run as a user cancellation.
    Abort,
}
