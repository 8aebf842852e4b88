//! Convenience re-exports for common use.

pub use crate::config::HelmConfig;
pub use crate::context::{ExecutionContext, ExecutionState};
pub use crate::error::{HelmError, Result};
pub use crate::events::{ProgressEvent, ProgressPayload, ProgressSink};
pub use crate::orchestrator::{HumanInputBridge, Orchestrator};
pub use crate::provider::{BoundModel, ModelProvider, TurnRequest};
pub use crate::tools::{ClosureTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{
    HumanDecision, HumanResponse, Message, RunStatus, RunSummary, StrategySelector, TaskRequest,
};
