//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::params::ToolParameters;
use crate::error::HelmError;

/// Core tool trait. The dispatcher validates arguments against
/// `parameters()` before calling `execute`; an `Err` never unwinds the run
/// loop, it becomes a failed tool outcome.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &ToolParameters;

    /// Execute the tool with validated arguments.
    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value, HelmError>;
}

type ToolHandler = dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, HelmError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
pub struct ClosureTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl ClosureTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, HelmError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Tool for ClosureTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value, HelmError> {
        (self.handler)(args.clone()).await
    }
}

impl std::fmt::Debug for ClosureTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
