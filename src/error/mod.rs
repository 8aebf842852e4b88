//! Error types for autohelm.

use thiserror::Error;

/// Primary error type for all autohelm operations.
#[derive(Error, Debug)]
pub enum HelmError {
    /// The run was canceled, by the user or by the system. This is the
    /// clean-termination signal, not a defect.
    #[error("Canceled ({})", if *user_initiated { "user" } else { "system" })]
    Canceled { user_initiated: bool },

    #[error("Iteration limit reached: {scope} exhausted {limit} iterations")]
    IterationsExhausted { scope: String, limit: usize },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Strategy error: {0}")]
    Strategy(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad failure class for routing loop behavior. Cancellation and budget
/// exhaustion terminate a run; tool and strategy failures are absorbed by
/// the loop; everything else is unexpected and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Cancellation,
    Tool,
    Strategy,
    IterationBudget,
    Unexpected,
}

impl HelmError {
    pub fn canceled(user_initiated: bool) -> Self {
        Self::Canceled { user_initiated }
    }

    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    pub fn iterations(scope: impl Into<String>, limit: usize) -> Self {
        Self::IterationsExhausted {
            scope: scope.into(),
            limit,
        }
    }

    /// Classify this error into a failure class.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Canceled { .. } => FailureClass::Cancellation,
            Self::IterationsExhausted { .. } => FailureClass::IterationBudget,
            Self::ToolExecution { .. } => FailureClass::Tool,
            Self::Strategy(_) => FailureClass::Strategy,
            _ => FailureClass::Unexpected,
        }
    }

    /// Whether this error represents cancellation rather than a defect.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// Whether the run terminates on this error when it escapes the loop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.class(), FailureClass::Tool | FailureClass::Strategy)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, HelmError>;
