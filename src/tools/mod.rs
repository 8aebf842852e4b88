//! Tool system: trait, registry, argument handling, and builtins.

pub mod arguments;
pub mod builtin;
pub mod params;
pub mod registry;
pub mod tool;
pub mod validation;

pub use arguments::ToolArguments;
pub use builtin::{done_tool, human_input_tool, is_mutating_todo_action, todo_manager_tool};
pub use params::{ParameterBuilder, ToolParameters};
pub use registry::ToolRegistry;
pub use tool::{ClosureTool, Tool};
pub use validation::validate_arguments;

/// Completion signal: a successful call ends the execution phase.
pub const DONE_TOOL: &str = "done";
/// Escalation to the human operator; suspends the loop until answered.
pub const HUMAN_INPUT_TOOL: &str = "human_input";
/// Todo list management; mutating calls queue a reminder.
pub const TODO_MANAGER_TOOL: &str = "todo_manager";
/// Support tool: classifies a task as simple or complex.
pub const CLASSIFY_TOOL: &str = "classify_task";
/// Support tool: produces a step plan for the todo list.
pub const PLANNER_TOOL: &str = "planner";
/// Support tool: judges whether the task goal has been met.
pub const VALIDATOR_TOOL: &str = "validator";
/// Support tool: writes the user-facing result message.
pub const RESULT_TOOL: &str = "task_result";
