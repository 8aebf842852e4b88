//! Built-in protocol tools.
//!
//! These are the tools whose behavior the core defines rather than the
//! host: the completion signal (`done`), the human-input escalation
//! (`human_input`), and the todo list manager (`todo_manager`). Each is
//! constructed via [`ClosureTool::new`] and returned as `Arc<dyn Tool>`.
//! Browser tools and the LLM-backed support tools are registered by the
//! host.

use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::HelmError;
use crate::tools::params::ToolParameters;
use crate::tools::tool::{ClosureTool, Tool};
use crate::types::{HumanInputRequest, TodoStatus};

use super::{DONE_TOOL, HUMAN_INPUT_TOOL, TODO_MANAGER_TOOL};

/// Create the `done` tool. A successful call sets the completion signal in
/// the dispatcher.
pub fn done_tool() -> Arc<dyn Tool> {
    Arc::new(ClosureTool::new(
        DONE_TOOL,
        "Signal that the task is finished",
        ToolParameters::object()
            .boolean("success", "Whether the task goal was achieved", false)
            .string("summary", "Short summary of what was done", false)
            .build(),
        |args| async move {
            Ok(serde_json::json!({
                "success": args.get_bool_opt("success").unwrap_or(true),
                "summary": args.get_str_opt("summary").unwrap_or_default(),
            }))
        },
    ))
}

/// Create the `human_input` tool. Its output carries the `requested` flag
/// and a fresh request id the orchestrator polls against.
pub fn human_input_tool() -> Arc<dyn Tool> {
    Arc::new(ClosureTool::new(
        HUMAN_INPUT_TOOL,
        "Ask the human operator a question and pause until they answer",
        ToolParameters::object()
            .string("prompt", "The question to show the human", true)
            .build(),
        |args| async move {
            let request = HumanInputRequest::new(args.get_str("prompt")?);
            Ok(serde_json::json!({
                "requested": true,
                "request_id": request.id,
                "prompt": request.prompt,
            }))
        },
    ))
}

/// Create the `todo_manager` tool bound to a context's todo store.
///
/// Actions: `list` (read-only), `add`, `complete`, `skip`, `replace`.
/// Indices are one-based, matching the rendered checklist. After any
/// successful mutating action the dispatcher queues a reminder with the new
/// list.
pub fn todo_manager_tool(context: Arc<ExecutionContext>) -> Arc<dyn Tool> {
    Arc::new(ClosureTool::new(
        TODO_MANAGER_TOOL,
        "Inspect or update the working todo list",
        ToolParameters::object()
            .string_enum(
                "action",
                "What to do with the list",
                &["list", "add", "complete", "skip", "replace"],
                true,
            )
            .string_array("items", "Todo texts for add and replace", false)
            .integer("index", "One-based item index for complete and skip", false)
            .build(),
        move |args| {
            let context = context.clone();
            async move {
                let action = args.get_str("action")?.to_string();
                let todos = context.todos();
                match action.as_str() {
                    "list" => {}
                    "add" => {
                        for item in args.get_str_array("items")? {
                            todos.add(item);
                        }
                    }
                    "replace" => {
                        todos.replace(
                            args.get_str_array("items")?
                                .into_iter()
                                .map(crate::types::TodoItem::new)
                                .collect(),
                        );
                    }
                    "complete" | "skip" => {
                        let index = args.get_i64("index")?;
                        if index < 1 {
                            return Err(HelmError::InvalidArgument(format!(
                                "index must be one-based, got {index}"
                            )));
                        }
                        let status = if action == "complete" {
                            TodoStatus::Done
                        } else {
                            TodoStatus::Skipped
                        };
                        todos
                            .set_status(index as usize - 1, status)
                            .map_err(|message| HelmError::tool(TODO_MANAGER_TOOL, message))?;
                    }
                    other => {
                        return Err(HelmError::InvalidArgument(format!(
                            "unknown todo action '{other}'"
                        )));
                    }
                }
                Ok(serde_json::json!({
                    "action": action,
                    "todos": todos.render(),
                }))
            }
        },
    ))
}

/// Whether a `todo_manager` argument object names a mutating action.
pub fn is_mutating_todo_action(arguments: &serde_json::Value) -> bool {
    match arguments.get("action").and_then(|a| a.as_str()) {
        Some("list") | None => false,
        Some(_) => true,
    }
}
