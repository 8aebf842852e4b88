//! Todo list types shared by the planner and the todo-management tool.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A single planned step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodoItem {
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
}

impl TodoItem {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: TodoStatus::Pending,
        }
    }

    /// Whether this item no longer needs work.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, TodoStatus::Done | TodoStatus::Skipped)
    }

    /// Checklist marker used when rendering the list for the model.
    pub fn marker(&self) -> &'static str {
        match self.status {
            TodoStatus::Pending => "[ ]",
            TodoStatus::Done => "[x]",
            TodoStatus::Skipped => "[~]",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    Done,
    Skipped,
}
