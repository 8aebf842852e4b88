//! Todo store scoped to one execution context.

use std::sync::Mutex;

use crate::types::{TodoItem, TodoStatus};

/// The working todo list. Planning replaces it wholesale; the
/// todo-management tool mutates it incrementally.
#[derive(Debug, Default)]
pub struct TodoStore {
    items: Mutex<Vec<TodoItem>>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list, as the planner does each cycle.
    pub fn replace(&self, items: Vec<TodoItem>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn add(&self, content: impl Into<String>) {
        self.items.lock().unwrap().push(TodoItem::new(content));
    }

    /// Set the status of the item at `index` (zero-based).
    pub fn set_status(&self, index: usize, status: TodoStatus) -> Result<(), String> {
        let mut items = self.items.lock().unwrap();
        match items.get_mut(index) {
            Some(item) => {
                item.status = status;
                Ok(())
            }
            None => Err(format!(
                "no todo at index {index} (list has {} items)",
                items.len()
            )),
        }
    }

    pub fn list(&self) -> Vec<TodoItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.items.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Whether every item is done or skipped. Vacuously true when empty;
    /// callers gate on emptiness where that matters.
    pub fn all_settled(&self) -> bool {
        self.items.lock().unwrap().iter().all(TodoItem::is_settled)
    }

    /// Checklist rendering shown to the model.
    pub fn render(&self) -> String {
        let items = self.items.lock().unwrap();
        if items.is_empty() {
            return "(no todos)".to_string();
        }
        items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {} {}", i + 1, item.marker(), item.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn replace_swaps_the_whole_list() {
        let store = TodoStore::new();
        store.add("old step");
        store.replace(vec![TodoItem::new("new step")]);

        let items = store.list();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "new step");
    }

    #[test]
    fn set_status_rejects_out_of_range_index() {
        let store = TodoStore::new();
        store.add("only step");

        assert!(store.set_status(0, TodoStatus::Done).is_ok());
        assert!(store.set_status(3, TodoStatus::Done).is_err());
    }

    #[test]
    fn all_settled_counts_skipped_as_settled() {
        let store = TodoStore::new();
        store.add("a");
        store.add("b");
        assert!(!store.all_settled());

        store.set_status(0, TodoStatus::Done).unwrap();
        store.set_status(1, TodoStatus::Skipped).unwrap();
        assert!(store.all_settled());
    }

    #[test]
    fn render_shows_markers_and_indices() {
        let store = TodoStore::new();
        store.add("open the page");
        store.add("fill the form");
        store.set_status(0, TodoStatus::Done).unwrap();

        assert_eq!(store.render(), "1. [x] open the page\n2. [ ] fill the form");
    }

    #[test]
    fn render_has_a_placeholder_when_empty() {
        assert_eq!(TodoStore::new().render(), "(no todos)");
    }
}
