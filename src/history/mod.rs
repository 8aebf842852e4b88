//! Ordered execution history with a token budget and a reminder queue.

pub mod tokens;

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::types::{Message, MessageRole};

pub use tokens::{estimate_message_tokens, estimate_text_tokens};

/// The conversation record for one execution context.
///
/// Entries keep insertion order. When the estimated token count exceeds the
/// budget, the oldest non-system, non-pinned entries are evicted from the
/// front; an `ai` entry that carries tool calls is evicted together with its
/// tool results so call/result pairing survives eviction.
#[derive(Debug)]
pub struct HistoryManager {
    entries: Vec<Message>,
    token_budget: usize,
    used_tokens: usize,
    reminders: VecDeque<String>,
    /// Call ids from the most recent `ai` entry still awaiting results.
    pending_results: Vec<String>,
}

impl HistoryManager {
    pub fn new(token_budget: usize) -> Self {
        Self {
            entries: Vec::new(),
            token_budget,
            used_tokens: 0,
            reminders: VecDeque::new(),
            pending_results: Vec::new(),
        }
    }

    /// Append one entry, then evict if over budget and flush any reminders
    /// whose ordering point has been reached.
    pub fn append(&mut self, message: Message) {
        self.track_pairing(&message);
        self.push_entry(message);
        self.evict_over_budget();
        self.flush_ready_reminders();
    }

    /// Queue an advisory entry. It enters history immediately if no tool
    /// results are pending, otherwise as soon as the pending batch closes.
    pub fn queue_reminder(&mut self, text: impl Into<String>) {
        self.reminders.push_back(text.into());
        self.flush_ready_reminders();
    }

    /// Immutable snapshot of the record in insertion order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.clone()
    }

    /// Drop all system entries, keeping relative order of the rest.
    pub fn remove_system_entries(&mut self) {
        self.entries.retain(|entry| !entry.is_system());
        self.recount();
    }

    /// Reset the record, the reminder queue, and pairing state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.reminders.clear();
        self.pending_results.clear();
        self.used_tokens = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn used_tokens(&self) -> usize {
        self.used_tokens
    }

    /// Whether the most recent `ai` entry still awaits tool results.
    pub fn has_pending_results(&self) -> bool {
        !self.pending_results.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    fn track_pairing(&mut self, message: &Message) {
        match message.role {
            MessageRole::Ai if message.has_tool_calls() => {
                if !self.pending_results.is_empty() {
                    warn!(
                        outstanding = self.pending_results.len(),
                        "new ai tool batch appended while results were pending"
                    );
                }
                self.pending_results = message
                    .tool_calls
                    .iter()
                    .map(|call| call.id.clone())
                    .collect();
            }
            MessageRole::Tool => {
                if let Some(id) = &message.tool_call_id {
                    self.pending_results.retain(|pending| pending != id);
                }
            }
            _ => {}
        }
    }

    fn push_entry(&mut self, message: Message) {
        self.used_tokens += estimate_message_tokens(&message);
        self.entries.push(message);
    }

    fn flush_ready_reminders(&mut self) {
        if !self.pending_results.is_empty() {
            return;
        }
        while let Some(text) = self.reminders.pop_front() {
            debug!(chars = text.len(), "flushing reminder into history");
            self.push_entry(Message::human(text));
        }
    }

    fn evict_over_budget(&mut self) {
        while self.used_tokens > self.token_budget {
            let Some(start) = self.entries.iter().position(|entry| {
                !entry.is_system() && !entry.pinned && !self.awaits_results(entry)
            }) else {
                break;
            };
            let end = self.eviction_group_end(start);
            let evicted: usize = self.entries[start..end]
                .iter()
                .map(estimate_message_tokens)
                .sum();
            debug!(
                entries = end - start,
                tokens = evicted,
                "evicting history entries over budget"
            );
            self.entries.drain(start..end);
            self.used_tokens = self.used_tokens.saturating_sub(evicted);
        }
    }

    /// One past the last index belonging to the eviction group starting at
    /// `start`: a tool-calling `ai` entry takes its following results along.
    fn eviction_group_end(&self, start: usize) -> usize {
        let mut end = start + 1;
        if self.entries[start].role == MessageRole::Ai && self.entries[start].has_tool_calls() {
            while end < self.entries.len() && self.entries[end].role == MessageRole::Tool {
                end += 1;
            }
        }
        end
    }

    fn awaits_results(&self, entry: &Message) -> bool {
        entry.role == MessageRole::Ai
            && entry
                .tool_calls
                .iter()
                .any(|call| self.pending_results.contains(&call.id))
    }

    fn recount(&mut self) {
        self.used_tokens = self.entries.iter().map(estimate_message_tokens).sum();
    }
}
