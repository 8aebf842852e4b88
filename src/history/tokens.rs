//! Token estimation heuristics for history budgeting.
//!
//! Estimates lean high rather than low so the budget trips before the
//! provider's real context window does.

use crate::types::Message;

pub fn estimate_text_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(4)
}

pub fn estimate_message_tokens(message: &Message) -> usize {
    let mut tokens = 4usize;
    match &message.outcome {
        Some(outcome) => {
            let payload = serde_json::to_string(outcome).unwrap_or_default();
            tokens += estimate_text_tokens(&payload) + 8;
        }
        None => tokens += estimate_text_tokens(&message.content),
    }
    if let Some(id) = &message.tool_call_id {
        tokens += estimate_text_tokens(id);
    }
    for call in &message.tool_calls {
        let args = serde_json::to_string(&call.arguments).unwrap_or_default();
        tokens += estimate_text_tokens(&call.name) + estimate_text_tokens(&args) + 8;
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ToolCall, ToolOutcome};

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate_text_tokens(""), 0);
    }

    #[test]
    fn text_tokens_round_up() {
        assert_eq!(estimate_text_tokens("abcde"), 2);
        assert_eq!(estimate_text_tokens("abcd"), 1);
    }

    #[test]
    fn tool_calls_add_overhead() {
        let plain = Message::ai("go");
        let with_call = Message::ai_with_tools(
            "go",
            vec![ToolCall::new("call_1", "navigate", serde_json::json!({"url": "x"}))],
        );
        assert!(estimate_message_tokens(&with_call) > estimate_message_tokens(&plain));
    }

    #[test]
    fn tool_results_count_payload_not_rendered_content() {
        let outcome = ToolOutcome::success(serde_json::json!({"text": "hello world"}));
        let message = Message::tool_result("call_1", outcome);
        assert!(estimate_message_tokens(&message) > 4);
    }
}
