//! Context window assembly
//!
//! Builds the ordered message list for one request: a bounded replay of
//! prior turns followed by the new prompt.

use crate::llm::ChatMessage;
use crate::store::Conversation;

/// Build the context window for a new prompt
///
/// Replays the last `depth` turns in chronological order, each as a user
/// message followed by an assistant message, then appends the new prompt as
/// the final user message. Pure: the conversation is never mutated, and a
/// history shorter than `depth` is used in full.
pub fn build_context(
    conversation: Option<&Conversation>,
    depth: usize,
    new_prompt: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    if let Some(conv) = conversation {
        let start = conv.history.len().saturating_sub(depth);
        for turn in &conv.history[start..] {
            messages.push(ChatMessage::user(turn.prompt.clone()));
            messages.push(ChatMessage::assistant(turn.response.clone()));
        }
    }

    messages.push(ChatMessage::user(new_prompt));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::store::Turn;
    use std::path::PathBuf;

    fn conversation(turns: &[(&str, &str)]) -> Conversation {
        Conversation {
            id: "1700000000".into(),
            name: "test".into(),
            path: PathBuf::from("log/test.txt"),
            history: turns
                .iter()
                .map(|(p, r)| Turn::new(p.to_string(), r.to_string(), 0))
                .collect(),
        }
    }

    #[test]
    fn test_window_shape() {
        let conv = conversation(&[("a", "b"), ("c", "d"), ("e", "f")]);

        for depth in 0..5 {
            let messages = build_context(Some(&conv), depth, "new");
            assert_eq!(messages.len(), 2 * depth.min(3) + 1);

            let last = messages.last().unwrap();
            assert_eq!(last.role, Role::User);
            assert_eq!(last.content, "new");
        }
    }

    #[test]
    fn test_no_active_conversation() {
        let messages = build_context(None, 10, "solo");
        assert_eq!(messages, vec![ChatMessage::user("solo")]);
    }

    #[test]
    fn test_depth_zero_sends_only_the_prompt() {
        let conv = conversation(&[("a", "b")]);
        let messages = build_context(Some(&conv), 0, "just this");
        assert_eq!(messages, vec![ChatMessage::user("just this")]);
    }

    #[test]
    fn test_depth_one_keeps_most_recent_turn() {
        let conv = conversation(&[("hi", "hello")]);
        let messages = build_context(Some(&conv), 1, "bye");

        assert_eq!(
            messages,
            vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("bye"),
            ]
        );
    }

    #[test]
    fn test_replay_is_chronological() {
        let conv = conversation(&[("first", "1"), ("second", "2"), ("third", "3")]);
        let messages = build_context(Some(&conv), 2, "now");

        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["second", "2", "third", "3", "now"]);
    }
}
