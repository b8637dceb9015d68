//! Common types for LLM interactions
//!
//! These types are shared between the context builder and the
//! chat-completion backend.

use serde::{Deserialize, Serialize};

/// The sender of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single role-tagged message in the context window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Response from the chat-completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    /// The model's answer text
    pub content: String,

    /// Chain-of-thought text, only present for the reasoner variant
    pub reasoning: Option<String>,

    /// Total tokens billed for the exchange, 0 when the API omits usage
    pub total_tokens: u64,
}
