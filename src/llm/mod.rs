//! Remote chat-completion client
//!
//! This module defines the backend trait and types for talking to the
//! DeepSeek chat-completion API.

pub use async_trait::async_trait;

pub mod deepseek;
pub mod factory;
mod types;

pub use self::factory::{create_backend, ModelVariant};
pub use self::types::*;

/// Common trait for chat-completion backends
///
/// One request is outstanding at a time and a failure is surfaced to the
/// caller as-is; the caller may re-issue manually.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send the assembled context window to the model and return its reply
    async fn send_message(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<ChatResponse, LlmError>;

    /// Get the provider name
    /// Included in the API for provider identification but not currently used
    #[allow(dead_code)]
    fn name(&self) -> &str;

    /// Get the upstream model identifier
    #[allow(dead_code)]
    fn model(&self) -> &str;
}

/// Error types for LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The API rejected the request or returned an unusable response
    #[error("API error: {0}")]
    Api(String),

    /// The client is misconfigured (missing credential, unknown variant)
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP request itself failed (network, timeout)
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}
