//! DeepSeek API integration
//!
//! Client for DeepSeek's OpenAI-compatible chat completions endpoint,
//! covering deepseek-chat (V3) and deepseek-reasoner (R1).

use crate::llm::{Backend, ChatMessage, ChatResponse, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Constants for DeepSeek API
const API_BASE_URL: &str = "https://api.deepseek.com";

/// Request body for the chat completions endpoint
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

// DeepSeek API response types
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    /// Only populated by deepseek-reasoner
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

/// DeepSeek API client implementation
pub struct DeepSeekBackend {
    api_key: String,
    client: reqwest::Client,
    model_name: String,
    base_url: String,
}

impl DeepSeekBackend {
    /// Create a new DeepSeek client
    pub fn new(api_key: String, model_name: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout for long context
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            client,
            model_name,
            base_url: API_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl Backend for DeepSeekBackend {
    async fn send_message(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<ChatResponse, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.model_name,
            messages,
            temperature,
            stream: false,
        };

        // Single attempt: failures surface to the caller, which may re-send
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api(format!(
                "DeepSeek HTTP error {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("Failed to parse DeepSeek response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Api("No choices returned from DeepSeek API".to_string()))?;

        let total_tokens = completion
            .usage
            .and_then(|usage| usage.total_tokens)
            .unwrap_or(0);

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            reasoning: choice.message.reasoning_content,
            total_tokens,
        })
    }

    fn name(&self) -> &str {
        "deepseek"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}
