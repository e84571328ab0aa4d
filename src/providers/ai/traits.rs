//! LLM provider trait and supporting types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Context length exceeded: {used} tokens used, {max} maximum")]
    ContextLengthExceeded { used: usize, max: usize },

    #[error("Provider not available: {0}")]
    Unavailable(String),
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request for a completion from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Optional system prompt to set context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Conversation messages.
    pub messages: Vec<Message>,

    /// Sampling temperature (0.0 to 2.0, lower is more deterministic).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Ask the provider to constrain output to a JSON object.
    #[serde(default)]
    pub json_output: bool,
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            system_prompt: None,
            messages: Vec::new(),
            temperature: default_temperature(),
            max_tokens: None,
            json_output: false,
        }
    }
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Token usage statistics from a completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: usize,

    /// Number of tokens in the completion.
    pub completion_tokens: usize,

    /// Total tokens used.
    pub total_tokens: usize,
}

/// Reason why a completion finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation.
    Stop,

    /// Hit the max_tokens limit.
    Length,

    /// Content was filtered for safety.
    ContentFilter,

    /// Unknown or provider-specific reason.
    #[serde(other)]
    Other,
}

/// Response from a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text content.
    pub text: String,

    /// Token usage statistics.
    pub tokens_used: TokenUsage,

    /// Why generation finished.
    pub finish_reason: FinishReason,
}

/// Chat completion backend used by the sender classifier.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's name (e.g., "openai").
    fn name(&self) -> &str;

    /// Performs a completion request and returns the full response.
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<CompletionResponse>;

    /// Returns the model identifier being used.
    fn model(&self) -> &str;
}
