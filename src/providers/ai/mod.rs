//! AI/LLM provider implementations.
//!
//! The classifier talks to models through the [`LlmProvider`] trait. The only
//! bundled implementation is [`OpenAiCompatibleProvider`], which covers
//! OpenAI itself and local servers such as Ollama, vLLM and LM Studio.
//!
//! # Example
//!
//! ```rust,no_run
//! use sortbox::providers::ai::{
//!     CompletionRequest, LlmProvider, Message, OpenAiCompatibleProvider,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let local = OpenAiCompatibleProvider::new("http://localhost:11434/v1", None, "llama3.1");
//!
//! let request = CompletionRequest::new(vec![Message::user("news@list.example")])
//!     .with_system_prompt("Name the category for this sender.")
//!     .with_json_output();
//!
//! let response = local.complete(&request).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

mod openai;
mod traits;

pub use openai::{OpenAiCompatibleProvider, OPENAI_BASE_URL};
pub use traits::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, LlmResult,
    Message, Role, TokenUsage,
};
