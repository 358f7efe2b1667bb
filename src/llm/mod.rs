//! Chat model layer
//!
//! One hosted provider (Gemini). The trait seam exists so tests can script
//! model replies without network access.

mod error;
mod gemini;
mod types;

pub use error::LlmError;
pub use gemini::GeminiProvider;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for chat model providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Send the conversation (system message included) and get one reply.
    ///
    /// The model decides whether and how to call the offered tools; a reply
    /// containing function calls is returned as-is for the caller to dispatch.
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse>;
}
