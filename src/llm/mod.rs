//! LLM integration for the orchestration engine.
//!
//! The AI-assist path is a single structured-JSON completion, never streaming or
//! tool-calling, so `LlmClient` exposes exactly the one method the intent
//! extractor calls.

pub mod extractor;
pub mod mock;
pub mod openai;
pub mod types;

pub use extractor::{extract_intent, ExtractedIntent};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use types::{Message, Role};

use async_trait::async_trait;

use crate::error::Result;

/// A client that can turn a system+user message pair into a JSON-mode completion.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends `messages` and returns the raw JSON-mode response text.
    async fn complete_json(&self, messages: &[Message]) -> Result<String>;
}
