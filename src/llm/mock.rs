//! Mock LLM client for testing.
//!
//! Provides deterministic JSON-intent responses keyed off substrings of the
//! incoming user message, so tests can exercise the orchestrator's AI-assist path
//! without a network call.

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned JSON-intent responses based on input patterns.
///
/// Used for unit and integration testing without making real API calls.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    custom_responses: Vec<(String, String)>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the input contains `pattern`, the mock will return `response` verbatim
    /// instead of the built-in pattern match.
    pub fn with_response(mut self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.custom_responses.push((pattern.into(), response.into()));
        self
    }

    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input_lower.contains("trend") || input_lower.contains("over time") {
            return intent_json("trend", Some("last_30_days"), None, None);
        }

        if input_lower.contains("top") || input_lower.contains("breakdown") {
            return intent_json("top_categories", Some("last_30_days"), None, None);
        }

        if input_lower.contains("outlier") || input_lower.contains("anomal") {
            return intent_json("outliers", None, None, None);
        }

        if input_lower.contains("missing") || input_lower.contains("quality") || input_lower.contains("null") {
            return intent_json("data_quality", None, None, None);
        }

        if input_lower.contains("row") || input_lower.contains("count") {
            return intent_json("row_count", None, None, None);
        }

        r#"{"notes": "unable to classify this request"}"#.to_string()
    }

    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

fn intent_json(
    analysis_type: &str,
    time_period: Option<&str>,
    metric: Option<&str>,
    group_by: Option<&str>,
) -> String {
    serde_json::json!({
        "analysis_type": analysis_type,
        "time_period": time_period,
        "metric": metric,
        "group_by": group_by,
        "notes": format!("classified as {analysis_type} from keyword matching"),
    })
    .to_string()
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_json(&self, messages: &[Message]) -> Result<String> {
        let input = Self::extract_user_input(messages);
        Ok(self.mock_response(&input))
    }
}
