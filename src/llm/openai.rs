//! OpenAI LLM client implementation.
//!
//! Implements `LlmClient` for OpenAI's chat completions API in JSON mode, with
//! bounded retry and backoff on transient failures and no streaming or
//! tool-calling, neither of which the intent extractor needs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::llm::types::Message;
use crate::llm::LlmClient;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Low temperature and a small cap keep the JSON-mode completion short and stable.
const EXTRACTION_TEMPERATURE: f64 = 0.1;
const EXTRACTION_MAX_TOKENS: u32 = 200;

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs,
        }
    }
}

/// OpenAI LLM client, bound to the JSON-mode intent-extraction request shape.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::llm(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (EngineError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return (
                EngineError::llm("authentication failed; check OPENAI_API_KEY"),
                false,
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return (EngineError::llm("rate limited by OpenAI"), true);
        }

        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return (
                EngineError::llm(format!("OpenAI API error: {}", error_response.error.message)),
                is_retryable,
            );
        }

        (
            EngineError::llm(format!("OpenAI API error ({status}): {body}")),
            is_retryable,
        )
    }

    fn is_retryable_request_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete_json(&self, messages: &[Message]) -> Result<String> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
            temperature: EXTRACTION_TEMPERATURE,
            max_tokens: EXTRACTION_MAX_TOKENS,
            response_format: OpenAiResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("OpenAI extraction request attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = self
                .client
                .post(OPENAI_API_URL)
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| EngineError::llm(format!("failed to read response: {e}")))?;

                    if status.is_success() {
                        let parsed: OpenAiResponse = serde_json::from_str(&body)
                            .map_err(|e| EngineError::llm(format!("failed to parse response: {e}")))?;

                        let choice = parsed
                            .choices
                            .into_iter()
                            .next()
                            .ok_or_else(|| EngineError::llm("no choices in OpenAI response"))?;

                        return Ok(choice.message.content.unwrap_or_default());
                    }

                    let (error, is_retryable) = Self::parse_error(status, &body);
                    last_error = Some(error);

                    if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                        break;
                    }

                    warn!("OpenAI request failed (attempt {}), retrying in {:?}: {}", attempt, delay, status);
                }
                Err(e) => {
                    let is_retryable = Self::is_retryable_request_error(&e);
                    let error = if e.is_timeout() {
                        EngineError::llm("request timed out")
                    } else if e.is_connect() {
                        EngineError::llm("failed to connect to OpenAI API")
                    } else {
                        EngineError::llm(format!("request failed: {e}"))
                    };
                    last_error = Some(error);

                    if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                        break;
                    }

                    warn!("OpenAI request failed (attempt {}), retrying in {:?}", attempt, delay);
                }
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Err(last_error.expect("at least one attempt was made"))
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f64,
    max_tokens: u32,
    response_format: OpenAiResponseFormat,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
