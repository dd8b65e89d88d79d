//! Configuration for the orchestration engine.
//!
//! The core has no database connectivity or dataset-ingest config of its own (those
//! are owned by external collaborators); the only configuration surface is the AI
//! path: whether it is enabled at all, the API key, the model, and the call timeout.

use std::time::Duration;

/// Default OpenAI model used when `OPENAI_MODEL` is not set.
fn default_model() -> String {
    "gpt-5".to_string()
}

/// Default LLM call timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Engine-wide configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether the AI path is enabled at all (`AI_MODE=on`).
    pub ai_mode: bool,
    /// API key for the LLM provider, if configured.
    pub openai_api_key: Option<String>,
    /// Model name for the LLM provider.
    pub openai_model: String,
    /// Timeout applied to the LLM intent-extractor call.
    pub llm_timeout: Duration,
}

impl EngineConfig {
    /// Loads configuration from the environment, reading a `.env` file first when
    /// present and falling back to whatever is already set in the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env_vars()
    }

    /// Reads configuration from whatever environment variables are currently set,
    /// without touching `.env`. Exposed separately so tests can set variables with
    /// `std::env::set_var` and call this directly.
    pub fn from_env_vars() -> Self {
        let ai_mode = std::env::var("AI_MODE")
            .map(|v| v.eq_ignore_ascii_case("on"))
            .unwrap_or(false);

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let openai_model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| default_model());

        let llm_timeout = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Self {
            ai_mode,
            openai_api_key,
            openai_model,
            llm_timeout,
        }
    }

    /// Whether the AI path can actually be exercised: enabled and an API key present.
    pub fn ai_available(&self) -> bool {
        self.ai_mode && self.openai_api_key.is_some()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ai_mode: false,
            openai_api_key: None,
            openai_model: default_model(),
            llm_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
