//! Error types for the orchestration engine.

use thiserror::Error;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed request: both/neither of message and intent, or intent without value.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No catalog available for the dataset.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// SQL planning failed (no usable columns, validator rejected the plan, ...).
    #[error("Planning error: {0}")]
    Planning(String),

    /// LLM call failed: network, timeout, bad JSON, missing required field.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Summarizer received empty results or could not project the table.
    #[error("Summarizer error: {0}")]
    Summarizer(String),

    /// Report persistence failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Conversation state store read/write failed.
    #[error("State error: {0}")]
    State(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn summarizer(msg: impl Into<String>) -> Self {
        Self::Summarizer(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Returns the error category as a string for logging/metric tagging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation Error",
            Self::Catalog(_) => "Catalog Error",
            Self::Planning(_) => "Planning Error",
            Self::Llm(_) => "LLM Error",
            Self::Summarizer(_) => "Summarizer Error",
            Self::Persistence(_) => "Persistence Error",
            Self::State(_) => "State Error",
        }
    }
}

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
