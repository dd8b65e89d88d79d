//! Logging configuration for the orchestration engine.
//!
//! The core has no TUI to protect from log corruption, so there is a single
//! initialization path: structured output to stderr, level controlled by
//! `RUST_LOG` (or `info` by default).

use tracing_subscriber::EnvFilter;

/// Initializes logging for the hosting process.
///
/// Safe to call once per process; a second call is a no-op (the underlying
/// `tracing` global subscriber can only be set once, and the error is ignored).
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
