//! Custom error types for Tandem
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Tandem operations
#[derive(Error, Debug)]
pub enum LoopError {
    /// LLM backend call failed or returned an error payload
    #[error("Backend error: {0}")]
    Backend(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted loop state errors (missing/corrupt state file)
    #[error("State error: {0}")]
    State(String),

    /// Memory store errors (empty content, unwritable file)
    #[error("Memory error: {0}")]
    Memory(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Tandem operations
pub type Result<T> = std::result::Result<T, LoopError>;

impl LoopError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}
