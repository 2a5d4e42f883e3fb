//! LLM backend implementations and factory
//!
//! Submodules implement the concrete backends; `create_backend` selects a
//! variant from configuration.

pub mod command;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::core::{ModelConfig, Result};

pub use command::CommandBackend;
pub use openai::OpenAiBackend;
pub use traits::{FinishReason, LlmBackend, LlmResponse};

/// Create an LLM backend based on configuration
pub fn create_backend(config: &ModelConfig) -> Result<Arc<dyn LlmBackend>> {
    let backend: Arc<dyn LlmBackend> = match config.backend.as_str() {
        "command" => Arc::new(CommandBackend::from_config(config)?),
        _ => Arc::new(OpenAiBackend::from_config(config)),
    };
    Ok(backend)
}

/// Human-readable list of the known backend presets
pub fn list_backends() -> String {
    [
        "mistral    OpenAI-compatible, https://api.mistral.ai/v1 (MISTRAL_API_KEY)",
        "ollama     OpenAI-compatible, http://localhost:11434/v1",
        "lm-studio  OpenAI-compatible, http://localhost:1234/v1",
        "command    Subprocess wrapper, set model.command (no tool support)",
    ]
    .join("\n")
}
