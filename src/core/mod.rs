//! Core module - shared types, configuration, and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::{ContextConfig, LoopConfig, LoopLimits, ModelConfig};
pub use error::{LoopError, Result};
pub use types::{FunctionDefinition, Message, TokenUsage, ToolCall, ToolDefinition, ToolResult};
