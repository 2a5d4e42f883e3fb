//! LLM backend trait for abstracting different providers
//!
//! One polymorphic capability covers both HTTP (OpenAI-compatible) and
//! subprocess-wrapped backends; the variant is selected by configuration.

use async_trait::async_trait;

use crate::core::{Message, Result, TokenUsage, ToolCall, ToolDefinition};

/// Why the backend stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// The model wants tool results before continuing
    ToolCalls,
    /// Output token limit reached
    Length,
    /// Anything the wire format didn't map cleanly
    Unknown,
}

impl FinishReason {
    /// Map a wire-format finish reason string
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" => Self::Stop,
            "tool_calls" | "tool_use" => Self::ToolCalls,
            "length" | "max_tokens" => Self::Length,
            _ => Self::Unknown,
        }
    }

    /// Whether this reason ends the agent's tool-calling loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Response from an LLM backend
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the response
    pub content: String,
    /// Any tool calls the model wants to make
    pub tool_calls: Vec<ToolCall>,
    /// Why generation stopped
    pub finish_reason: FinishReason,
    /// Token usage for this call
    pub usage: TokenUsage,
}

/// Trait for LLM backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response from a transcript, optionally offering tools
    ///
    /// Backend failures surface as `Err`; they never panic through the loop.
    async fn generate(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        max_output_tokens: u32,
    ) -> Result<LlmResponse>;

    /// Whether this backend understands tool schemas
    fn supports_tools(&self) -> bool;

    /// Get the backend name
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_wire("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_wire("weird"), FinishReason::Unknown);
        assert!(FinishReason::Stop.is_terminal());
        assert!(!FinishReason::ToolCalls.is_terminal());
    }
}
