//! Subprocess-wrapped backend
//!
//! Wraps an external CLI tool (e.g. `ollama run <model>`) as an LLM
//! backend. The transcript is flattened to plain text on stdin and stdout
//! becomes the response. No tool-schema support; the agent runner falls
//! back to prompt-only operation when `supports_tools` is false.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::{LoopError, Message, ModelConfig, Result, TokenUsage, ToolDefinition};
use crate::llm::traits::{FinishReason, LlmBackend, LlmResponse};

/// Backend that shells out to a configured command
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    /// Create a backend from the model configuration
    ///
    /// `config.command` is split on whitespace; `{model}` expands to the
    /// configured model name.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let command = config
            .command
            .as_deref()
            .ok_or_else(|| LoopError::config("backend = \"command\" requires model.command"))?;

        let mut parts = command
            .split_whitespace()
            .map(|p| p.replace("{model}", &config.name));

        let program = parts
            .next()
            .ok_or_else(|| LoopError::config("model.command is empty"))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn flatten_transcript(messages: &[Message]) -> String {
        let mut prompt = String::new();
        for message in messages {
            prompt.push_str(&format!(
                "[{}]\n{}\n\n",
                message.role.to_uppercase(),
                message.content
            ));
        }
        prompt.push_str("[ASSISTANT]\n");
        prompt
    }
}

#[async_trait]
impl LlmBackend for CommandBackend {
    async fn generate(
        &self,
        messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
        _max_output_tokens: u32,
    ) -> Result<LlmResponse> {
        let prompt = Self::flatten_transcript(messages);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LoopError::backend(format!("Failed to spawn {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| LoopError::backend(format!("Failed to write prompt: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LoopError::backend(format!("{} failed: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LoopError::backend(format!(
                "{} exited with {}: {}",
                self.program, output.status, stderr
            )));
        }

        let content = String::from_utf8_lossy(&output.stdout).trim().to_string();

        // The CLI reports no token counts; estimate at ~4 chars per token
        // so the loop's accounting stays roughly meaningful.
        let estimate = |text: &str| (text.len() / 4) as u32;
        let usage = TokenUsage {
            prompt_tokens: estimate(&prompt),
            completion_tokens: estimate(&content),
            total_tokens: estimate(&prompt) + estimate(&content),
        };

        Ok(LlmResponse {
            content,
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage,
        })
    }

    fn supports_tools(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "command"
    }
}
