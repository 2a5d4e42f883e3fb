//! OpenAI-compatible backend
//!
//! Async HTTP client for `/chat/completions` endpoints. Covers the hosted
//! Mistral API as well as local Ollama and LM Studio servers, which all
//! speak the same wire format.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{LoopError, Message, ModelConfig, Result, TokenUsage, ToolCall, ToolDefinition};
use crate::llm::traits::{FinishReason, LlmBackend, LlmResponse};

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
    max_tokens: u32,
    stream: bool,
}

/// Wire message format
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Wire tool call format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".to_string()
}

/// Function within a wire tool call; arguments arrive as a JSON string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Wire tool schema wrapper
#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'a str,
    function: &'a crate::core::FunctionDefinition,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Error payload some servers return with a 200 status
#[derive(Debug, Deserialize)]
struct WireError {
    error: serde_json::Value,
}

impl OpenAiBackend {
    /// Create a client from the model configuration
    pub fn from_config(config: &ModelConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.resolved_base_url(),
            api_key: config.resolved_api_key(),
            model: config.name.clone(),
        }
    }

    fn to_wire(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.clone(),
                content: Some(m.content.clone()),
                tool_calls: m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|c| WireToolCall {
                            id: Some(c.id.clone()),
                            call_type: "function".to_string(),
                            function: WireFunction {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn generate(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        max_output_tokens: u32,
    ) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let wire_tools = tools.map(|defs| {
            defs.iter()
                .map(|d| WireTool {
                    tool_type: "function",
                    function: &d.function,
                })
                .collect::<Vec<_>>()
        });

        let request = ChatRequest {
            model: &self.model,
            messages: Self::to_wire(messages),
            tool_choice: wire_tools.as_ref().map(|_| "auto"),
            tools: wire_tools,
            max_tokens: max_output_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LoopError::backend(format!(
                        "Connection failed to {}. Is the backend service running?",
                        self.base_url
                    ))
                } else {
                    LoopError::Http(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LoopError::backend(format!(
                "{} returned {}: {}",
                self.base_url, status, body
            )));
        }

        // Some servers report errors in-band with a 200 status
        if let Ok(err) = serde_json::from_str::<WireError>(&body) {
            return Err(LoopError::backend(err.error.to_string()));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LoopError::backend(format!("Unparseable response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LoopError::backend("Response contained no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                ToolCall::new(
                    c.id.unwrap_or_else(|| format!("call_{}", i)),
                    c.function.name,
                    c.function.arguments,
                )
            })
            .collect::<Vec<_>>();

        let finish_reason = match choice.finish_reason.as_deref() {
            Some(reason) => FinishReason::from_wire(reason),
            None if tool_calls.is_empty() => FinishReason::Stop,
            None => FinishReason::ToolCalls,
        };

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason,
            usage,
        })
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_response_parsing() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "write_file", "arguments": "{\"path\": \"a.py\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;

        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let choice = &parsed.choices[0];
        let calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "write_file");
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_wire_request_shape() {
        let messages = vec![Message::system("s"), Message::user("u")];
        let wire = OpenAiBackend::to_wire(&messages);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "system");
        assert!(wire[0].tool_calls.is_none());
    }
}
