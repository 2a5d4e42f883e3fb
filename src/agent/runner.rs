//! Generic tool-calling agent loop
//!
//! One runner serves both roles: the implementer and the reviewer are the
//! same bounded loop with different prompts, tools, and iteration budgets.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::{Message, Result, TokenUsage, ToolResult};
use crate::llm::LlmBackend;
use crate::tools::ToolRegistry;

/// Record of one tool call the agent made
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Outcome of one agent run
///
/// `tool_results` is index-aligned with `tool_calls_made`.
#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    pub content: String,
    pub tool_calls_made: Vec<ToolCallRecord>,
    pub tool_results: Vec<ToolResult>,
    pub usage: TokenUsage,
    pub iterations: u32,
}

/// Bounded tool-calling loop over an LLM backend and a tool registry
pub struct AgentRunner {
    llm: Arc<dyn LlmBackend>,
    tools: Arc<dyn ToolRegistry>,
    system_prompt: String,
    max_iterations: u32,
    max_output_tokens: u32,
    tool_timeout: Duration,
}

impl AgentRunner {
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        tools: Arc<dyn ToolRegistry>,
        system_prompt: impl Into<String>,
        max_iterations: u32,
        max_output_tokens: u32,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            tools,
            system_prompt: system_prompt.into(),
            max_iterations,
            max_output_tokens,
            tool_timeout,
        }
    }

    /// Run the loop on a single synthesized user turn
    ///
    /// Iteration exhaustion is not an error: the response carries whatever
    /// final content exists, possibly empty. Only backend failures return
    /// `Err`.
    pub async fn run(&self, user_content: &str) -> Result<AgentResponse> {
        let mut transcript = vec![
            Message::system(&self.system_prompt),
            Message::user(user_content),
        ];

        let schemas = if self.llm.supports_tools() {
            Some(self.tools.schemas())
        } else {
            None
        };

        let mut response = AgentResponse::default();

        for iteration in 0..self.max_iterations {
            response.iterations = iteration + 1;

            let generated = self
                .llm
                .generate(&transcript, schemas.as_deref(), self.max_output_tokens)
                .await?;

            response.usage += generated.usage;

            if generated.tool_calls.is_empty() {
                response.content = generated.content;
                break;
            }

            transcript.push(Message::assistant_with_tools(
                generated.content.clone(),
                generated.tool_calls.clone(),
            ));

            for call in &generated.tool_calls {
                // Malformed argument payloads degrade to an empty object;
                // a bad call must never abort the cycle.
                let arguments: serde_json::Value = serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|e| {
                        warn!(tool = %call.name, error = %e, "undecodable tool arguments");
                        serde_json::json!({})
                    });

                debug!(tool = %call.name, "executing tool");
                let result = self.execute_bounded(&call.name, &arguments).await;

                let turn_content = if result.success {
                    result.output.clone()
                } else {
                    format!("Error: {}", result.error)
                };
                transcript.push(Message::tool(&call.id, turn_content));

                response.tool_calls_made.push(ToolCallRecord {
                    name: call.name.clone(),
                    arguments,
                });
                response.tool_results.push(result);
            }

            if generated.finish_reason.is_terminal() {
                response.content = generated.content;
                break;
            }
        }

        Ok(response)
    }

    /// Execute one tool under a hard timeout
    ///
    /// On timeout, ask the registry whether the mutation landed anyway and
    /// fold the answer into the synthesized error so the agent doesn't
    /// blindly retry.
    async fn execute_bounded(&self, name: &str, arguments: &serde_json::Value) -> ToolResult {
        match tokio::time::timeout(self.tool_timeout, self.tools.execute(name, arguments)).await {
            Ok(result) => result,
            Err(_) => {
                let mut message = format!(
                    "Tool {} timed out after {} seconds.",
                    name,
                    self.tool_timeout.as_secs()
                );
                if let Some(note) = self.tools.verify_after_timeout(name, arguments).await {
                    message.push(' ');
                    message.push_str(&note);
                }
                ToolResult::failure(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::core::{ToolCall, ToolDefinition};
    use crate::llm::{FinishReason, LlmResponse};

    /// Backend that replays a script of responses
    struct ScriptedBackend {
        script: Mutex<Vec<LlmResponse>>,
    }

    impl ScriptedBackend {
        fn new(mut responses: Vec<LlmResponse>) -> Self {
            responses.reverse();
            Self {
                script: Mutex::new(responses),
            }
        }

        fn text(content: &str) -> LlmResponse {
            LlmResponse {
                content: content.to_string(),
                tool_calls: Vec::new(),
                finish_reason: FinishReason::Stop,
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            }
        }

        fn tool_call(name: &str, arguments: &str) -> LlmResponse {
            LlmResponse {
                content: String::new(),
                tool_calls: vec![ToolCall::new("call_1", name, arguments)],
                finish_reason: FinishReason::ToolCalls,
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            }
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
            _max_output_tokens: u32,
        ) -> Result<LlmResponse> {
            let mut script = self.script.lock().unwrap();
            Ok(script.pop().unwrap_or_else(|| ScriptedBackend::text("")))
        }

        fn supports_tools(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Registry that records calls and optionally stalls
    struct RecordingTools {
        calls: Mutex<Vec<(String, serde_json::Value)>>,
        stall: bool,
        verify_note: Option<String>,
    }

    impl RecordingTools {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                stall: false,
                verify_note: None,
            }
        }
    }

    #[async_trait]
    impl ToolRegistry for RecordingTools {
        fn schemas(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::function(
                "write_file",
                "test",
                serde_json::json!({"type": "object"}),
            )]
        }

        async fn execute(&self, name: &str, arguments: &serde_json::Value) -> ToolResult {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments.clone()));
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            ToolResult::success("ok")
        }

        async fn verify_after_timeout(
            &self,
            _name: &str,
            _arguments: &serde_json::Value,
        ) -> Option<String> {
            self.verify_note.clone()
        }
    }

    fn runner(backend: ScriptedBackend, tools: RecordingTools) -> AgentRunner {
        AgentRunner::new(
            Arc::new(backend),
            Arc::new(tools),
            "you are a test agent",
            5,
            4096,
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn test_plain_answer_stops_loop() {
        let backend = ScriptedBackend::new(vec![ScriptedBackend::text("done")]);
        let response = runner(backend, RecordingTools::new())
            .run("do something")
            .await
            .unwrap();

        assert_eq!(response.content, "done");
        assert_eq!(response.iterations, 1);
        assert!(response.tool_calls_made.is_empty());
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let backend = ScriptedBackend::new(vec![
            ScriptedBackend::tool_call("write_file", r#"{"path": "calc.py"}"#),
            ScriptedBackend::text("wrote the file"),
        ]);
        let response = runner(backend, RecordingTools::new())
            .run("write calc.py")
            .await
            .unwrap();

        assert_eq!(response.content, "wrote the file");
        assert_eq!(response.iterations, 2);
        assert_eq!(response.tool_calls_made.len(), 1);
        assert_eq!(response.tool_results.len(), 1);
        assert_eq!(response.tool_calls_made[0].name, "write_file");
        assert!(response.tool_results[0].success);
        assert_eq!(response.usage.total_tokens, 30);
    }

    #[tokio::test]
    async fn test_malformed_arguments_become_empty_object() {
        let backend = ScriptedBackend::new(vec![
            ScriptedBackend::tool_call("write_file", "{not json"),
            ScriptedBackend::text("ok"),
        ]);
        let response = runner(backend, RecordingTools::new())
            .run("go")
            .await
            .unwrap();

        assert_eq!(response.tool_calls_made[0].arguments, serde_json::json!({}));
        assert!(response.tool_results[0].success);
    }

    #[tokio::test]
    async fn test_exhaustion_is_not_an_error() {
        // Every response requests a tool, so the budget runs out
        let backend = ScriptedBackend::new(vec![
            ScriptedBackend::tool_call("write_file", "{}"),
            ScriptedBackend::tool_call("write_file", "{}"),
            ScriptedBackend::tool_call("write_file", "{}"),
            ScriptedBackend::tool_call("write_file", "{}"),
            ScriptedBackend::tool_call("write_file", "{}"),
        ]);
        let response = runner(backend, RecordingTools::new())
            .run("loop forever")
            .await
            .unwrap();

        assert_eq!(response.iterations, 5);
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls_made.len(), 5);
    }

    #[tokio::test]
    async fn test_terminal_finish_reason_with_tool_calls_stops() {
        let mut with_stop = ScriptedBackend::tool_call("write_file", "{}");
        with_stop.finish_reason = FinishReason::Stop;
        with_stop.content = "final words".to_string();

        let backend = ScriptedBackend::new(vec![with_stop]);
        let response = runner(backend, RecordingTools::new())
            .run("go")
            .await
            .unwrap();

        assert_eq!(response.iterations, 1);
        assert_eq!(response.content, "final words");
        assert_eq!(response.tool_calls_made.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_with_verification() {
        let backend = ScriptedBackend::new(vec![
            ScriptedBackend::tool_call("write_file", r#"{"path": "calc.py"}"#),
            ScriptedBackend::text("done"),
        ]);
        let mut tools = RecordingTools::new();
        tools.stall = true;
        tools.verify_note =
            Some("BUT verification check shows calc.py was updated successfully. Do not retry.".to_string());

        let response = runner(backend, tools).run("go").await.unwrap();

        let result = &response.tool_results[0];
        assert!(!result.success);
        assert!(result.error.contains("timed out"));
        assert!(result.error.contains("updated successfully"));
        assert!(result.error.contains("Do not retry"));
    }
}
