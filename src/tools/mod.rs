//! Tool registry - schemas and dispatch for agent tool calls

pub mod workspace;

use async_trait::async_trait;

use crate::core::{ToolDefinition, ToolResult};

pub use workspace::WorkspaceTools;

/// Registry of tools offered to an agent
///
/// The agent runner only depends on this trait; which tools a role gets is
/// decided where the registry is constructed.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Tool schema descriptors to hand to the LLM
    fn schemas(&self) -> Vec<ToolDefinition>;

    /// Execute a named tool with decoded arguments
    async fn execute(&self, name: &str, arguments: &serde_json::Value) -> ToolResult;

    /// After a tool call timed out, check whether its mutation landed anyway
    ///
    /// Returns an annotation to append to the timeout message when the
    /// read-back shows the mutation succeeded. Best-effort; `None` means
    /// nothing could be verified.
    async fn verify_after_timeout(
        &self,
        _name: &str,
        _arguments: &serde_json::Value,
    ) -> Option<String> {
        None
    }
}
