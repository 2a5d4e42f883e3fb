//! Workspace file tools
//!
//! The concrete registry both agents use. The implementer gets the full
//! set; the reviewer gets a read-only variant, which is how the read-only
//! contract of the review role is enforced.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::{ToolDefinition, ToolResult};
use crate::memory::MemoryStore;
use crate::tools::ToolRegistry;

/// File and memory tools scoped to one workspace
pub struct WorkspaceTools {
    workspace: PathBuf,
    memory: MemoryStore,
    read_only: bool,
}

impl WorkspaceTools {
    /// Full registry for the implementer
    pub fn full(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            memory: MemoryStore::new(&workspace),
            workspace,
            read_only: false,
        }
    }

    /// Read-only registry for the reviewer
    pub fn read_only(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            memory: MemoryStore::new(&workspace),
            workspace,
            read_only: true,
        }
    }

    /// Resolve a tool-supplied relative path, rejecting escapes
    fn resolve(&self, rel: &str) -> Result<PathBuf, String> {
        let rel_path = Path::new(rel);
        if rel_path.is_absolute()
            || rel_path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(format!("Path {} escapes the workspace", rel));
        }
        Ok(self.workspace.join(rel_path))
    }

    fn str_arg<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a str> {
        args.get(key).and_then(|v| v.as_str())
    }

    fn write_file(&self, args: &serde_json::Value) -> ToolResult {
        let Some(rel) = Self::str_arg(args, "path") else {
            return ToolResult::failure("write_file requires a 'path' argument");
        };
        let content = Self::str_arg(args, "content").unwrap_or_default();

        let path = match self.resolve(rel) {
            Ok(p) => p,
            Err(e) => return ToolResult::failure(e),
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return ToolResult::failure(format!("Failed to create {}: {}", parent.display(), e));
            }
        }

        match fs::write(&path, content) {
            Ok(()) => ToolResult::success(format!("Wrote {} bytes to {}", content.len(), rel)),
            Err(e) => ToolResult::failure(format!("Failed to write {}: {}", rel, e)),
        }
    }

    fn read_file(&self, args: &serde_json::Value) -> ToolResult {
        let Some(rel) = Self::str_arg(args, "path") else {
            return ToolResult::failure("read_file requires a 'path' argument");
        };
        let path = match self.resolve(rel) {
            Ok(p) => p,
            Err(e) => return ToolResult::failure(e),
        };

        match fs::read_to_string(&path) {
            Ok(content) => ToolResult::success(content),
            Err(e) => ToolResult::failure(format!("Failed to read {}: {}", rel, e)),
        }
    }

    fn list_files(&self, args: &serde_json::Value) -> ToolResult {
        let rel = Self::str_arg(args, "path").unwrap_or(".");
        let path = match self.resolve(rel) {
            Ok(p) => p,
            Err(e) => return ToolResult::failure(e),
        };

        let entries = match fs::read_dir(&path) {
            Ok(read) => read,
            Err(e) => return ToolResult::failure(format!("Failed to list {}: {}", rel, e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| {
                let suffix = if e.path().is_dir() { "/" } else { "" };
                format!("{}{}", e.file_name().to_string_lossy(), suffix)
            })
            .collect();
        names.sort();

        if names.is_empty() {
            ToolResult::success("(empty directory)")
        } else {
            ToolResult::success(names.join("\n"))
        }
    }

    fn delete_file(&self, args: &serde_json::Value) -> ToolResult {
        let Some(rel) = Self::str_arg(args, "path") else {
            return ToolResult::failure("delete_file requires a 'path' argument");
        };
        let path = match self.resolve(rel) {
            Ok(p) => p,
            Err(e) => return ToolResult::failure(e),
        };

        match fs::remove_file(&path) {
            Ok(()) => ToolResult::success(format!("Deleted {}", rel)),
            Err(e) => ToolResult::failure(format!("Failed to delete {}: {}", rel, e)),
        }
    }

    fn memory_read(&self, args: &serde_json::Value) -> ToolResult {
        let persona = Self::str_arg(args, "agent").unwrap_or("implementer");
        let content = self.memory.read(persona);
        if content.is_empty() {
            ToolResult::success("(no memories saved yet)")
        } else {
            ToolResult::success(content)
        }
    }

    fn memory_append(&self, args: &serde_json::Value) -> ToolResult {
        let persona = Self::str_arg(args, "agent").unwrap_or("implementer");
        let Some(content) = Self::str_arg(args, "content") else {
            return ToolResult::failure("memory_append requires a 'content' argument");
        };

        match self.memory.append(persona, content) {
            Ok(path) => ToolResult::success(format!(
                "Memory saved to {}",
                path.strip_prefix(&self.workspace)
                    .unwrap_or(&path)
                    .display()
            )),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

#[async_trait]
impl ToolRegistry for WorkspaceTools {
    fn schemas(&self) -> Vec<ToolDefinition> {
        let mut defs = vec![
            ToolDefinition::function(
                "read_file",
                "Read the contents of a file in the workspace",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path relative to the workspace root"}
                    },
                    "required": ["path"]
                }),
            ),
            ToolDefinition::function(
                "list_files",
                "List files in a workspace directory",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Directory relative to the workspace root (default: '.')"}
                    }
                }),
            ),
            ToolDefinition::function(
                "memory_read",
                "Read persistent notes for an agent persona",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "agent": {"type": "string", "description": "Persona: implementer, reviewer, or testing"}
                    }
                }),
            ),
            ToolDefinition::function(
                "memory_append",
                "Append a persistent note for an agent persona",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "agent": {"type": "string", "description": "Persona: implementer, reviewer, or testing"},
                        "content": {"type": "string", "description": "The note to save"}
                    },
                    "required": ["content"]
                }),
            ),
        ];

        if !self.read_only {
            defs.push(ToolDefinition::function(
                "write_file",
                "Create or overwrite a file in the workspace",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path relative to the workspace root"},
                        "content": {"type": "string", "description": "Full file contents"}
                    },
                    "required": ["path", "content"]
                }),
            ));
            defs.push(ToolDefinition::function(
                "delete_file",
                "Delete a file in the workspace",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path relative to the workspace root"}
                    },
                    "required": ["path"]
                }),
            ));
        }

        defs
    }

    async fn execute(&self, name: &str, arguments: &serde_json::Value) -> ToolResult {
        if self.read_only && matches!(name, "write_file" | "delete_file") {
            return ToolResult::failure(format!("Tool {} is not available in review mode", name));
        }

        match name {
            "write_file" => self.write_file(arguments),
            "read_file" => self.read_file(arguments),
            "list_files" => self.list_files(arguments),
            "delete_file" => self.delete_file(arguments),
            "memory_read" => self.memory_read(arguments),
            "memory_append" => self.memory_append(arguments),
            _ => ToolResult::failure(format!("Tool {} not found", name)),
        }
    }

    async fn verify_after_timeout(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Option<String> {
        // Only writes can leave the workspace changed despite a timeout
        if name != "write_file" {
            return None;
        }
        let rel = Self::str_arg(arguments, "path")?;
        let path = self.resolve(rel).ok()?;

        let non_empty = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        if non_empty {
            Some(format!(
                "BUT verification check shows {} was updated successfully. Do not retry.",
                rel
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let tools = WorkspaceTools::full(dir.path());

        let args = serde_json::json!({"path": "calc.py", "content": "def add(a, b): return a + b"});
        let result = tools.execute("write_file", &args).await;
        assert!(result.success, "{}", result.error);

        let read = tools
            .execute("read_file", &serde_json::json!({"path": "calc.py"}))
            .await;
        assert!(read.success);
        assert!(read.output.contains("def add"));
    }

    #[tokio::test]
    async fn test_read_only_refuses_mutation() {
        let dir = TempDir::new().unwrap();
        let tools = WorkspaceTools::read_only(dir.path());

        let args = serde_json::json!({"path": "x.py", "content": "x = 1"});
        let result = tools.execute("write_file", &args).await;
        assert!(!result.success);
        assert!(result.error.contains("review mode"));

        let schemas = tools.schemas();
        assert!(!schemas.iter().any(|d| d.function.name == "write_file"));
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let dir = TempDir::new().unwrap();
        let tools = WorkspaceTools::full(dir.path());

        let args = serde_json::json!({"path": "../outside.py", "content": "x"});
        let result = tools.execute("write_file", &args).await;
        assert!(!result.success);
        assert!(result.error.contains("escapes"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dir = TempDir::new().unwrap();
        let tools = WorkspaceTools::full(dir.path());
        let result = tools.execute("run_notebook", &serde_json::json!({})).await;
        assert!(!result.success);
        assert!(result.error.contains("not found"));
    }

    #[tokio::test]
    async fn test_timeout_verification_annotation() {
        let dir = TempDir::new().unwrap();
        let tools = WorkspaceTools::full(dir.path());

        // Pretend the write timed out but actually landed
        std::fs::write(dir.path().join("calc.py"), "def add(): pass").unwrap();

        let args = serde_json::json!({"path": "calc.py", "content": "..."});
        let note = tools.verify_after_timeout("write_file", &args).await;
        let note = note.expect("existing non-empty file should verify");
        assert!(note.contains("Do not retry"));

        // An absent file must not verify
        let args = serde_json::json!({"path": "missing.py", "content": "..."});
        assert!(tools.verify_after_timeout("write_file", &args).await.is_none());

        // Non-mutating tools never verify
        let args = serde_json::json!({"path": "calc.py"});
        assert!(tools.verify_after_timeout("read_file", &args).await.is_none());
    }

    #[tokio::test]
    async fn test_memory_tools_roundtrip() {
        let dir = TempDir::new().unwrap();
        let tools = WorkspaceTools::full(dir.path());

        let empty = tools.execute("memory_read", &serde_json::json!({"agent": "implementer"})).await;
        assert!(empty.output.contains("no memories"));

        let append = tools
            .execute(
                "memory_append",
                &serde_json::json!({"agent": "implementer", "content": "prefer small commits"}),
            )
            .await;
        assert!(append.success);

        let read = tools.execute("memory_read", &serde_json::json!({"agent": "implementer"})).await;
        assert!(read.output.contains("prefer small commits"));
    }
}
