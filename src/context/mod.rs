//! Role-specific context assembly
//!
//! Builds the textual context each agent receives: file tree, source file
//! excerpts, git log, test output, and persisted memory. The reviewer
//! variant enforces the air gap: no prose authored by the implementer ever
//! reaches the reviewer, only code, configuration, the original spec file,
//! and factual test-execution evidence.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::core::ContextConfig;
use crate::memory::MemoryStore;

/// Extensions for code files the reviewer is allowed to see
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "go", "rs", "c", "cpp", "h", "hpp", "rb", "php",
    "swift", "kt", "scala", "sh", "bash", "zsh", "sql", "graphql", "proto",
];

/// Config/data files that are also relevant to review
const CONFIG_EXTENSIONS: &[&str] = &[
    "yaml", "yml", "json", "toml", "ini", "cfg", "html", "css", "scss", "less", "xml",
];

/// Extensions blocked from the reviewer (implementer prose/summaries)
const BLOCKED_EXTENSIONS: &[&str] = &["md", "txt", "doc", "docx", "rtf"];

/// Default ignore set applied to every path segment
const IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    ".env",
    ".idea",
    ".vscode",
    "*.pyc",
    "*.pyo",
    ".DS_Store",
    "*.egg-info",
    "dist",
    "build",
    ".pytest_cache",
    ".mypy_cache",
    "target",
    "memories",
];

/// Ordered test-runner invocations tried across common ecosystems
const TEST_COMMANDS: &[(&[&str], &str)] = &[
    (&["python", "-m", "pytest", "-v", "--tb=short"], "pytest"),
    (&["python", "-m", "unittest", "discover", "-v"], "unittest"),
    (&["npm", "test"], "npm test"),
    (&["go", "test", "./..."], "go test"),
    (&["cargo", "test"], "cargo test"),
];

/// Builds role-specific context for the agents
pub struct ContextBuilder {
    workspace: PathBuf,
    spec_file_name: String,
    max_tree_depth: usize,
    git_log_count: usize,
    test_timeout: Duration,
    memory: MemoryStore,
}

impl ContextBuilder {
    /// Create a builder for a workspace
    pub fn new(workspace: impl Into<PathBuf>, config: &ContextConfig, test_timeout: Duration) -> Self {
        let workspace = workspace.into();
        Self {
            memory: MemoryStore::new(&workspace),
            workspace,
            spec_file_name: config.spec_file_name.clone(),
            max_tree_depth: config.max_tree_depth,
            git_log_count: config.git_log_count,
            test_timeout,
        }
    }

    /// Build the full context for the implementer
    ///
    /// File tree plus the full readable text of all recognized files (or
    /// the given focus subset) plus the implementer's own memory.
    pub fn build_implementer_context(&self, focus_files: Option<&[String]>) -> String {
        let tree = self.build_file_tree();

        let files = match focus_files {
            Some(focus) => self.read_focus_files(focus),
            None => self.read_all_source_files(),
        };

        let memories = self.memory_section("implementer");

        format!(
            "### File Tree\n```\n{}\n```\n\n### Source Files\n{}\n{}",
            tree, files, memories
        )
    }

    /// Build the air-gapped context for the reviewer
    ///
    /// Code and config files only, the original spec regardless of
    /// extension, git log, and live test output. Markdown/text authored
    /// during development never appears here.
    pub async fn build_reviewer_context(&self, run_tests: bool, memory_persona: Option<&str>) -> String {
        let tree = self.build_file_tree();
        let files = self.read_code_only_files();
        let git_log = self.git_log().await;
        let memories = memory_persona
            .map(|p| self.memory_section(p))
            .unwrap_or_default();

        let mut context = format!(
            "### File Tree\n```\n{}\n```\n\n\
             ### Source Files (CODE ONLY - No Implementer Documentation)\n{}\n\n\
             ### Git Log (Verify claims in actual code, not commit messages)\n```\n{}\n```\n{}",
            tree, files, git_log, memories
        );

        if run_tests {
            let test_results = self.run_tests().await;
            context.push_str(&format!(
                "\n### Test Execution Results (FACTUAL - Use to verify completeness)\n{}\n",
                test_results
            ));
        }

        context
    }

    /// Render the workspace file tree, depth-bounded and filtered
    pub fn build_file_tree(&self) -> String {
        let mut lines = Vec::new();
        self.walk_tree(&self.workspace, &mut lines, "", self.max_tree_depth);
        lines.join("\n")
    }

    fn walk_tree(&self, path: &Path, lines: &mut Vec<String>, prefix: &str, depth: usize) {
        if depth == 0 {
            return;
        }

        let mut entries: Vec<_> = match fs::read_dir(path) {
            Ok(read) => read.filter_map(|e| e.ok()).collect(),
            Err(_) => return,
        };

        // Directories first, then case-insensitive by name
        entries.sort_by_key(|e| {
            let is_dir = e.path().is_dir();
            (!is_dir, e.file_name().to_string_lossy().to_lowercase())
        });

        let filtered: Vec<_> = entries
            .into_iter()
            .filter(|e| !self.should_ignore(&e.file_name().to_string_lossy()))
            .collect();

        let count = filtered.len();
        for (i, entry) in filtered.into_iter().enumerate() {
            let is_last = i == count - 1;
            let connector = if is_last { "└── " } else { "├── " };
            lines.push(format!(
                "{}{}{}",
                prefix,
                connector,
                entry.file_name().to_string_lossy()
            ));

            if entry.path().is_dir() {
                let extension = if is_last { "    " } else { "│   " };
                self.walk_tree(&entry.path(), lines, &format!("{}{}", prefix, extension), depth - 1);
            }
        }
    }

    /// Check one path segment against the ignore patterns
    ///
    /// Exact name match, or `*.suffix` wildcard match.
    fn should_ignore(&self, name: &str) -> bool {
        IGNORE_PATTERNS.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*') {
                name.ends_with(suffix)
            } else {
                name == *pattern
            }
        })
    }

    /// Check every segment from the workspace root to the candidate
    fn is_ignored_path(&self, path: &Path) -> bool {
        path.strip_prefix(&self.workspace)
            .map(|rel| {
                rel.components()
                    .any(|c| self.should_ignore(&c.as_os_str().to_string_lossy()))
            })
            .unwrap_or(false)
    }

    /// Collect workspace files recursively, sorted for determinism
    fn collect_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        self.collect_into(&self.workspace, &mut files);
        files.sort();
        files
    }

    fn collect_into(&self, dir: &Path, out: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(_) => return,
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if self.should_ignore(&entry.file_name().to_string_lossy()) {
                continue;
            }
            if path.is_dir() {
                self.collect_into(&path, out);
            } else {
                out.push(path);
            }
        }
    }

    fn extension_of(path: &Path) -> String {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    fn render_file(&self, path: &Path, tag: &str) -> Option<String> {
        let rel = path.strip_prefix(&self.workspace).ok()?;
        let content = fs::read_to_string(path).ok()?;
        Some(format!("### {}{}\n```\n{}\n```\n", rel.display(), tag, content))
    }

    /// Whether this path is the original specification file
    fn is_spec_file(&self, path: &Path) -> bool {
        let spec = self.spec_file_name.to_lowercase();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name == spec {
            return true;
        }
        path.strip_prefix(&self.workspace)
            .map(|rel| rel.to_string_lossy().to_lowercase() == spec)
            .unwrap_or(false)
    }

    /// Read all recognized source/config/doc files (implementer view)
    fn read_all_source_files(&self) -> String {
        let mut contents = Vec::new();

        for path in self.collect_files() {
            if self.is_ignored_path(&path) {
                continue;
            }
            let ext = Self::extension_of(&path);
            let recognized = CODE_EXTENSIONS.contains(&ext.as_str())
                || CONFIG_EXTENSIONS.contains(&ext.as_str())
                || BLOCKED_EXTENSIONS.contains(&ext.as_str());
            if !recognized {
                continue;
            }
            if let Some(rendered) = self.render_file(&path, "") {
                contents.push(rendered);
            }
        }

        contents.join("\n")
    }

    /// Read an explicit focus subset (implementer view)
    fn read_focus_files(&self, focus: &[String]) -> String {
        let mut contents = Vec::new();
        for rel in focus {
            let path = self.workspace.join(rel);
            if path.is_file() {
                if let Some(rendered) = self.render_file(&path, "") {
                    contents.push(rendered);
                }
            }
        }
        contents.join("\n")
    }

    /// Read ONLY code/config files for review (the air gap)
    ///
    /// The original spec file is always included regardless of extension;
    /// blocked doc extensions are excluded unconditionally otherwise.
    fn read_code_only_files(&self) -> String {
        let mut contents = Vec::new();

        for path in self.collect_files() {
            if self.is_ignored_path(&path) {
                continue;
            }

            if self.is_spec_file(&path) {
                if let Some(rendered) = self.render_file(&path, " [ORIGINAL SPEC]") {
                    contents.push(rendered);
                }
                continue;
            }

            let ext = Self::extension_of(&path);
            if BLOCKED_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            if CODE_EXTENSIONS.contains(&ext.as_str()) || CONFIG_EXTENSIONS.contains(&ext.as_str()) {
                if let Some(rendered) = self.render_file(&path, "") {
                    contents.push(rendered);
                }
            }
        }

        contents.join("\n")
    }

    fn memory_section(&self, persona: &str) -> String {
        let content = self.memory.read(persona);
        if content.trim().is_empty() {
            return String::new();
        }

        let path = match self.memory.path_for(persona, false) {
            Ok(p) => p
                .strip_prefix(&self.workspace)
                .map(|r| r.display().to_string())
                .unwrap_or_else(|_| p.display().to_string()),
            Err(_) => return String::new(),
        };

        format!(
            "### Persistent Memory ({})\nPath: {}\n```\n{}\n```\n",
            MemoryStore::normalize_persona(persona),
            path,
            content
        )
    }

    /// Run tests and capture output for review
    ///
    /// Tries each known test runner in order, accepting the first whose
    /// output is non-empty and not a tool-unavailable signal. Falls back to
    /// directly executing up to three discovered test files.
    pub async fn run_tests(&self) -> String {
        let mut results = Vec::new();

        for (cmd, name) in TEST_COMMANDS {
            match self.run_captured(cmd).await {
                CommandOutcome::Completed { output, success } => {
                    if output.contains("No module named") || output.contains("command not found") {
                        continue;
                    }
                    if output.trim().is_empty() {
                        continue;
                    }
                    let status = if success { "PASSED" } else { "FAILED" };
                    results.push(format!(
                        "### Test Results ({}) - {}\n```\n{}\n```\n",
                        name, status, output
                    ));
                    if success || output.to_lowercase().contains("test") {
                        break;
                    }
                }
                CommandOutcome::TimedOut => {
                    results.push(format!(
                        "### Test Results ({}) - TIMEOUT\nTests exceeded {}s timeout\n",
                        name,
                        self.test_timeout.as_secs()
                    ));
                    break;
                }
                CommandOutcome::Unavailable => continue,
            }
        }

        if results.is_empty() {
            results = self.run_discovered_test_files().await;
        }

        if results.is_empty() {
            "No tests found or executed.".to_string()
        } else {
            results.join("\n")
        }
    }

    async fn run_discovered_test_files(&self) -> Vec<String> {
        let test_files: Vec<PathBuf> = self
            .collect_files()
            .into_iter()
            .filter(|p| {
                let name = p
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                name.starts_with("test_") && name.ends_with(".py")
                    || name.ends_with("_test.py")
            })
            .take(3)
            .collect();

        let mut results = Vec::new();
        for file in test_files {
            let file_str = file.to_string_lossy().to_string();
            let cmd = ["python", file_str.as_str()];
            if let CommandOutcome::Completed { output, success } = self.run_captured(&cmd).await {
                if output.trim().is_empty() {
                    continue;
                }
                let rel = file
                    .strip_prefix(&self.workspace)
                    .unwrap_or(&file)
                    .display()
                    .to_string();
                let status = if success { "PASSED" } else { "FAILED" };
                results.push(format!(
                    "### Test Results ({}) - {}\n```\n{}\n```\n",
                    rel, status, output
                ));
            }
        }
        results
    }

    async fn run_captured(&self, cmd: &[&str]) -> CommandOutcome {
        let mut command = Command::new(cmd[0]);
        command.args(&cmd[1..]).current_dir(&self.workspace);

        let future = command.output();
        match tokio::time::timeout(self.test_timeout, future).await {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                CommandOutcome::Completed {
                    output: text,
                    success: output.status.success(),
                }
            }
            Ok(Err(e)) => {
                debug!(command = cmd[0], error = %e, "test command unavailable");
                CommandOutcome::Unavailable
            }
            Err(_) => CommandOutcome::TimedOut,
        }
    }

    /// Recent commit log; placeholder strings on absence
    pub async fn git_log(&self) -> String {
        let output = Command::new("git")
            .args(["log", &format!("-n{}", self.git_log_count), "--pretty=format:%h %s (%cr)"])
            .current_dir(&self.workspace)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).to_string(),
            Ok(_) => "No git history".to_string(),
            Err(_) => "Git not available".to_string(),
        }
    }

    /// The most recent commit with its body; empty string on absence
    pub async fn last_commit(&self) -> String {
        let output = Command::new("git")
            .args(["log", "-1", "--pretty=format:%h %s\n\n%b"])
            .current_dir(&self.workspace)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                String::from_utf8_lossy(&out.stdout).trim().to_string()
            }
            _ => String::new(),
        }
    }
}

enum CommandOutcome {
    Completed { output: String, success: bool },
    TimedOut,
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn builder(dir: &TempDir) -> ContextBuilder {
        ContextBuilder::new(
            dir.path(),
            &ContextConfig::default(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_ignore_patterns() {
        let dir = TempDir::new().unwrap();
        let ctx = builder(&dir);
        assert!(ctx.should_ignore(".git"));
        assert!(ctx.should_ignore("cache.pyc"));
        assert!(ctx.should_ignore("node_modules"));
        assert!(!ctx.should_ignore("main.py"));
    }

    #[test]
    fn test_ignore_applies_to_parent_segments() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(dir.path().join("app.py"), "print()").unwrap();

        let ctx = builder(&dir);
        let files = ctx.read_all_source_files();
        assert!(files.contains("app.py"));
        assert!(!files.contains("index.js"));
    }

    #[test]
    fn test_air_gap_blocks_implementer_prose() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("idea.md"), "Build a CLI calculator.").unwrap();
        std::fs::write(dir.path().join("notes.md"), "I totally finished everything").unwrap();
        std::fs::write(dir.path().join("app.py"), "def add(a, b): return a + b").unwrap();

        let ctx = builder(&dir);

        let reviewer = ctx.read_code_only_files();
        assert!(reviewer.contains("Build a CLI calculator."));
        assert!(reviewer.contains("idea.md [ORIGINAL SPEC]"));
        assert!(reviewer.contains("def add"));
        assert!(!reviewer.contains("notes.md"));
        assert!(!reviewer.contains("totally finished"));

        let implementer = ctx.build_implementer_context(None);
        assert!(implementer.contains("notes.md"));
        assert!(implementer.contains("idea.md"));
        assert!(implementer.contains("app.py"));
    }

    #[test]
    fn test_file_tree_rendering() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.py"), "").unwrap();
        std::fs::write(dir.path().join("idea.md"), "").unwrap();

        let tree = builder(&dir).build_file_tree();
        assert!(tree.contains("src"));
        assert!(tree.contains("main.py"));
        assert!(tree.contains("idea.md"));
    }

    #[test]
    fn test_focus_files_subset() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), "a = 1").unwrap();
        std::fs::write(dir.path().join("b.py"), "b = 2").unwrap();

        let ctx = builder(&dir);
        let focused = ctx.build_implementer_context(Some(&["a.py".to_string()]));
        assert!(focused.contains("a = 1"));
        assert!(!focused.contains("b = 2"));
    }

    #[tokio::test]
    async fn test_git_log_placeholder_without_repo() {
        let dir = TempDir::new().unwrap();
        let log = builder(&dir).git_log().await;
        assert!(log == "No git history" || log == "Git not available");
    }
}
