//! Per-persona memory persistence
//!
//! Memories are markdown files under the workspace `memories/` folder so
//! agents can explicitly read and append notes that survive fresh contexts.
//! Entries are timestamped and append-only; the store never truncates or
//! rewrites a memory file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::{LoopError, Result};

/// Canonical personas with a memory file
const PERSONA_FILES: &[(&str, &str)] = &[
    ("implementer", "implementer_memories.md"),
    ("reviewer", "reviewer_memories.md"),
    ("testing", "testing_reviewer_memories.md"),
];

/// Store for role-scoped agent memories inside one workspace
#[derive(Debug, Clone)]
pub struct MemoryStore {
    workspace: PathBuf,
}

impl MemoryStore {
    /// Create a store rooted at the given workspace
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    /// Normalize a free-form persona name to a canonical one
    ///
    /// Substring rules: anything containing "test" maps to the testing
    /// persona, anything containing "review" to the reviewer, everything
    /// else to the implementer.
    pub fn normalize_persona(persona: &str) -> &'static str {
        let key = persona.trim().to_lowercase().replace(' ', "_");

        for (name, _) in PERSONA_FILES {
            if key == *name {
                return *name;
            }
        }
        if key.contains("test") {
            return "testing";
        }
        if key.contains("review") {
            return "reviewer";
        }
        "implementer"
    }

    /// Path to the memory file for a persona
    pub fn path_for(&self, persona: &str, ensure_dir: bool) -> Result<PathBuf> {
        let normalized = Self::normalize_persona(persona);
        let filename = PERSONA_FILES
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, file)| *file)
            .unwrap_or("implementer_memories.md");

        let memory_dir = self.workspace.join("memories");
        if ensure_dir {
            fs::create_dir_all(&memory_dir)?;
            self.ensure_gitignore();
        }

        Ok(memory_dir.join(filename))
    }

    /// Read the saved memory for a persona; empty string if absent
    pub fn read(&self, persona: &str) -> String {
        match self.path_for(persona, false) {
            Ok(path) if path.exists() => fs::read_to_string(&path).unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Append a timestamped entry and return the file path
    ///
    /// Fails on empty or whitespace-only content.
    pub fn append(&self, persona: &str, content: &str) -> Result<PathBuf> {
        if content.trim().is_empty() {
            return Err(LoopError::Memory(
                "Memory content cannot be empty".to_string(),
            ));
        }

        let path = self.path_for(persona, true)?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!("## {}\n{}\n\n", timestamp, content.trim());

        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(entry.as_bytes())?;

        Ok(path)
    }

    /// Get the workspace root
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Keep memory files out of version control; best-effort only
    fn ensure_gitignore(&self) {
        let gitignore = self.workspace.join(".gitignore");
        let entry = "memories/";

        let mut lines: Vec<String> = match fs::read_to_string(&gitignore) {
            Ok(content) => {
                if content.lines().any(|line| line.trim() == entry) {
                    return;
                }
                content.lines().map(String::from).collect()
            }
            Err(_) => Vec::new(),
        };

        lines.push(entry.to_string());
        let _ = fs::write(&gitignore, lines.join("\n") + "\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_persona_normalization() {
        assert_eq!(MemoryStore::normalize_persona("implementer"), "implementer");
        assert_eq!(MemoryStore::normalize_persona("Reviewer"), "reviewer");
        assert_eq!(MemoryStore::normalize_persona("testing reviewer"), "testing");
        assert_eq!(MemoryStore::normalize_persona("code-reviewer"), "reviewer");
        assert_eq!(MemoryStore::normalize_persona("tester"), "testing");
        assert_eq!(MemoryStore::normalize_persona("anything else"), "implementer");
    }

    #[test]
    fn test_read_before_append_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());
        assert_eq!(store.read("implementer"), "");
    }

    #[test]
    fn test_append_order_preserved() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());

        store.append("implementer", "first lesson").unwrap();
        store.append("implementer", "second lesson").unwrap();

        let content = store.read("implementer");
        let first = content.find("first lesson").unwrap();
        let second = content.find("second lesson").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_append_rejected() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());
        assert!(store.append("implementer", "   \n").is_err());
    }

    #[test]
    fn test_personas_use_separate_files() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());

        store.append("implementer", "impl note").unwrap();
        store.append("reviewer", "review note").unwrap();

        assert!(!store.read("implementer").contains("review note"));
        assert!(store.read("reviewer").contains("review note"));
    }

    #[test]
    fn test_gitignore_bookkeeping() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());
        store.append("implementer", "note").unwrap();

        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.lines().any(|l| l.trim() == "memories/"));

        // Appending again must not duplicate the entry
        store.append("implementer", "another").unwrap();
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(
            gitignore.lines().filter(|l| l.trim() == "memories/").count(),
            1
        );
    }
}
