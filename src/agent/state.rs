//! Persisted loop state
//!
//! One JSON document per workspace, rewritten atomically after every cycle
//! and on pause. The completeness history is append-only and serves as the
//! durable audit trail; a crash between cycles never loses more than the
//! in-flight cycle.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{LoopError, Result};

/// File name of the state document inside a workspace
pub const STATE_FILE_NAME: &str = ".completeness_state.json";

/// The loop's current stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Implementation,
    Review,
    Complete,
    Paused,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Implementation => write!(f, "implementation"),
            Phase::Review => write!(f, "review"),
            Phase::Complete => write!(f, "complete"),
            Phase::Paused => write!(f, "paused"),
        }
    }
}

/// One audit-trail entry per completed cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub cycle: u32,
    pub score: u8,
    pub phase: Phase,
}

/// Durable state of one workspace's loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopState {
    pub cycle_count: u32,
    pub completeness_history: Vec<HistoryEntry>,
    pub phase: Phase,
    pub is_complete: bool,
    pub is_paused: bool,
    pub total_tokens: u64,
    /// Driving instructions carried into the next cycle; transcripts are
    /// never persisted, continuity flows through this text and the codebase.
    #[serde(default)]
    pub next_instructions: String,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            cycle_count: 0,
            completeness_history: Vec::new(),
            phase: Phase::Implementation,
            is_complete: false,
            is_paused: false,
            total_tokens: 0,
            next_instructions: String::new(),
        }
    }
}

impl LoopState {
    /// Path of the state file for a workspace
    pub fn path_for(workspace: &Path) -> PathBuf {
        workspace.join(STATE_FILE_NAME)
    }

    /// Load saved state; `Err` means "no saved state" to the operator
    pub fn load(workspace: &Path) -> Result<Self> {
        let path = Self::path_for(workspace);
        if !path.exists() {
            return Err(LoopError::state(format!(
                "No saved state in {}",
                workspace.display()
            )));
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| LoopError::state(format!("Failed to read state: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| LoopError::state(format!("Corrupt state file: {}", e)))
    }

    /// Persist with write-then-replace semantics
    ///
    /// An interrupt mid-save must not corrupt or partially write the file.
    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::path_for(workspace);
        let tmp = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Append one cycle to the audit trail
    ///
    /// Cycle numbers are assigned here so the history stays strictly
    /// increasing and gapless.
    pub fn record_cycle(&mut self, score: u8, phase: Phase) -> u32 {
        self.cycle_count += 1;
        self.completeness_history.push(HistoryEntry {
            cycle: self.cycle_count,
            score,
            phase,
        });
        self.cycle_count
    }

    /// Most recent score, 0 before any cycle
    pub fn latest_score(&self) -> u8 {
        self.completeness_history.last().map(|e| e.score).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_history_is_gapless() {
        let mut state = LoopState::default();
        for score in [10u8, 30, 55] {
            state.record_cycle(score, Phase::Review);
        }

        assert_eq!(state.cycle_count, 3);
        let cycles: Vec<u32> = state.completeness_history.iter().map(|e| e.cycle).collect();
        assert_eq!(cycles, vec![1, 2, 3]);
        assert_eq!(state.latest_score(), 55);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut state = LoopState::default();
        state.record_cycle(40, Phase::Review);
        state.total_tokens = 1234;
        state.next_instructions = "add subtraction".to_string();
        state.save(dir.path()).unwrap();

        let loaded = LoopState::load(dir.path()).unwrap();
        assert_eq!(loaded.cycle_count, 1);
        assert_eq!(loaded.completeness_history.len(), 1);
        assert_eq!(loaded.completeness_history[0].cycle, 1);
        assert_eq!(loaded.completeness_history[0].score, 40);
        assert_eq!(loaded.total_tokens, 1234);
        assert_eq!(loaded.next_instructions, "add subtraction");

        // The temporary file never survives a successful save
        assert!(!dir.path().join(".completeness_state.json.tmp").exists());
    }

    #[test]
    fn test_missing_state_reports_no_saved_state() {
        let dir = TempDir::new().unwrap();
        let err = LoopState::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("No saved state"));
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(LoopState::path_for(dir.path()), "{not json").unwrap();
        let err = LoopState::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Corrupt state"));
    }
}
