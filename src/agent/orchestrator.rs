//! Cycle orchestrator
//!
//! Drives repeated implementer-then-reviewer cycles, persists progress
//! after every cycle, and supports pause/resume. Cycles are strictly
//! sequential; the implementer run fully completes before the reviewer
//! run begins.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::agent::prompts;
use crate::agent::review::{HeuristicReviewParser, ReviewParser, ReviewResult};
use crate::agent::runner::{AgentResponse, AgentRunner};
use crate::agent::state::{LoopState, Phase};
use crate::context::ContextBuilder;
use crate::core::{LoopConfig, LoopError, Result};
use crate::llm::{create_backend, LlmBackend};
use crate::tools::{ToolRegistry, WorkspaceTools};

/// Outcome of one full cycle; appended to history, never mutated
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub cycle_number: u32,
    pub completeness_score: u8,
    pub duration_seconds: f64,
    pub agent1_response: Option<AgentResponse>,
    pub agent2_review: Option<ReviewResult>,
    pub error: Option<String>,
}

/// Snapshot of loop progress for the operator
#[derive(Debug, Clone)]
pub struct LoopStatus {
    pub cycle_count: u32,
    pub current_score: u8,
    pub phase: Phase,
    pub total_tokens: u64,
    pub is_complete: bool,
    pub is_paused: bool,
}

/// Called after every major step with a short progress message
pub type StatusCallback = Box<dyn Fn(&str) + Send + Sync>;
/// Called after each full cycle with its result
pub type CycleCallback = Box<dyn Fn(&CycleResult) + Send + Sync>;

/// Drives the dual-agent completeness loop for one workspace
pub struct Orchestrator {
    workspace: PathBuf,
    idea_file: PathBuf,
    config: LoopConfig,
    implementer: AgentRunner,
    reviewer: AgentRunner,
    context: ContextBuilder,
    parser: Box<dyn ReviewParser>,
    state: LoopState,
    pause_requested: Arc<AtomicBool>,
    on_status: Option<StatusCallback>,
    on_cycle_complete: Option<CycleCallback>,
}

impl Orchestrator {
    /// Create an orchestrator with the backend selected by configuration
    pub fn new(
        workspace: impl Into<PathBuf>,
        idea_file: impl Into<PathBuf>,
        config: LoopConfig,
    ) -> Result<Self> {
        let backend = create_backend(&config.model)?;
        Ok(Self::with_backend(workspace, idea_file, config, backend))
    }

    /// Create an orchestrator around an explicit backend
    pub fn with_backend(
        workspace: impl Into<PathBuf>,
        idea_file: impl Into<PathBuf>,
        config: LoopConfig,
        backend: Arc<dyn LlmBackend>,
    ) -> Self {
        let workspace = workspace.into();
        let tool_timeout = Duration::from_secs(config.limits.tool_timeout_secs);

        let implementer_tools: Arc<dyn ToolRegistry> = Arc::new(WorkspaceTools::full(&workspace));
        let reviewer_tools: Arc<dyn ToolRegistry> = Arc::new(WorkspaceTools::read_only(&workspace));

        let implementer = AgentRunner::new(
            Arc::clone(&backend),
            implementer_tools,
            prompts::IMPLEMENTER_SYSTEM_PROMPT,
            config.limits.implementer_max_iterations,
            config.model.max_output_tokens,
            tool_timeout,
        );
        let reviewer = AgentRunner::new(
            backend,
            reviewer_tools,
            prompts::REVIEWER_SYSTEM_PROMPT,
            config.limits.reviewer_max_iterations,
            config.model.max_output_tokens,
            tool_timeout,
        );

        let context = ContextBuilder::new(
            &workspace,
            &config.context,
            Duration::from_secs(config.limits.test_timeout_secs),
        );

        Self {
            workspace,
            idea_file: idea_file.into(),
            config,
            implementer,
            reviewer,
            context,
            parser: Box::new(HeuristicReviewParser),
            state: LoopState::default(),
            pause_requested: Arc::new(AtomicBool::new(false)),
            on_status: None,
            on_cycle_complete: None,
        }
    }

    /// Substitute a stricter review parser
    pub fn with_parser(mut self, parser: Box<dyn ReviewParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Set the per-step progress callback
    pub fn on_status(mut self, callback: StatusCallback) -> Self {
        self.on_status = Some(callback);
        self
    }

    /// Set the per-cycle result callback
    pub fn on_cycle_complete(mut self, callback: CycleCallback) -> Self {
        self.on_cycle_complete = Some(callback);
        self
    }

    /// Shared flag the CLI's interrupt handler uses to request a pause
    pub fn pause_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.pause_requested)
    }

    /// Request a cooperative pause; the current cycle finishes first
    pub fn request_pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    /// Run the loop until completion, pause, error, or the cycle bound
    pub async fn run(&mut self, resume: bool) -> Result<()> {
        if resume {
            self.state = LoopState::load(&self.workspace)?;
            if self.state.is_complete {
                self.status("Loop already complete; nothing to resume");
                return Ok(());
            }
            self.state.is_paused = false;
            info!(
                cycle_count = self.state.cycle_count,
                "resuming from saved state"
            );
        } else {
            self.state = LoopState::default();
        }

        let spec = std::fs::read_to_string(&self.idea_file).map_err(|e| {
            LoopError::config(format!(
                "Cannot read spec file {}: {}",
                self.idea_file.display(),
                e
            ))
        })?;

        while !self.state.is_complete && self.state.cycle_count < self.config.limits.max_cycles {
            if self.pause_requested.load(Ordering::SeqCst) {
                self.state.is_paused = true;
                self.state.phase = Phase::Paused;
                self.state.save(&self.workspace)?;
                self.status("Paused; state saved");
                return Ok(());
            }

            let result = self.run_cycle(&spec).await;

            if let Some(ref callback) = self.on_cycle_complete {
                callback(&result);
            }

            if let Some(error) = result.error {
                // Persist what we have so the operator can resume after
                // fixing the cause, then surface the failure.
                self.state.save(&self.workspace)?;
                return Err(LoopError::Other(format!(
                    "Cycle {} failed: {}",
                    result.cycle_number, error
                )));
            }
        }

        if self.state.is_complete {
            self.status("Specification complete");
        } else {
            self.status("Cycle budget exhausted; use resume to continue");
        }
        Ok(())
    }

    /// Run one implementer-then-reviewer cycle
    async fn run_cycle(&mut self, spec: &str) -> CycleResult {
        let cycle_number = self.state.cycle_count + 1;
        let started = Instant::now();

        let mut result = CycleResult {
            cycle_number,
            completeness_score: self.state.latest_score(),
            duration_seconds: 0.0,
            agent1_response: None,
            agent2_review: None,
            error: None,
        };

        // Implementation half
        self.state.phase = Phase::Implementation;
        self.status(&format!("Cycle {}: implementing...", cycle_number));

        let instructions = if self.state.next_instructions.trim().is_empty() {
            format!("Implement the following specification:\n\n{}", spec)
        } else {
            self.state.next_instructions.clone()
        };

        let codebase = self.context.build_implementer_context(None);
        let last_commit = self.context.last_commit().await;
        let task_summary = if cycle_number > 1 {
            Some(format!("This is cycle {} of an iterative build loop.", cycle_number))
        } else {
            None
        };

        let user_content = prompts::implementer_user_content(
            &codebase,
            &last_commit,
            task_summary.as_deref(),
            &instructions,
        );

        let implementation = match self.implementer.run(&user_content).await {
            Ok(response) => response,
            Err(e) => {
                result.error = Some(e.to_string());
                result.duration_seconds = started.elapsed().as_secs_f64();
                return result;
            }
        };
        self.state.total_tokens += implementation.usage.total_tokens as u64;
        self.status(&format!(
            "Cycle {}: implementer finished ({} iterations)",
            cycle_number, implementation.iterations
        ));
        result.agent1_response = Some(implementation);

        // Review half, air-gapped
        self.state.phase = Phase::Review;
        self.status(&format!("Cycle {}: reviewing...", cycle_number));

        let reviewer_context = self.context.build_reviewer_context(true, Some("reviewer")).await;
        let user_content = prompts::reviewer_user_content(spec, &reviewer_context);

        let review_response = match self.reviewer.run(&user_content).await {
            Ok(response) => response,
            Err(e) => {
                result.error = Some(e.to_string());
                result.duration_seconds = started.elapsed().as_secs_f64();
                return result;
            }
        };
        self.state.total_tokens += review_response.usage.total_tokens as u64;

        let review = self
            .parser
            .parse(&review_response.content, review_response.usage);

        // Record the cycle and persist before anything else happens;
        // a crash after this point loses nothing.
        result.completeness_score = review.completeness_score;
        self.state.record_cycle(review.completeness_score, Phase::Review);
        self.state.next_instructions = review.next_instructions.clone();
        self.state.is_complete = review.is_complete;
        if review.is_complete {
            self.state.phase = Phase::Complete;
        }

        if let Err(e) = self.state.save(&self.workspace) {
            result.error = Some(e.to_string());
        }

        self.status(&format!(
            "Cycle {}: score {} ({} remaining items)",
            cycle_number,
            review.completeness_score,
            review.remaining_work.len()
        ));

        result.agent2_review = Some(review);
        result.duration_seconds = started.elapsed().as_secs_f64();
        result
    }

    /// Current progress snapshot
    pub fn get_status(&self) -> LoopStatus {
        LoopStatus {
            cycle_count: self.state.cycle_count,
            current_score: self.state.latest_score(),
            phase: self.state.phase,
            total_tokens: self.state.total_tokens,
            is_complete: self.state.is_complete,
            is_paused: self.state.is_paused,
        }
    }

    fn status(&self, message: &str) {
        info!("{}", message);
        if let Some(ref callback) = self.on_status {
            callback(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status() {
        let config = LoopConfig::default();
        let dir = tempfile::TempDir::new().unwrap();
        let orchestrator = Orchestrator::with_backend(
            dir.path(),
            dir.path().join("idea.md"),
            config,
            Arc::new(NoopBackend),
        );

        let status = orchestrator.get_status();
        assert_eq!(status.cycle_count, 0);
        assert_eq!(status.current_score, 0);
        assert!(!status.is_complete);
        assert!(!status.is_paused);
    }

    #[tokio::test]
    async fn test_run_requires_spec_file() {
        let config = LoopConfig::default();
        let dir = tempfile::TempDir::new().unwrap();
        let mut orchestrator = Orchestrator::with_backend(
            dir.path(),
            dir.path().join("missing.md"),
            config,
            Arc::new(NoopBackend),
        );

        let err = orchestrator.run(false).await.unwrap_err();
        assert!(err.to_string().contains("Cannot read spec file"));
    }

    #[tokio::test]
    async fn test_resume_without_state_fails() {
        let config = LoopConfig::default();
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("idea.md"), "Build something.").unwrap();

        let mut orchestrator = Orchestrator::with_backend(
            dir.path(),
            dir.path().join("idea.md"),
            config,
            Arc::new(NoopBackend),
        );

        let err = orchestrator.run(true).await.unwrap_err();
        assert!(err.to_string().contains("No saved state"));
    }

    struct NoopBackend;

    #[async_trait::async_trait]
    impl LlmBackend for NoopBackend {
        async fn generate(
            &self,
            _messages: &[crate::core::Message],
            _tools: Option<&[crate::core::ToolDefinition]>,
            _max_output_tokens: u32,
        ) -> Result<crate::llm::LlmResponse> {
            Err(LoopError::backend("noop"))
        }

        fn supports_tools(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "noop"
        }
    }
}
