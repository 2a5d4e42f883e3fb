//! Tandem - Autonomous Dual-Agent Coding Loop
//!
//! Alternates two LLM-driven roles against one workspace: an implementer
//! that edits the codebase via tools, and a reviewer that scores
//! completeness against the original specification. The loop repeats until
//! the reviewer judges the work complete or the operator pauses.
//!
//! # Architecture
//!
//! - **Core**: shared types, configuration, and error handling
//! - **LLM**: backend abstraction with OpenAI-compatible and subprocess variants
//! - **Tools**: tool registry with workspace file and memory tools
//! - **Memory**: per-persona append-only notes
//! - **Context**: role-specific context assembly with the reviewer air gap
//! - **Agent**: the shared tool-calling loop, review parsing, orchestration
//! - **CLI**: command-line operator surface
//!
//! # Usage
//!
//! ```rust,no_run
//! use tandem::agent::Orchestrator;
//! use tandem::core::LoopConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoopConfig::load();
//!     let mut orchestrator = Orchestrator::new("./workspace", "./idea.md", config)?;
//!     orchestrator.run(false).await?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod context;
pub mod core;
pub mod llm;
pub mod memory;
pub mod tools;

// Re-export commonly used items
pub use agent::{LoopState, Orchestrator};
pub use core::{LoopConfig, LoopError, Result};
pub use memory::MemoryStore;
