//! Agent module - the tool-calling loop, review parsing, and orchestration

pub mod orchestrator;
pub mod prompts;
pub mod review;
pub mod runner;
pub mod state;

pub use orchestrator::{CycleResult, LoopStatus, Orchestrator};
pub use review::{HeuristicReviewParser, ReviewParser, ReviewResult};
pub use runner::{AgentResponse, AgentRunner, ToolCallRecord};
pub use state::{HistoryEntry, LoopState, Phase};
