//! Operator command handlers
//!
//! Thin display layer over the library: argument checks, progress output,
//! and exit messages. All loop logic lives in `agent::orchestrator`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::agent::{CycleResult, LoopState, Orchestrator};
use crate::core::{LoopConfig, LoopError, Result};
use crate::llm::list_backends;

/// Render a textual progress bar for a 0-100 score
///
/// Scores above 100 can only come from a hand-edited state file; they are
/// clamped so the bar never overflows its width.
pub fn progress_bar(score: u8, width: usize) -> String {
    let score = score.min(100);
    let filled = (score as usize * width) / 100;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        score
    )
}

fn print_cycle(result: &CycleResult) {
    println!();
    println!("--- Cycle {} Complete ---", result.cycle_number);
    println!("Score: {}", progress_bar(result.completeness_score, 40));
    println!("Time:  {:.1}s", result.duration_seconds);

    if let Some(ref response) = result.agent1_response {
        println!(
            "Implementer: {} tokens, {} iterations, {} tool calls",
            response.usage.total_tokens,
            response.iterations,
            response.tool_calls_made.len()
        );
    }

    if let Some(ref review) = result.agent2_review {
        println!("Reviewer: {} tokens", review.usage.total_tokens);

        if !review.completed_items.is_empty() {
            println!("  Completed:");
            for item in review.completed_items.iter().take(3) {
                println!("    + {}", truncate(item, 70));
            }
        }
        if !review.remaining_work.is_empty() {
            println!("  Remaining:");
            for item in review.remaining_work.iter().take(3) {
                println!("    - {}", truncate(item, 70));
            }
        }
    }

    if let Some(ref error) = result.error {
        println!("  ERROR: {}", error);
    }
    println!();
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Start a new loop on a workspace
pub async fn cmd_start(idea: &Path, workspace: &Path, config: LoopConfig) -> Result<()> {
    if !idea.exists() {
        return Err(LoopError::config(format!(
            "Idea file not found: {}",
            idea.display()
        )));
    }
    std::fs::create_dir_all(workspace)?;

    println!();
    println!("Idea:      {}", idea.display());
    println!("Workspace: {}", workspace.display());
    println!();

    run_loop(idea.to_path_buf(), workspace.to_path_buf(), config, false).await
}

/// Resume a paused loop
pub async fn cmd_resume(workspace: &Path, config: LoopConfig) -> Result<()> {
    // Verify saved state exists before constructing anything
    LoopState::load(workspace)?;

    let idea = workspace.join(&config.context.spec_file_name);
    if !idea.exists() {
        return Err(LoopError::config(format!(
            "Cannot find spec file {}. Use 'start' instead.",
            idea.display()
        )));
    }

    run_loop(idea, workspace.to_path_buf(), config, true).await
}

async fn run_loop(
    idea: PathBuf,
    workspace: PathBuf,
    config: LoopConfig,
    resume: bool,
) -> Result<()> {
    let started = Instant::now();

    let mut orchestrator = Orchestrator::new(&workspace, idea, config)?
        .on_status(Box::new(|message| {
            let ts = chrono::Local::now().format("%H:%M:%S");
            println!("[{}] {}", ts, message);
        }))
        .on_cycle_complete(Box::new(print_cycle));

    // Ctrl-C requests a cooperative pause; the in-flight cycle finishes
    // and state is saved before the loop stops.
    let pause = orchestrator.pause_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nPausing after current cycle... (Ctrl-C again to abort)");
            pause.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let action = if resume { "Resuming" } else { "Starting" };
    println!("{} loop... (Ctrl+C to pause)", action);
    println!();

    let outcome = orchestrator.run(resume).await;

    let status = orchestrator.get_status();
    println!();
    println!("{}", "=".repeat(60));
    println!("Cycles:      {}", status.cycle_count);
    println!("Final Score: {}", progress_bar(status.current_score, 40));
    println!("Phase:       {}", status.phase);
    println!("Runtime:     {:.0}s", started.elapsed().as_secs_f64());
    println!("Tokens:      {}", status.total_tokens);

    if status.is_complete {
        println!("Status:      COMPLETE");
    } else if status.is_paused {
        println!("Status:      PAUSED (use 'resume' to continue)");
    } else {
        println!("Status:      STOPPED");
    }
    println!("{}", "=".repeat(60));
    println!();

    outcome
}

/// Show current loop status from persisted state
pub fn cmd_status(workspace: &Path) -> Result<()> {
    let state = LoopState::load(workspace)?;

    println!();
    println!("Workspace: {}", workspace.display());
    println!("Cycles:    {}", state.cycle_count);
    println!("Score:     {}", progress_bar(state.latest_score(), 40));
    println!("Phase:     {}", state.phase);
    println!("Complete:  {}", if state.is_complete { "Yes" } else { "No" });
    println!("Paused:    {}", if state.is_paused { "Yes" } else { "No" });
    println!();
    Ok(())
}

/// Show the completeness history
pub fn cmd_score(workspace: &Path) -> Result<()> {
    let state = LoopState::load(workspace)?;

    if state.completeness_history.is_empty() {
        println!("No history yet.");
        return Ok(());
    }

    println!();
    println!("Cycle | Score");
    println!("------+--------------------------------------------------");
    for entry in state.completeness_history.iter().rev().take(15).rev() {
        println!(
            "{:>5} | {} [{}]",
            entry.cycle,
            progress_bar(entry.score, 35),
            entry.phase
        );
    }
    println!();
    Ok(())
}

/// List the known backend presets
pub fn cmd_backends() {
    println!("{}", list_backends());
}

/// Write an example config file
pub fn cmd_config(output: Option<&Path>) -> Result<()> {
    let path = LoopConfig::default().save(output)?;
    println!("Config saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0, 10), "[----------] 0%");
        assert_eq!(progress_bar(50, 10), "[#####-----] 50%");
        assert_eq!(progress_bar(100, 10), "[##########] 100%");
    }

    #[test]
    fn test_progress_bar_clamps_out_of_range_scores() {
        // A hand-edited state file can carry a score above 100
        assert_eq!(progress_bar(250, 10), "[##########] 100%");
        assert_eq!(progress_bar(101, 40), "[########################################] 100%");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 70), "short");
        let long = "x".repeat(100);
        assert_eq!(truncate(&long, 70).len(), 70);
    }
}
