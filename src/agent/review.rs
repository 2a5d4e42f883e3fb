//! Review parsing - free text to structured result
//!
//! The reviewer is prompted, not guaranteed, to use section headers, so
//! parsing is a permissive single-pass state machine. Malformed or
//! reordered sections degrade to "treat everything as next instructions"
//! rather than failing; the implementer of the following cycle must always
//! receive something actionable.

use crate::core::TokenUsage;

/// Score at or above which, with no remaining work, the loop is complete
pub const COMPLETION_THRESHOLD: u8 = 95;

/// Structured outcome of one review
#[derive(Debug, Clone)]
pub struct ReviewResult {
    /// The reviewer's full response, unmodified
    pub raw_content: String,
    /// Completeness estimate, 0-100
    pub completeness_score: u8,
    pub completed_items: Vec<String>,
    pub remaining_work: Vec<String>,
    pub issues_found: Vec<String>,
    /// Verbatim commit instructions, formatting preserved
    pub commit_instructions: String,
    /// Driving instructions for the next implementer run
    pub next_instructions: String,
    pub usage: TokenUsage,
    /// True iff score >= 95 and remaining_work is empty
    pub is_complete: bool,
}

/// Converts reviewer output into a `ReviewResult`
///
/// Behind a trait so a stricter structured-output parser can substitute
/// without touching the orchestrator.
pub trait ReviewParser: Send + Sync {
    fn parse(&self, content: &str, usage: TokenUsage) -> ReviewResult;
}

/// The default best-effort section-header parser
pub struct HeuristicReviewParser;

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Score,
    Completed,
    Remaining,
    Issues,
    Commit,
    Next,
}

impl ReviewParser for HeuristicReviewParser {
    fn parse(&self, content: &str, usage: TokenUsage) -> ReviewResult {
        let mut score: u8 = 0;
        let mut completed = Vec::new();
        let mut remaining = Vec::new();
        let mut issues = Vec::new();
        let mut commit_instructions = String::new();
        let mut next_instructions = String::new();

        let mut section: Option<Section> = None;
        let mut buffer: Vec<&str> = Vec::new();

        for line in content.lines() {
            let lower = line.to_lowercase();
            let lower = lower.trim();

            if lower.contains("completeness score") {
                score = first_integer(line).unwrap_or(0);
                section = Some(Section::Score);
                continue;
            } else if lower.contains("what was just completed") || lower.contains("completed:") {
                section = Some(Section::Completed);
                continue;
            } else if lower.contains("remaining work") {
                section = Some(Section::Remaining);
                continue;
            } else if lower.contains("issues found") || lower.contains("specific issues") {
                section = Some(Section::Issues);
                continue;
            } else if lower.contains("commit instructions") {
                section = Some(Section::Commit);
                buffer.clear();
                continue;
            } else if lower.contains("next instructions") || lower.contains("instructions for agent")
            {
                if section == Some(Section::Commit) {
                    commit_instructions = buffer.join("\n");
                }
                section = Some(Section::Next);
                buffer.clear();
                continue;
            }

            let trimmed = line.trim();
            match section {
                Some(Section::Completed) if trimmed.starts_with('-') => {
                    completed.push(trimmed[1..].trim().to_string());
                }
                Some(Section::Remaining) if trimmed.starts_with('-') || is_numbered(trimmed) => {
                    remaining.push(strip_list_marker(trimmed).to_string());
                }
                Some(Section::Issues) if trimmed.starts_with('-') => {
                    issues.push(trimmed[1..].trim().to_string());
                }
                // Commit/next text is kept verbatim, blank lines included,
                // for downstream display.
                Some(Section::Commit) | Some(Section::Next) => {
                    buffer.push(line);
                }
                _ => {}
            }
        }

        match section {
            Some(Section::Commit) => commit_instructions = buffer.join("\n"),
            Some(Section::Next) => next_instructions = buffer.join("\n"),
            _ => {}
        }

        let is_complete = score >= COMPLETION_THRESHOLD && remaining.is_empty();

        ReviewResult {
            raw_content: content.to_string(),
            completeness_score: score,
            completed_items: completed,
            remaining_work: remaining,
            issues_found: issues,
            commit_instructions,
            next_instructions: if next_instructions.trim().is_empty() {
                content.to_string()
            } else {
                next_instructions
            },
            usage,
            is_complete,
        }
    }
}

/// Extract the first integer substring, clamped to 0-100
fn first_integer(line: &str) -> Option<u8> {
    let digits: String = line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok().map(|n| n.min(100) as u8)
}

/// Whether a line begins with a numbered-list marker like "1." or "12."
fn is_numbered(trimmed: &str) -> bool {
    let head: String = trimmed.chars().take(2).filter(|c| *c != '.').collect();
    !head.is_empty() && head.chars().all(|c| c.is_ascii_digit())
}

/// Strip a leading dash or numbered-list marker
fn strip_list_marker(trimmed: &str) -> &str {
    trimmed.trim_start_matches(['-', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', ' '])
}
