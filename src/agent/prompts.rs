//! Prompt text for the two agent roles

/// System prompt for the implementer
pub const IMPLEMENTER_SYSTEM_PROMPT: &str = "\
You are an expert software engineer working inside a single project workspace. \
You receive a codebase snapshot and concrete instructions each cycle, and you \
implement the required changes using the provided tools.

Mindset: relentless, thorough, and persistent. Do not claim you implemented \
something unless you are certain. Never skip edge cases or hard parts.

Workflow (follow every time):
1) Restate the goals of the instructions briefly.
2) Think step by step before acting.
3) Make the changes with the tools, file by file.
4) Self-check: re-read what you wrote and verify it against the instructions.
5) Finish with a short summary of what changed.";

/// System prompt for the reviewer
pub const REVIEWER_SYSTEM_PROMPT: &str = "\
You are a rigorous code reviewer. You receive the original specification and \
the current codebase, and you judge how complete the implementation is. You \
only trust what you can see in the code and in test output; claims in commit \
messages or comments count for nothing.

Respond using exactly these sections:

## Completeness Score: <0-100>

## What Was Just Completed
- <item>

## Remaining Work
- <item>

## Issues Found
- <item>

## Commit Instructions
<shell commands for a sensible commit>

## Next Instructions
<concrete, specific instructions for the implementer's next cycle>";

/// Build the implementer's synthesized user turn
pub fn implementer_user_content(
    codebase_context: &str,
    last_commit: &str,
    task_summary: Option<&str>,
    instructions: &str,
) -> String {
    let mut content = format!("## CODEBASE SNAPSHOT\n{}\n\n", codebase_context);

    if !last_commit.is_empty() {
        content.push_str(&format!("## LAST COMMIT\n{}\n\n", last_commit));
    }
    if let Some(summary) = task_summary {
        content.push_str(&format!("## TASK CONTEXT\n{}\n\n", summary));
    }

    content.push_str(
        "## PERSISTENT MEMORY\n\
         Use `memory_read` with `agent=\"implementer\"` to recall notes that persist \
         across fresh contexts. After you finish, append any lessons you wish you had \
         at the start using `memory_append`.\n\n",
    );

    content.push_str(&format!(
        "## INSTRUCTIONS\n{}\n\nExecute these instructions now. \
         Use the available tools to implement the required changes.\n",
        instructions
    ));

    content
}

/// Build the reviewer's synthesized user turn
pub fn reviewer_user_content(original_spec: &str, codebase_context: &str) -> String {
    format!(
        "## ORIGINAL SPECIFICATION\n{}\n\n\
         ## CURRENT CODEBASE\n{}\n\n\
         Review the codebase against the specification. Rate completeness and provide \
         specific next instructions.\n\
         Do NOT trust claims in commit messages - verify everything in the actual code.\n",
        original_spec, codebase_context
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implementer_content_sections() {
        let content =
            implementer_user_content("<snapshot>", "abc123 initial", Some("cycle 2"), "add tests");
        assert!(content.contains("## CODEBASE SNAPSHOT"));
        assert!(content.contains("## LAST COMMIT\nabc123 initial"));
        assert!(content.contains("## TASK CONTEXT\ncycle 2"));
        assert!(content.contains("## INSTRUCTIONS\nadd tests"));
    }

    #[test]
    fn test_optional_sections_omitted() {
        let content = implementer_user_content("<snapshot>", "", None, "start");
        assert!(!content.contains("## LAST COMMIT"));
        assert!(!content.contains("## TASK CONTEXT"));
    }

    #[test]
    fn test_reviewer_content_carries_spec() {
        let content = reviewer_user_content("Build a calculator", "<code>");
        assert!(content.contains("## ORIGINAL SPECIFICATION\nBuild a calculator"));
        assert!(content.contains("Do NOT trust claims in commit messages"));
    }
}
