//! Per-iteration prompt rendering.

use std::path::Path;

use super::step::RunStep;
use crate::protocol::status_block_template;

/// Build the prompt handed to the agent for one loop iteration.
///
/// Inputs are listed once each, in order. The handoff path is named so the
/// agent can leave notes for the next iteration.
pub fn build_loop_prompt(step: &RunStep, handoff_path: &Path, iteration: u64) -> String {
    let mut lines = vec![
        format!("Loopr loop iteration: {}", iteration),
        format!("Skill: {}", step.skill),
        String::new(),
        "Allowed inputs:".to_string(),
    ];

    let mut seen: Vec<&str> = Vec::new();
    for input in step.inputs.iter().copied() {
        if seen.contains(&input) {
            continue;
        }
        seen.push(input);
        lines.push(format!("- {}", input));
    }

    lines.push(String::new());
    lines.push("Required outputs:".to_string());
    lines.extend(step.outputs.iter().map(|output| format!("- {}", output)));

    lines.push(String::new());
    lines.push("Rules:".to_string());
    lines.push("- Read only the allowed inputs.".to_string());
    lines.push("- Do not scan the repo.".to_string());
    lines.push("- If required inputs are missing, stop and ask to run the appropriate step.".to_string());
    lines.push(format!(
        "- Append a completion note to {} (decisions, open questions, tests).",
        handoff_path.display()
    ));
    lines.push("- Only set EXIT_SIGNAL: true when all tasks are complete and tests are green.".to_string());
    lines.push("- Set PERMISSION_DENIALS: true if a tool call was refused.".to_string());
    lines.push("- Always include the status block at the end of your response.".to_string());

    lines.push(String::new());
    lines.push("Status block format (required):".to_string());
    lines.extend(status_block_template());

    lines.push(String::new());
    lines.push(format!("Run the skill: {}", step.skill));
    lines.join("\n")
}
