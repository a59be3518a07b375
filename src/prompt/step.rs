//! Workflow step descriptors.

/// A named workflow step: the skill the agent runs and the files it may read
/// and must produce. Paths are relative to the working root and may contain
/// `*` wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStep {
    pub name: &'static str,
    pub skill: &'static str,
    pub inputs: Vec<&'static str>,
    pub outputs: Vec<&'static str>,
}

impl RunStep {
    /// The implementation step the loop drives.
    pub fn execute() -> Self {
        Self {
            name: "execute",
            skill: "loopr-execute",
            inputs: vec![
                "specs/.loopr/handoff.md",
                "specs/task-order.yaml",
                "specs/test-order.yaml",
                "specs/feature-*-task-*.md",
                "specs/feature-*-task-*-test-*.md",
            ],
            outputs: vec!["specs/implementation-progress.md"],
        }
    }
}
