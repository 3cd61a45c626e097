//! Human checkpoints between stages.
//!
//! After each of the first three stages the pipeline asks a
//! [`CheckpointHandler`] whether to continue. The handler sees the stage's
//! output and answers with a [`Decision`]. Console prompting lives in the
//! CLI; this module only defines the contract and two headless handlers.

use std::collections::VecDeque;
use std::fmt;

use crate::state::PipelineState;

/// The three pause points, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointId {
    AfterAnalyzer,
    AfterTags,
    AfterImprover,
}

impl CheckpointId {
    /// Question shown before moving on.
    pub fn question(self) -> &'static str {
        match self {
            Self::AfterAnalyzer => "Proceed to Tag Recommender?",
            Self::AfterTags => "Proceed to Content Improver (title/intro suggestions)?",
            Self::AfterImprover => "Proceed to final Reviewer?",
        }
    }

    /// Instruction shown when the operator chooses to edit.
    pub fn edit_instruction(self) -> &'static str {
        match self {
            Self::AfterAnalyzer => "Edit README excerpt (this will be used by next agents):",
            Self::AfterTags => "Edit content (title/intro) to use next:",
            Self::AfterImprover => "Edit improved intro/title to use in final report:",
        }
    }

    /// `(marker, text)` state keys written when this checkpoint is edited.
    pub fn edit_keys(self) -> (&'static str, &'static str) {
        match self {
            Self::AfterAnalyzer => ("readme_edited_stage1", "readme_after_analyzer_edit"),
            Self::AfterTags => ("readme_edited_stage2", "readme_after_tags_edit"),
            Self::AfterImprover => ("intro_edited_stage3", "intro_after_improver_edit"),
        }
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AfterAnalyzer => "after-analyzer",
            Self::AfterTags => "after-tags",
            Self::AfterImprover => "after-improver",
        };
        f.write_str(name)
    }
}

/// What the operator chose at a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Abort,
    /// Replacement text for the downstream stages. Blank text is treated as
    /// [`Decision::Proceed`].
    Edit(String),
}

/// Everything a handler may show the operator.
#[derive(Debug)]
pub struct Checkpoint<'a> {
    pub id: CheckpointId,
    /// Short preview of the stage output just produced.
    pub preview: String,
    pub state: &'a PipelineState,
}

/// Decides whether the pipeline continues past a checkpoint.
pub trait CheckpointHandler {
    fn decide(&mut self, checkpoint: &Checkpoint<'_>) -> Decision;
}

/// Always proceeds. Used for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoProceed;

impl CheckpointHandler for AutoProceed {
    fn decide(&mut self, _checkpoint: &Checkpoint<'_>) -> Decision {
        Decision::Proceed
    }
}

/// Replays a fixed list of decisions, then proceeds.
///
/// Remembers which checkpoints it was asked about.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDecisions {
    queue: VecDeque<Decision>,
    seen: Vec<CheckpointId>,
}

impl ScriptedDecisions {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            queue: decisions.into_iter().collect(),
            seen: Vec::new(),
        }
    }

    /// Checkpoints reached so far, in order.
    pub fn seen(&self) -> &[CheckpointId] {
        &self.seen
    }
}

impl CheckpointHandler for ScriptedDecisions {
    fn decide(&mut self, checkpoint: &Checkpoint<'_>) -> Decision {
        self.seen.push(checkpoint.id);
        self.queue.pop_front().unwrap_or(Decision::Proceed)
    }
}
