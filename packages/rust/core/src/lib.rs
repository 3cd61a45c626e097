//! Core pipeline orchestration and domain logic for readme-review.
//!
//! This crate ties together README retrieval, keyword extraction, the four
//! LLM stages, human checkpoints, and output writing into one review run
//! (see [`pipeline::ReviewPipeline`]).

pub mod checkpoint;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod stages;
pub mod state;

pub use checkpoint::{
    AutoProceed, Checkpoint, CheckpointHandler, CheckpointId, Decision, ScriptedDecisions,
};
pub use llm::{LanguageModel, OpenAiCompatModel};
pub use pipeline::{
    CompletedReview, FinishedStage, HUMAN_FEEDBACK_LABEL, PipelinePhase, ProgressReporter,
    ReviewOutcome, ReviewPipeline, ReviewRequest, SilentProgress, WorkflowOptions,
    run_review_workflow,
};
pub use retry::RetryPolicy;
pub use state::{PipelineState, StageRecord};
