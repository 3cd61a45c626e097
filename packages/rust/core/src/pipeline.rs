//! Review pipeline orchestrator.
//!
//! Ties the README source, keyword extraction, the four LLM stages,
//! human checkpoints, and the output writer into one run:
//!
//! ```text
//! FETCHING ─▶ ANALYZED ─▶ TAGGED ─▶ IMPROVED ─▶ REVIEWED ─▶ DONE
//!    │            │          │          │
//!    ▼            └──────────┴──────────┴──▶ ABORTED (checkpoint "no")
//!  FAILED
//! ```
//!
//! Fetch problems end the run with [`ReviewOutcome::Failed`] and no files.
//! Stage and LLM errors are not caught; they propagate as `Err`.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, warn};

use readme_review_artifacts::write_outputs;
use readme_review_fetch::{FetchOptions, GithubReadmeFetcher, ReadmeSource};
use readme_review_markdown::{DEFAULT_TOP_K, extract_keywords, markdown_to_text, section_headings};
use readme_review_shared::{
    RepoRef, Result, ReviewError, ReviewSettings, RunId, load_config, validate_api_key,
};

use crate::checkpoint::{AutoProceed, Checkpoint, CheckpointHandler, CheckpointId, Decision};
use crate::llm::{LanguageModel, OpenAiCompatModel};
use crate::retry::RetryPolicy;
use crate::stages::{self, Analysis, Improvements, Review, ReviewInput, TagSuggestions};
use crate::state::{PipelineState, keys};

/// Label of the section appended to the report for operator feedback.
pub const HUMAN_FEEDBACK_LABEL: &str = "[Human feedback]";

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelinePhase {
    Fetching,
    Analyzed,
    Tagged,
    Improved,
    Reviewed,
    Done,
    Aborted,
    Failed,
}

impl PipelinePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }

    /// Whether `next` is a legal transition from `self`.
    pub fn can_advance_to(self, next: PipelinePhase) -> bool {
        use PipelinePhase::*;
        match (self, next) {
            (Fetching, Analyzed)
            | (Analyzed, Tagged)
            | (Tagged, Improved)
            | (Improved, Reviewed)
            | (Reviewed, Done) => true,
            (Analyzed | Tagged | Improved, Aborted) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Analyzed => "analyzed",
            Self::Tagged => "tagged",
            Self::Improved => "improved",
            Self::Reviewed => "reviewed",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn advance(phase: &mut PipelinePhase, next: PipelinePhase) {
    debug_assert!(
        phase.can_advance_to(next),
        "illegal transition {phase} -> {next}"
    );
    debug!(from = %phase, to = %next, "phase transition");
    *phase = next;
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// A stage record just produced, for display.
#[derive(Debug, Clone, Copy)]
pub enum FinishedStage<'a> {
    Analysis(&'a Analysis),
    Tags(&'a TagSuggestions),
    Improvements(&'a Improvements),
    Review(&'a Review),
}

/// Progress callback trait so the CLI can show spinners and stage output.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each stage's record is stored.
    fn stage_finished(&self, stage: FinishedStage<'_>);
    /// Called once with the terminal outcome.
    fn done(&self, outcome: &ReviewOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn stage_finished(&self, _stage: FinishedStage<'_>) {}
    fn done(&self, _outcome: &ReviewOutcome) {}
}

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// One review run's inputs.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub repo_url: String,
    /// Appended to the report when non-blank. Never shown to the LLM.
    pub human_feedback: Option<String>,
    /// When false, checkpoints are skipped as if "proceed" was chosen.
    pub interactive: bool,
}

/// Result of a run that reached the output writer.
#[derive(Debug, Clone)]
pub struct CompletedReview {
    pub run_id: RunId,
    /// Reviewer report plus any feedback section; identical to the report file.
    pub report: String,
    pub recommendations_path: PathBuf,
    pub report_path: PathBuf,
    pub keywords: Vec<String>,
    pub state: PipelineState,
}

/// How a run ended, short of an unexpected error.
#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    Completed(Box<CompletedReview>),
    /// The operator chose "no" at a checkpoint. Nothing was written.
    Aborted {
        at: CheckpointId,
        keywords: Vec<String>,
    },
    /// The README could not be obtained. Nothing was written.
    Failed { error: String },
}

impl ReviewOutcome {
    /// The final report, or `""` for aborted and failed runs.
    pub fn final_recommendations(&self) -> &str {
        match self {
            Self::Completed(done) => &done.report,
            Self::Aborted { .. } | Self::Failed { .. } => "",
        }
    }

    pub fn keywords(&self) -> &[String] {
        match self {
            Self::Completed(done) => &done.keywords,
            Self::Aborted { keywords, .. } => keywords,
            Self::Failed { .. } => &[],
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        match self {
            Self::Completed(_) => PipelinePhase::Done,
            Self::Aborted { .. } => PipelinePhase::Aborted,
            Self::Failed { .. } => PipelinePhase::Failed,
        }
    }

    /// Flat mapping for programmatic callers.
    ///
    /// Completed runs carry `final_recommendations`, `recommendations_path`,
    /// `report`, `report_path`, and `keywords`. Aborted runs carry an empty
    /// `final_recommendations`, `keywords`, and `aborted_at`. Failed runs
    /// carry `error` with empty `report`/`keywords` and null paths, but no
    /// `final_recommendations`.
    pub fn to_mapping(&self) -> Value {
        match self {
            Self::Completed(done) => json!({
                "final_recommendations": done.report,
                "recommendations_path": done.recommendations_path.display().to_string(),
                "report": done.report,
                "report_path": done.report_path.display().to_string(),
                "keywords": done.keywords,
            }),
            Self::Aborted { at, keywords } => json!({
                "final_recommendations": "",
                "keywords": keywords,
                "aborted_at": at.to_string(),
            }),
            Self::Failed { error } => json!({
                "error": error,
                "recommendations_path": null,
                "report": "",
                "report_path": null,
                "keywords": [],
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs reviews against a README source and a language model.
pub struct ReviewPipeline<'a> {
    source: &'a dyn ReadmeSource,
    llm: &'a dyn LanguageModel,
    retry: RetryPolicy,
    output_dir: PathBuf,
}

impl<'a> ReviewPipeline<'a> {
    pub fn new(
        source: &'a dyn ReadmeSource,
        llm: &'a dyn LanguageModel,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            llm,
            retry: RetryPolicy::default(),
            output_dir: output_dir.into(),
        }
    }

    /// Build from merged runtime settings (output dir and fetch retry policy).
    pub fn from_settings(
        source: &'a dyn ReadmeSource,
        llm: &'a dyn LanguageModel,
        settings: &ReviewSettings,
    ) -> Self {
        Self::new(source, llm, &settings.output_dir).with_retry(RetryPolicy::new(
            settings.fetch_tries,
            settings.fetch_base_delay,
        ))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one review to a terminal phase.
    ///
    /// 1. Fetch the README (URL checked first, then retried with backoff)
    /// 2. Extract keywords
    /// 3. Analyzer, checkpoint
    /// 4. Tag recommender, checkpoint
    /// 5. Content improver, checkpoint
    /// 6. Reviewer, feedback section, output files
    #[instrument(skip_all, fields(repo = %request.repo_url, model = self.llm.name()))]
    pub async fn run(
        &self,
        request: &ReviewRequest,
        checkpoints: &mut dyn CheckpointHandler,
        progress: &dyn ProgressReporter,
    ) -> Result<ReviewOutcome> {
        let start = Instant::now();
        let run_id = RunId::new();
        let mut phase = PipelinePhase::Fetching;

        info!(%run_id, interactive = request.interactive, "starting review");

        // --- Fetch ---
        progress.phase("Fetching README");
        let readme = match self.fetch_readme(&request.repo_url).await {
            Ok(readme) => readme,
            Err(e) => {
                let error = if matches!(e, ReviewError::InvalidRepoUrl { .. }) {
                    e.to_string()
                } else {
                    format!("Error fetching README: {e}")
                };
                if e.is_transient() {
                    warn!(%error, "README unavailable, review not started");
                } else {
                    error!(%error, "review failed before any stage ran");
                }
                advance(&mut phase, PipelinePhase::Failed);
                return Ok(finish(ReviewOutcome::Failed { error }, progress));
            }
        };

        let mut state = PipelineState::new();
        state.set(keys::README_RAW, &readme)?;

        let keywords = extract_keywords(&markdown_to_text(&readme), DEFAULT_TOP_K);
        info!(count = keywords.len(), "keywords extracted");
        state.set(keys::KEYWORDS, &keywords)?;

        // Text fed to later stages; a checkpoint edit replaces it.
        let mut current_text = readme.clone();

        // --- Analyzer ---
        progress.phase("Analyzing README");
        let analysis = stages::analyze(&readme, self.llm)
            .await
            .inspect_err(|e| error!(stage = "analyzer", error = %e, "stage failed"))?;
        state.record(&analysis)?;
        progress.stage_finished(FinishedStage::Analysis(&analysis));
        advance(&mut phase, PipelinePhase::Analyzed);

        let preview = analysis.preview();
        match self.ask(request, checkpoints, CheckpointId::AfterAnalyzer, preview, &state) {
            Decision::Abort => {
                let outcome = self.abort(&mut phase, CheckpointId::AfterAnalyzer, keywords, progress);
                return Ok(outcome);
            }
            Decision::Edit(text) => {
                state.apply_edit(CheckpointId::AfterAnalyzer, &text)?;
                current_text = text;
            }
            Decision::Proceed => {}
        }

        // --- Tag recommender ---
        progress.phase("Recommending tags");
        let tags = stages::recommend_tags(&current_text, &keywords, self.llm)
            .await
            .inspect_err(|e| error!(stage = "tags", error = %e, "stage failed"))?;
        state.record(&tags)?;
        progress.stage_finished(FinishedStage::Tags(&tags));
        advance(&mut phase, PipelinePhase::Tagged);

        let preview = tags.preview();
        match self.ask(request, checkpoints, CheckpointId::AfterTags, preview, &state) {
            Decision::Abort => {
                let outcome = self.abort(&mut phase, CheckpointId::AfterTags, keywords, progress);
                return Ok(outcome);
            }
            Decision::Edit(text) => {
                state.apply_edit(CheckpointId::AfterTags, &text)?;
                current_text = text;
            }
            Decision::Proceed => {}
        }

        // --- Content improver ---
        progress.phase("Improving title and intro");
        let sections = section_headings(&current_text);
        let improvements = stages::improve_content(&current_text, &sections, self.llm)
            .await
            .inspect_err(|e| error!(stage = "improvements", error = %e, "stage failed"))?;
        state.record(&improvements)?;
        progress.stage_finished(FinishedStage::Improvements(&improvements));
        advance(&mut phase, PipelinePhase::Improved);

        let mut edited_intro: Option<String> = None;
        let preview = improvements.preview();
        match self.ask(request, checkpoints, CheckpointId::AfterImprover, preview, &state) {
            Decision::Abort => {
                let outcome = self.abort(&mut phase, CheckpointId::AfterImprover, keywords, progress);
                return Ok(outcome);
            }
            Decision::Edit(text) => {
                state.apply_edit(CheckpointId::AfterImprover, &text)?;
                edited_intro = Some(text);
            }
            Decision::Proceed => {}
        }

        // --- Reviewer ---
        progress.phase("Writing final review");
        let input = ReviewInput {
            analysis: &analysis,
            tags: &tags,
            improvements: &improvements,
            intro: edited_intro.as_deref().unwrap_or(&improvements.suggested_intro),
        };
        let review = stages::review(input, self.llm)
            .await
            .inspect_err(|e| error!(stage = "report", error = %e, "stage failed"))?;
        state.record(&review)?;
        progress.stage_finished(FinishedStage::Review(&review));
        advance(&mut phase, PipelinePhase::Reviewed);

        let mut report = review.report.clone();
        if let Some(feedback) = request
            .human_feedback
            .as_deref()
            .filter(|f| !f.trim().is_empty())
        {
            state.set(keys::HUMAN_FEEDBACK, feedback)?;
            report = format!("{report}\n\n{HUMAN_FEEDBACK_LABEL}\n{feedback}");
        }

        // --- Outputs ---
        progress.phase("Writing outputs");
        let written = write_outputs(&self.output_dir, &state, &report)?;
        advance(&mut phase, PipelinePhase::Done);

        info!(
            %run_id,
            report = %written.report_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "review complete"
        );

        let outcome = ReviewOutcome::Completed(Box::new(CompletedReview {
            run_id,
            report,
            recommendations_path: written.recommendations_path,
            report_path: written.report_path,
            keywords,
            state,
        }));
        Ok(finish(outcome, progress))
    }

    /// Validate the URL, then fetch through the retry policy.
    async fn fetch_readme(&self, repo_url: &str) -> Result<String> {
        let repo = RepoRef::parse(repo_url)?;
        let readme = self
            .retry
            .run(|| self.source.fetch_readme(repo_url))
            .await?;

        if readme.trim().is_empty() {
            return Err(ReviewError::ContentUnavailable { repo: repo.slug() });
        }
        info!(bytes = readme.len(), "README fetched");
        Ok(readme)
    }

    /// Consult the handler at `id`. Non-interactive runs and blank edits
    /// count as "proceed".
    fn ask(
        &self,
        request: &ReviewRequest,
        handler: &mut dyn CheckpointHandler,
        id: CheckpointId,
        preview: String,
        state: &PipelineState,
    ) -> Decision {
        if !request.interactive {
            return Decision::Proceed;
        }

        match handler.decide(&Checkpoint { id, preview, state }) {
            Decision::Edit(text) if text.trim().is_empty() => {
                warn!(checkpoint = %id, "empty edit, proceeding unchanged");
                Decision::Proceed
            }
            decision => {
                info!(checkpoint = %id, decision = decision_name(&decision), "checkpoint decided");
                decision
            }
        }
    }

    fn abort(
        &self,
        phase: &mut PipelinePhase,
        at: CheckpointId,
        keywords: Vec<String>,
        progress: &dyn ProgressReporter,
    ) -> ReviewOutcome {
        info!(checkpoint = %at, "pipeline stopped by user");
        advance(phase, PipelinePhase::Aborted);
        finish(ReviewOutcome::Aborted { at, keywords }, progress)
    }
}

fn decision_name(decision: &Decision) -> &'static str {
    match decision {
        Decision::Proceed => "proceed",
        Decision::Abort => "abort",
        Decision::Edit(_) => "edit",
    }
}

fn finish(outcome: ReviewOutcome, progress: &dyn ProgressReporter) -> ReviewOutcome {
    progress.done(&outcome);
    outcome
}

// ---------------------------------------------------------------------------
// Programmatic entry point
// ---------------------------------------------------------------------------

/// Inputs for [`run_review_workflow`]. `None` fields fall back to config.
#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    pub repo_url: String,
    pub human_feedback: Option<String>,
    pub model: Option<String>,
    pub timeout: Option<Duration>,
}

/// Run a non-interactive review with the user's config and return the
/// result as a flat mapping (see [`ReviewOutcome::to_mapping`]).
///
/// Fetch failures come back as an `error` entry. Config, LLM, and output
/// errors are returned as `Err`.
pub async fn run_review_workflow(options: WorkflowOptions) -> Result<Value> {
    let config = load_config()?;
    let api_key = validate_api_key(&config)?;

    let mut settings = ReviewSettings::from(&config);
    if let Some(model) = options.model {
        settings.model = model;
    }
    if let Some(timeout) = options.timeout {
        settings.timeout = timeout;
    }

    let source = GithubReadmeFetcher::new(FetchOptions::from_config(&config.github, settings.timeout))?;
    let llm = OpenAiCompatModel::new(&config.llm, settings.model.as_str(), api_key, settings.timeout)?;
    let pipeline = ReviewPipeline::from_settings(&source, &llm, &settings);

    let request = ReviewRequest {
        repo_url: options.repo_url,
        human_feedback: options.human_feedback,
        interactive: false,
    };
    let outcome = pipeline.run(&request, &mut AutoProceed, &SilentProgress).await?;
    Ok(outcome.to_mapping())
}
