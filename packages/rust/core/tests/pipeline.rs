//! End-to-end runs of the review pipeline against an in-memory README source
//! and a scripted language model.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use readme_review_core::stages::{Improvements, TagSuggestions};
use readme_review_core::{
    CheckpointId, Decision, LanguageModel, ReviewOutcome, ReviewPipeline, ReviewRequest,
    RetryPolicy, ScriptedDecisions, SilentProgress,
};
use readme_review_fetch::ReadmeSource;
use readme_review_shared::{Result, ReviewError};

const REPO: &str = "https://github.com/acme/widget-forge";

const README: &str = "# Widget Forge

Widget Forge generates widgets from declarative specs. Widget Forge is written in Rust.

## Installation

Install the widget toolchain with cargo.

## Usage

Run the forge against a manifest file to produce widgets.
";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

enum Body {
    Readme(&'static str),
    Unreachable,
}

struct FakeSource {
    body: Body,
    calls: AtomicU32,
}

impl FakeSource {
    fn new(body: Body) -> Self {
        Self {
            body,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadmeSource for FakeSource {
    async fn fetch_readme(&self, _repo_url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.body {
            Body::Readme(text) => Ok(text.to_string()),
            Body::Unreachable => Err(ReviewError::Network("connection reset".into())),
        }
    }
}

/// Answers each stage in its expected layout, then echoes the prompt so
/// tests can see what a stage was given.
#[derive(Default)]
struct ScriptedModel {
    prompts: Mutex<Vec<String>>,
    fail_tags: bool,
}

impl ScriptedModel {
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let reply = if prompt.contains("final plan") {
            "1. Improved title: Widget Forge\n2. Summary: Widget Forge builds widgets."
        } else if prompt.contains("TITLE:") {
            "TITLE: Widget Forge: widgets from specs\nINTRO: Generated intro.\nMISSING:\n- License"
        } else if prompt.contains("TAGS:") {
            if self.fail_tags {
                return Err(ReviewError::Llm("rate limited".into()));
            }
            "TAGS: rust, cli, widgets, codegen, specs, tooling\nCATEGORIES: developer-tools, cli"
        } else {
            "SUMMARY: Widget Forge builds widgets from specs.\nSUGGESTIONS:\n- Add a license section"
        };

        Ok(format!("{reply}\n\nECHO:\n{prompt}"))
    }
}

fn pipeline<'a>(source: &'a FakeSource, model: &'a ScriptedModel, out: &Path) -> ReviewPipeline<'a> {
    ReviewPipeline::new(source, model, out).with_retry(RetryPolicy::new(3, Duration::ZERO))
}

fn request(feedback: Option<&str>, interactive: bool) -> ReviewRequest {
    ReviewRequest {
        repo_url: REPO.to_string(),
        human_feedback: feedback.map(str::to_string),
        interactive,
    }
}

fn out_dir(tmp: &tempfile::TempDir) -> PathBuf {
    tmp.path().join("outputs")
}

// ---------------------------------------------------------------------------
// Completed runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_interactive_run_appends_feedback_and_writes_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();
    // Would abort if consulted; non-interactive runs never ask.
    let mut handler = ScriptedDecisions::new([Decision::Abort]);

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(
            &request(Some("Human note: focus on clarity."), false),
            &mut handler,
            &SilentProgress,
        )
        .await
        .unwrap();

    let ReviewOutcome::Completed(done) = outcome else {
        panic!("expected a completed run");
    };

    assert!(
        done.report
            .ends_with("\n\n[Human feedback]\nHuman note: focus on clarity."),
        "report was: {}",
        done.report
    );
    assert!(!done.keywords.is_empty());
    assert!(handler.seen().is_empty());

    assert_eq!(std::fs::read_to_string(&done.report_path).unwrap(), done.report);
    let dump = std::fs::read_to_string(&done.recommendations_path).unwrap();
    assert!(dump.starts_with("Recommendations (auto-generated state)\n\n"));
    assert!(dump.contains("\"human_feedback\": \"Human note: focus on clarity.\""));

    // Feedback stays out of every prompt.
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(prompts.iter().all(|p| !p.contains("Human note")));
}

#[tokio::test]
async fn blank_feedback_is_omitted() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(
            &request(Some("  \n\t "), false),
            &mut ScriptedDecisions::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

    let ReviewOutcome::Completed(done) = outcome else {
        panic!("expected a completed run");
    };
    assert!(!done.report.contains("[Human feedback]"));
    assert!(!done.state.contains("human_feedback"));
}

#[tokio::test]
async fn mapping_has_success_keys() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(&request(None, false), &mut ScriptedDecisions::default(), &SilentProgress)
        .await
        .unwrap();

    let mapping = outcome.to_mapping();
    for key in [
        "final_recommendations",
        "recommendations_path",
        "report",
        "report_path",
        "keywords",
    ] {
        assert!(mapping.get(key).is_some(), "missing {key}");
    }
    assert!(mapping.get("error").is_none());
    assert_eq!(mapping["final_recommendations"], mapping["report"]);
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn abort_at_first_checkpoint_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let out = out_dir(&tmp);
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();
    let mut handler = ScriptedDecisions::new([Decision::Abort]);

    let outcome = pipeline(&source, &model, &out)
        .run(&request(Some("ignored"), true), &mut handler, &SilentProgress)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ReviewOutcome::Aborted {
            at: CheckpointId::AfterAnalyzer,
            ..
        }
    ));
    assert_eq!(outcome.final_recommendations(), "");
    assert!(outcome.to_mapping().get("error").is_none());
    assert!(!out.exists());
    assert_eq!(model.prompts().len(), 1);
}

#[tokio::test]
async fn edit_at_first_checkpoint_feeds_tag_stage() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();
    let mut handler = ScriptedDecisions::new([Decision::Edit(
        "Edited README mentioning ZEBRAFISH-7731 only.".into(),
    )]);

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(&request(None, true), &mut handler, &SilentProgress)
        .await
        .unwrap();

    let ReviewOutcome::Completed(done) = outcome else {
        panic!("expected a completed run");
    };

    assert!(done.state.contains("readme_edited_stage1"));
    assert_eq!(
        done.state.get_str("readme_after_analyzer_edit"),
        Some("Edited README mentioning ZEBRAFISH-7731 only.")
    );

    let tags = done.state.get::<TagSuggestions>().unwrap();
    assert!(tags.raw.contains("ZEBRAFISH-7731"));

    let prompts = model.prompts();
    assert!(prompts[1].contains("ZEBRAFISH-7731"));
    assert!(!prompts[1].contains("Run the forge against"));

    let dump = std::fs::read_to_string(&done.recommendations_path).unwrap();
    assert!(dump.contains("\"readme_edited_stage1\": true"));
    assert_eq!(
        handler.seen(),
        &[
            CheckpointId::AfterAnalyzer,
            CheckpointId::AfterTags,
            CheckpointId::AfterImprover
        ]
    );
}

#[tokio::test]
async fn edit_at_improver_replaces_intro_for_reviewer() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();
    let mut handler = ScriptedDecisions::new([
        Decision::Proceed,
        Decision::Proceed,
        Decision::Edit("Operator intro ALPACA-42.".into()),
    ]);

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(&request(None, true), &mut handler, &SilentProgress)
        .await
        .unwrap();

    let ReviewOutcome::Completed(done) = outcome else {
        panic!("expected a completed run");
    };
    assert!(done.state.contains("intro_edited_stage3"));
    // The improver's own record is untouched.
    let improvements = done.state.get::<Improvements>().unwrap();
    assert_eq!(improvements.suggested_intro, "Generated intro.");

    let reviewer_prompt = model.prompts().pop().unwrap();
    assert!(reviewer_prompt.contains("ALPACA-42"));
    assert!(!reviewer_prompt.contains("Generated intro."));
}

#[tokio::test]
async fn blank_edit_proceeds_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();
    let mut handler = ScriptedDecisions::new([Decision::Edit("   ".into())]);

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(&request(None, true), &mut handler, &SilentProgress)
        .await
        .unwrap();

    let ReviewOutcome::Completed(done) = outcome else {
        panic!("expected a completed run");
    };
    assert!(!done.state.contains("readme_edited_stage1"));
    assert!(model.prompts()[1].contains("Run the forge against"));
}

#[tokio::test]
async fn edit_at_tags_checkpoint_feeds_improver() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();
    let mut handler = ScriptedDecisions::new([
        Decision::Proceed,
        Decision::Edit("Trimmed README about OCELOT-88.".into()),
    ]);

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(&request(None, true), &mut handler, &SilentProgress)
        .await
        .unwrap();

    let ReviewOutcome::Completed(done) = outcome else {
        panic!("expected a completed run");
    };

    assert!(!done.state.contains("readme_edited_stage1"));
    assert!(done.state.contains("readme_edited_stage2"));
    assert_eq!(
        done.state.get_str("readme_after_tags_edit"),
        Some("Trimmed README about OCELOT-88.")
    );

    let prompts = model.prompts();
    // The tag stage still saw the fetched README.
    assert!(prompts[1].contains("Run the forge against"));
    assert!(prompts[2].contains("TITLE:"));
    assert!(prompts[2].contains("OCELOT-88"));
    assert!(!prompts[2].contains("Run the forge against"));

    let improvements = done.state.get::<Improvements>().unwrap();
    assert!(improvements.raw.contains("OCELOT-88"));
}

#[tokio::test]
async fn second_edit_replaces_first_for_improver() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();
    let mut handler = ScriptedDecisions::new([
        Decision::Edit("First rewrite naming HERON-5.".into()),
        Decision::Edit("Second rewrite naming IBEX-9.".into()),
    ]);

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(&request(None, true), &mut handler, &SilentProgress)
        .await
        .unwrap();

    let ReviewOutcome::Completed(done) = outcome else {
        panic!("expected a completed run");
    };

    // Both edits are kept in state under their own keys.
    assert_eq!(
        done.state.get_str("readme_after_analyzer_edit"),
        Some("First rewrite naming HERON-5.")
    );
    assert_eq!(
        done.state.get_str("readme_after_tags_edit"),
        Some("Second rewrite naming IBEX-9.")
    );

    let prompts = model.prompts();
    assert!(prompts[1].contains("HERON-5"));
    assert!(prompts[2].contains("IBEX-9"));
    assert!(!prompts[2].contains("HERON-5"));
}

#[tokio::test]
async fn abort_at_later_checkpoints_writes_nothing() {
    for (decisions, at, prompt_count) in [
        (
            vec![Decision::Proceed, Decision::Abort],
            CheckpointId::AfterTags,
            2,
        ),
        (
            vec![Decision::Proceed, Decision::Proceed, Decision::Abort],
            CheckpointId::AfterImprover,
            3,
        ),
    ] {
        let tmp = tempfile::tempdir().unwrap();
        let out = out_dir(&tmp);
        let source = FakeSource::new(Body::Readme(README));
        let model = ScriptedModel::default();
        let mut handler = ScriptedDecisions::new(decisions);

        let outcome = pipeline(&source, &model, &out)
            .run(&request(Some("ignored"), true), &mut handler, &SilentProgress)
            .await
            .unwrap();

        match &outcome {
            ReviewOutcome::Aborted { at: stopped, keywords } => {
                assert_eq!(*stopped, at);
                assert!(!keywords.is_empty());
            }
            other => panic!("expected abort at {at}, got {other:?}"),
        }
        assert_eq!(outcome.to_mapping()["aborted_at"], at.to_string());
        assert!(!out.exists(), "output written after abort at {at}");
        assert_eq!(model.prompts().len(), prompt_count);
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_readme_fails_after_retries() {
    let tmp = tempfile::tempdir().unwrap();
    let out = out_dir(&tmp);
    let source = FakeSource::new(Body::Unreachable);
    let model = ScriptedModel::default();

    let outcome = pipeline(&source, &model, &out)
        .run(&request(None, true), &mut ScriptedDecisions::default(), &SilentProgress)
        .await
        .unwrap();

    let ReviewOutcome::Failed { ref error } = outcome else {
        panic!("expected a failed run");
    };
    assert!(error.starts_with("Error fetching README:"), "error was: {error}");
    assert!(error.contains("connection reset"));
    assert_eq!(source.calls(), 3);
    assert!(model.prompts().is_empty());
    assert!(!out.exists());

    // Distinguishable from a user abort.
    assert_eq!(outcome.final_recommendations(), "");
    let mapping = outcome.to_mapping();
    assert!(mapping.get("error").is_some());
    assert!(mapping.get("final_recommendations").is_none());
    assert_eq!(mapping["keywords"].as_array().map(Vec::len), Some(0));
    assert_eq!(mapping["report"], "");
    assert!(mapping["recommendations_path"].is_null());
    assert!(mapping["report_path"].is_null());
}

#[tokio::test]
async fn invalid_url_fails_without_fetching() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel::default();
    let mut req = request(None, false);
    req.repo_url = "https://gitlab.com/acme/widget-forge".into();

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(&req, &mut ScriptedDecisions::default(), &SilentProgress)
        .await
        .unwrap();

    assert!(matches!(outcome, ReviewOutcome::Failed { .. }));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn empty_readme_fails_as_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeSource::new(Body::Readme("  \n "));
    let model = ScriptedModel::default();

    let outcome = pipeline(&source, &model, &out_dir(&tmp))
        .run(&request(None, false), &mut ScriptedDecisions::default(), &SilentProgress)
        .await
        .unwrap();

    let ReviewOutcome::Failed { error } = outcome else {
        panic!("expected a failed run");
    };
    assert!(error.contains("empty or could not be retrieved"));
}

#[tokio::test]
async fn stage_errors_propagate() {
    let tmp = tempfile::tempdir().unwrap();
    let out = out_dir(&tmp);
    let source = FakeSource::new(Body::Readme(README));
    let model = ScriptedModel {
        fail_tags: true,
        ..Default::default()
    };

    let err = pipeline(&source, &model, &out)
        .run(&request(None, false), &mut ScriptedDecisions::default(), &SilentProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Llm(_)));
    assert!(!out.exists());
}
