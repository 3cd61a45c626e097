//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use readme_review_core::{
    FinishedStage, OpenAiCompatModel, ProgressReporter, ReviewOutcome, ReviewPipeline,
    ReviewRequest,
};
use readme_review_fetch::{FetchOptions, GithubReadmeFetcher};
use readme_review_shared::{
    AppConfig, RepoRef, ReviewSettings, init_config, load_config, validate_api_key,
};
use tracing::info;

use crate::console::ConsoleCheckpoints;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// readme-review: LLM-assisted README review with human checkpoints.
#[derive(Parser)]
#[command(
    name = "readme-review",
    version,
    about = "Review a GitHub README with LLM stages and human checkpoints.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Review a repository README and write recommendations.
    Review(ReviewArgs),

    /// Check whether a URL is a canonical GitHub repository URL.
    Validate {
        /// URL to check.
        url: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `review`.
#[derive(Args, Debug)]
pub(crate) struct ReviewArgs {
    /// Repository URL, e.g. https://github.com/owner/repo.
    #[arg(long)]
    pub repo: String,

    /// Skip all checkpoints (always proceed).
    #[arg(long)]
    pub no_interactive: bool,

    /// Note appended to the final report as a labeled section.
    #[arg(long)]
    pub human_feedback: Option<String>,

    /// HTTP timeout in seconds for README and LLM requests.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// LLM model name (defaults to the configured model).
    #[arg(long)]
    pub model: Option<String>,

    /// Output directory (defaults to the configured output_dir).
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so the report on
/// stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "readme_review=info",
        1 => "readme_review=debug",
        _ => "readme_review=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Review(args) => cmd_review(args).await,
        Command::Validate { url } => cmd_validate(&url),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Merge config file values with CLI overrides.
fn review_settings(config: &AppConfig, args: &ReviewArgs) -> ReviewSettings {
    let mut settings = ReviewSettings::from(config);
    if let Some(secs) = args.timeout {
        settings.timeout = Duration::from_secs(secs);
    }
    if let Some(model) = &args.model {
        settings.model = model.clone();
    }
    if let Some(out) = &args.out {
        settings.output_dir = out.clone();
    }
    settings
}

async fn cmd_review(args: ReviewArgs) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    let api_key = validate_api_key(&config)?;
    let settings = review_settings(&config, &args);

    let source =
        GithubReadmeFetcher::new(FetchOptions::from_config(&config.github, settings.timeout))?;
    let llm = OpenAiCompatModel::new(
        &config.llm,
        settings.model.as_str(),
        api_key,
        settings.timeout,
    )?;
    let pipeline = ReviewPipeline::from_settings(&source, &llm, &settings);

    let request = ReviewRequest {
        repo_url: args.repo.clone(),
        human_feedback: args.human_feedback.clone(),
        interactive: !args.no_interactive,
    };

    info!(
        repo = %args.repo,
        model = %settings.model,
        interactive = request.interactive,
        "reviewing README"
    );

    let reporter = CliProgress::new();
    let mut checkpoints = ConsoleCheckpoints::new(std::io::stdin().lock(), std::io::stdout())
        .with_spinner(reporter.spinner.clone());

    let outcome = pipeline.run(&request, &mut checkpoints, &reporter).await?;

    match outcome {
        ReviewOutcome::Completed(done) => {
            println!();
            println!("=== Final Report ===");
            println!();
            println!("{}", done.report);
            println!();
            println!("  Recommendations: {}", done.recommendations_path.display());
            println!("  Report:          {}", done.report_path.display());
            println!("  Keywords:        {}", done.keywords.join(", "));
            println!();
            Ok(())
        }
        ReviewOutcome::Aborted { .. } => {
            println!("Pipeline stopped by user.");
            Ok(())
        }
        ReviewOutcome::Failed { error } => Err(eyre!(error)),
    }
}

fn cmd_validate(url: &str) -> Result<()> {
    let repo = RepoRef::parse(url)?;
    println!("{url} is a valid repository URL ({})", repo.slug());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter: a spinner for phases, plus stage highlights.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn print(&self, title: &str, body: String) {
        self.spinner.suspend(|| {
            println!();
            println!("--- {title} ---");
            println!("{body}");
        });
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn stage_finished(&self, stage: FinishedStage<'_>) {
        match stage {
            FinishedStage::Analysis(a) => self.print("Analyzer", a.preview()),
            FinishedStage::Tags(t) => self.print("Tag Recommender", t.preview()),
            FinishedStage::Improvements(i) => self.print("Content Improver", i.preview()),
            // The report itself is printed once the run completes.
            FinishedStage::Review(_) => {}
        }
    }

    fn done(&self, _outcome: &ReviewOutcome) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_flags_parse() {
        let cli = Cli::try_parse_from([
            "readme-review",
            "review",
            "--repo",
            "https://github.com/acme/widgets",
            "--no-interactive",
            "--human-feedback",
            "Human note: focus on clarity.",
            "--timeout",
            "30",
            "--model",
            "openai/gpt-4o-mini",
        ])
        .unwrap();

        let Command::Review(args) = cli.command else {
            panic!("expected review");
        };
        assert!(args.no_interactive);
        assert_eq!(args.timeout, Some(30));

        let settings = review_settings(&AppConfig::default(), &args);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.model, "openai/gpt-4o-mini");
        assert_eq!(settings.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn review_requires_repo() {
        assert!(Cli::try_parse_from(["readme-review", "review"]).is_err());
    }

    #[test]
    fn settings_default_to_config() {
        let cli =
            Cli::try_parse_from(["readme-review", "review", "--repo", "https://github.com/a/b"])
                .unwrap();
        let Command::Review(args) = cli.command else {
            panic!("expected review");
        };
        let config = AppConfig::default();
        let settings = review_settings(&config, &args);
        assert_eq!(settings.model, config.llm.default_model);
        assert_eq!(settings.timeout, Duration::from_secs(config.defaults.timeout_secs));
    }

    #[test]
    fn validate_accepts_and_rejects() {
        assert!(cmd_validate("https://github.com/acme/widgets").is_ok());
        assert!(cmd_validate("https://gitlab.com/acme/widgets").is_err());
    }
}
