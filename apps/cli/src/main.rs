//! readme-review CLI: human-in-the-loop README review for GitHub projects.
//!
//! Fetches a repository README, runs it through four LLM stages with
//! checkpoints in between, and writes a recommendations dump plus a final
//! report.

mod commands;
mod console;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
