//! Error types for readme-review.
//!
//! Library crates use [`ReviewError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all readme-review operations.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The repository URL is not of the form `https://github.com/owner/repo`.
    #[error("invalid repository URL '{url}': expected https://github.com/owner/repo")]
    InvalidRepoUrl { url: String },

    /// Network/HTTP error while talking to GitHub.
    #[error("network error: {0}")]
    Network(String),

    /// Every README channel was tried and none produced content.
    #[error("README content is empty or could not be retrieved for {repo}")]
    ContentUnavailable { repo: String },

    /// LLM request failed or returned an unusable response.
    #[error("llm error: {0}")]
    Llm(String),

    /// A stage produced a record that is missing a required field.
    #[error("stage '{stage}' produced invalid output: {message}")]
    StageOutput { stage: String, message: String },

    /// A state key was written twice outside the human-edit path.
    #[error("state key '{key}' was already written")]
    StateConflict { key: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReviewError>;

impl ReviewError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-URL error for the given input.
    pub fn invalid_repo_url(url: impl Into<String>) -> Self {
        Self::InvalidRepoUrl { url: url.into() }
    }

    /// Create a stage-output validation error.
    pub fn stage_output(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StageOutput {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a failure is plausibly transient (network, empty response).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ContentUnavailable { .. })
    }
}

impl From<serde_json::Error> for ReviewError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
