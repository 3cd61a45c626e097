//! Shared types, error model, and configuration for readme-review.
//!
//! This crate is the foundation depended on by all other readme-review crates.
//! It provides:
//! - [`ReviewError`]: the unified error type
//! - Domain types ([`RepoRef`], [`RunId`])
//! - Configuration ([`AppConfig`], [`ReviewSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GithubConfig, LlmConfig, ReviewSettings, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{Result, ReviewError};
pub use types::{RepoRef, RunId, validate_repo_url};
