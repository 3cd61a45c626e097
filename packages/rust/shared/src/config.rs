//! Application configuration for readme-review.
//!
//! User config lives at `~/.readme-review/readme-review.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ReviewError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "readme-review.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".readme-review";

// ---------------------------------------------------------------------------
// Config structs (matching readme-review.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// LLM endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// README source settings.
    #[serde(default)]
    pub github: GithubConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory the recommendations dump and report are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Timeout applied to every HTTP request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum README fetch attempts.
    #[serde(default = "default_fetch_tries")]
    pub fetch_tries: u32,

    /// Delay before the second fetch attempt; doubles after every failure.
    #[serde(default = "default_fetch_base_delay_ms")]
    pub fetch_base_delay_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            timeout_secs: default_timeout_secs(),
            fetch_tries: default_fetch_tries(),
            fetch_base_delay_ms: default_fetch_base_delay_ms(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_fetch_tries() -> u32 {
    3
}
fn default_fetch_base_delay_ms() -> u64 {
    1000
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Default model used by every stage.
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_llm_base_url(),
            default_model: default_model(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "google/gemini-2.5-flash".into()
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base (the primary README channel).
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Raw-content base used for the branch fallback.
    #[serde(default = "default_raw_base")]
    pub raw_base: String,

    /// Branches tried in order when the API channel fails.
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            raw_base: default_raw_base(),
            branches: default_branches(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".into()
}
fn default_branches() -> Vec<String> {
    vec!["main".into(), "master".into()]
}

// ---------------------------------------------------------------------------
// Review settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings for one review run, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ReviewSettings {
    /// Where output artifacts go.
    pub output_dir: PathBuf,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Maximum README fetch attempts (at least 1).
    pub fetch_tries: u32,
    /// Initial retry backoff.
    pub fetch_base_delay: Duration,
    /// LLM model name.
    pub model: String,
}

impl From<&AppConfig> for ReviewSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.defaults.output_dir),
            timeout: Duration::from_secs(config.defaults.timeout_secs),
            fetch_tries: config.defaults.fetch_tries.max(1),
            fetch_base_delay: Duration::from_millis(config.defaults.fetch_base_delay_ms),
            model: config.llm.default_model.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.readme-review/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ReviewError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.readme-review/readme-review.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReviewError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ReviewError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ReviewError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| ReviewError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ReviewError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the LLM API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ReviewError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}
