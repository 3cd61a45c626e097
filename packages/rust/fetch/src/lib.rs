//! README retrieval for GitHub repositories.
//!
//! The primary channel is the REST API's `/repos/{owner}/{repo}/readme`
//! endpoint requested as raw content. When that fails or comes back empty we
//! try `README.md` on a fixed list of default branches via the raw-content
//! host, stopping at the first non-empty body.
//!
//! Fetching is retry-agnostic: callers decide how many times to try.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use readme_review_shared::{GithubConfig, RepoRef, Result, ReviewError};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for README requests.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Media type asking the API for the file body instead of a JSON envelope.
const RAW_MEDIA_TYPE: &str = "application/vnd.github.v3.raw";

/// User-Agent string (the GitHub API rejects requests without one).
const USER_AGENT: &str = concat!("readme-review/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Source abstraction
// ---------------------------------------------------------------------------

/// Anything that can turn a repository URL into README text.
#[async_trait]
pub trait ReadmeSource: Send + Sync {
    /// Fetch the README for `repo_url`, failing with
    /// [`ReviewError::InvalidRepoUrl`] before any I/O if the URL is malformed.
    async fn fetch_readme(&self, repo_url: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Fetch options
// ---------------------------------------------------------------------------

/// Endpoints, fallback branches, and timeout for [`GithubReadmeFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// REST API base, e.g. `https://api.github.com`.
    pub api_base: String,
    /// Raw-content base, e.g. `https://raw.githubusercontent.com`.
    pub raw_base: String,
    /// Branches tried in order for the raw fallback.
    pub branches: Vec<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&GithubConfig::default(), Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl FetchOptions {
    /// Build options from the `[github]` config section and a request timeout.
    pub fn from_config(config: &GithubConfig, timeout: Duration) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            branches: config.branches.clone(),
            timeout,
        }
    }
}

/// Where a README body came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// The REST API readme endpoint.
    Api,
    /// `README.md` on the named branch.
    RawBranch(String),
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::RawBranch(branch) => write!(f, "raw:{branch}"),
        }
    }
}

// ---------------------------------------------------------------------------
// GitHub fetcher
// ---------------------------------------------------------------------------

/// HTTP README fetcher with API + raw-branch fallback.
#[derive(Debug, Clone)]
pub struct GithubReadmeFetcher {
    client: Client,
    opts: FetchOptions,
}

impl GithubReadmeFetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(opts: FetchOptions) -> Result<Self> {
        let client = build_client(&opts)?;
        Ok(Self { client, opts })
    }

    /// Fetch the README and report which channel produced it.
    #[instrument(skip_all, fields(url = %repo_url))]
    pub async fn fetch_with_channel(&self, repo_url: &str) -> Result<(String, Channel)> {
        let repo = RepoRef::parse(repo_url)?;

        // Primary channel: the API readme endpoint.
        let api_url = format!(
            "{}/repos/{}/{}/readme",
            self.opts.api_base, repo.owner, repo.repo
        );
        info!(%api_url, "fetching README via API");
        match self.get_text(&api_url, Some(RAW_MEDIA_TYPE)).await {
            Ok(Some(body)) => return Ok((body, Channel::Api)),
            Ok(None) => debug!("API returned no README content"),
            Err(e) => warn!(error = %e, "API fetch failed, trying raw branches"),
        }

        // Fallback: README.md on each default branch, in priority order.
        for branch in &self.opts.branches {
            let raw_url = format!(
                "{}/{}/{}/{branch}/README.md",
                self.opts.raw_base, repo.owner, repo.repo
            );
            info!(%raw_url, "trying raw README");
            match self.get_text(&raw_url, None).await {
                Ok(Some(body)) => return Ok((body, Channel::RawBranch(branch.clone()))),
                Ok(None) => debug!(%branch, "no README on branch"),
                Err(e) => warn!(%branch, error = %e, "raw README fetch failed"),
            }
        }

        // Network failures on individual channels are logged above; the caller
        // only learns that no channel produced content.
        warn!(repo = %repo, "unable to fetch README from any channel");
        Err(ReviewError::ContentUnavailable { repo: repo.slug() })
    }

    /// GET `url`; `Ok(None)` for a non-success status or a blank body.
    async fn get_text(&self, url: &str, accept: Option<&str>) -> Result<Option<String>> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReviewError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            debug!(%url, %status, "non-success status");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReviewError::Network(format!("{url}: failed to read body: {e}")))?;

        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(trimmed.to_string()))
    }
}

#[async_trait]
impl ReadmeSource for GithubReadmeFetcher {
    async fn fetch_readme(&self, repo_url: &str) -> Result<String> {
        let (body, channel) = self.fetch_with_channel(repo_url).await?;
        info!(%channel, bytes = body.len(), "README retrieved");
        Ok(body)
    }
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &FetchOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(opts.timeout)
        .build()
        .map_err(|e| ReviewError::Network(format!("failed to build HTTP client: {e}")))
}
