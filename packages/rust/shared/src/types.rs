//! Core domain types for readme-review runs.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, ReviewError};

/// Canonical repository URL shape.
static REPO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://github\.com/[^/]+/[^/]+/?$").expect("valid regex"));

/// Whether `url` is a canonical `https://github.com/owner/repo` URL.
///
/// Leading/trailing whitespace is ignored; a single trailing slash is allowed.
pub fn validate_repo_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && REPO_URL_RE.is_match(url)
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RepoRef
// ---------------------------------------------------------------------------

/// Owner/repository coordinates parsed from a canonical GitHub URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parse a canonical repository URL. A trailing `.git` is stripped.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if !validate_repo_url(trimmed) {
            return Err(ReviewError::invalid_repo_url(input));
        }

        let url = Url::parse(trimmed).map_err(|_| ReviewError::invalid_repo_url(input))?;
        let mut segments = url
            .path_segments()
            .ok_or_else(|| ReviewError::invalid_repo_url(input))?
            .filter(|s| !s.is_empty());

        let owner = segments.next();
        let repo = segments.next().map(|r| r.trim_end_matches(".git"));

        match (owner, repo) {
            (Some(owner), Some(repo)) if !repo.is_empty() => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(ReviewError::invalid_repo_url(input)),
        }
    }

    /// `owner/repo` slug.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_urls() {
        for url in [
            "https://github.com/owner/repo",
            "https://github.com/owner/repo/",
            "  https://github.com/rust-lang/rust  ",
            "https://github.com/a/b.git",
        ] {
            assert!(validate_repo_url(url), "expected valid: {url}");
        }
    }

    #[test]
    fn rejects_non_canonical_urls() {
        for url in [
            "",
            "   ",
            "https://google.com/owner/repo",
            "https://github.com/owner",
            "https://github.com/owner/",
            "http://github.com/owner/repo",
            "https://github.com/owner/repo/tree/main",
            "git@github.com:owner/repo.git",
        ] {
            assert!(!validate_repo_url(url), "expected invalid: {url:?}");
        }
    }

    #[test]
    fn repo_ref_parses_owner_and_repo() {
        let r = RepoRef::parse("https://github.com/owner/repo/").unwrap();
        assert_eq!(r.owner, "owner");
        assert_eq!(r.repo, "repo");
        assert_eq!(r.slug(), "owner/repo");

        let r = RepoRef::parse("https://github.com/owner/tool.git").unwrap();
        assert_eq!(r.repo, "tool");
    }

    #[test]
    fn repo_ref_rejects_invalid() {
        let err = RepoRef::parse("https://gitlab.com/owner/repo").unwrap_err();
        assert!(matches!(err, ReviewError::InvalidRepoUrl { .. }));
    }

    #[test]
    fn run_id_is_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
