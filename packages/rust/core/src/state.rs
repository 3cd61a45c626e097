//! Accumulated pipeline state.
//!
//! State is an insertion-ordered map from string keys to JSON values. Each
//! stage writes its typed record under its own key exactly once; only the
//! human-edit path adds keys outside that rule, and it never touches a
//! stage's key. The whole map is what lands in the recommendations dump.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use readme_review_shared::{Result, ReviewError};

use crate::checkpoint::CheckpointId;

/// Keys written by the orchestrator (stage records use [`StageRecord::KEY`]).
pub mod keys {
    /// README exactly as fetched.
    pub const README_RAW: &str = "readme_raw";
    /// Keywords extracted from the README text.
    pub const KEYWORDS: &str = "keywords";
    /// Reviewer-facing note supplied by the operator.
    pub const HUMAN_FEEDBACK: &str = "human_feedback";
}

/// A typed stage output stored under a fixed key.
pub trait StageRecord: Serialize + DeserializeOwned {
    /// State key, which doubles as the stage name in errors.
    const KEY: &'static str;

    /// Reject records missing a required field.
    fn validate(&self) -> Result<()>;
}

/// Insertion-ordered key/value state shared by all stages of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PipelineState {
    entries: Map<String, Value>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `record` and store it under its key.
    pub fn record<R: StageRecord>(&mut self, record: &R) -> Result<()> {
        record.validate()?;
        self.insert_once(R::KEY, serde_json::to_value(record)?)
    }

    /// Read back a stage record, if that stage has run.
    pub fn get<R: StageRecord>(&self) -> Option<R> {
        self.entries
            .get(R::KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Store an orchestrator value (README, keywords, feedback). Write-once.
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        self.insert_once(key, serde_json::to_value(value)?)
    }

    /// Record a human edit: a `true` marker plus the replacement text.
    ///
    /// Markers for distinct checkpoints never collide, and each checkpoint
    /// can be edited at most once per run.
    pub fn apply_edit(&mut self, at: CheckpointId, text: &str) -> Result<()> {
        let (marker, text_key) = at.edit_keys();
        self.insert_once(marker, Value::Bool(true))?;
        self.insert_once(text_key, Value::String(text.to_string()))?;
        debug!(checkpoint = %at, chars = text.chars().count(), "human edit recorded");
        Ok(())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_once(&mut self, key: &str, value: Value) -> Result<()> {
        if self.entries.contains_key(key) {
            return Err(ReviewError::StateConflict {
                key: key.to_string(),
            });
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
