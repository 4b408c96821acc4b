//! Implementation attempts: competitive candidates and archived history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::test_results::TestResults;

/// Why an attempt directory exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptKind {
    /// One of several candidates racing for promotion.
    #[default]
    Competitive,
    /// A previous canonical implementation moved aside.
    Archived,
}

impl AttemptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Competitive => "competitive",
            Self::Archived => "archived",
        }
    }
}

/// Metadata written next to each attempt's sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptMetadata {
    #[serde(default)]
    pub attempt: u32,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, rename = "type")]
    pub kind: AttemptKind,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub reason: String,
}

impl AttemptMetadata {
    pub fn competitive(attempt: u32, files: Vec<String>) -> Self {
        Self {
            attempt,
            timestamp: Utc::now(),
            files,
            kind: AttemptKind::Competitive,
            ..Self::default()
        }
    }

    pub fn archived(reason: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: AttemptKind::Archived,
            reason: reason.into(),
            ..Self::default()
        }
    }
}

/// A finished attempt with its test outcome, ready for winner selection.
#[derive(Debug, Clone)]
pub struct ScoredAttempt {
    pub attempt_id: String,
    pub component_id: String,
    pub test_results: TestResults,
    pub build_duration_seconds: f64,
    pub src_dir: PathBuf,
}

impl ScoredAttempt {
    pub fn pass_rate(&self) -> f64 {
        self.test_results.pass_rate()
    }

    /// Ranking key: pass rate first, then build duration.
    pub fn score_key(&self) -> (f64, f64) {
        (self.pass_rate(), self.build_duration_seconds)
    }
}

/// Directory listing entry for an attempt on disk.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt_id: String,
    pub path: PathBuf,
    pub metadata: Option<AttemptMetadata>,
}
