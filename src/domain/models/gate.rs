//! Validation gate verdicts. Gates report, they never raise.

use serde::{Deserialize, Serialize};

/// Pass/fail verdict from a validation gate, with the full error list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub details: Vec<String>,
}

impl GateResult {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
            details: Vec::new(),
        }
    }

    pub fn fail(reason: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
            details,
        }
    }
}
