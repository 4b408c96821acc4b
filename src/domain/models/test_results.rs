//! Test run outcome snapshots.

use serde::{Deserialize, Serialize};

/// One failing test from a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    /// Identifier of the failing test case
    pub test_id: String,
    /// What the test was checking
    #[serde(default)]
    pub test_description: String,
    /// Failure or error message as reported by the harness
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Aggregate result of running a component's contract tests.
///
/// Immutable once produced; a re-attempt replaces the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub errors: u32,
    #[serde(default)]
    pub failure_details: Vec<TestFailure>,
}

impl TestResults {
    /// An all-green run over `total` tests.
    pub fn passing(total: u32) -> Self {
        Self {
            total,
            passed: total,
            failed: 0,
            errors: 0,
            failure_details: Vec::new(),
        }
    }

    /// Green iff at least one test ran and nothing failed or errored.
    /// Zero tests is never a pass.
    pub const fn all_passed(&self) -> bool {
        self.total > 0 && self.failed == 0 && self.errors == 0
    }

    /// Fraction of tests passed, 0.0 when no tests ran.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.passed) / f64::from(self.total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_tests_never_pass() {
        let results = TestResults::default();
        assert!(!results.all_passed());
        assert!((results.pass_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_passed_requires_no_failures_or_errors() {
        let mut results = TestResults::passing(5);
        assert!(results.all_passed());

        results.failed = 1;
        results.passed = 4;
        assert!(!results.all_passed());

        results.failed = 0;
        results.errors = 1;
        assert!(!results.all_passed());
    }

    #[test]
    fn test_pass_rate() {
        let results = TestResults {
            total: 10,
            passed: 9,
            failed: 1,
            errors: 0,
            failure_details: vec![],
        };
        assert!((results.pass_rate() - 0.9).abs() < f64::EPSILON);
    }
}
