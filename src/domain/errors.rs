//! Domain errors for the Covenant pipeline.

use thiserror::Error;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Domain-level errors that can occur in the pipeline core.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Spend limit reached. Always routed to the `budget_exceeded` run
    /// status, never to `failed`.
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("No decomposition tree saved for this run")]
    TreeNotFound,

    #[error("Invalid phase transition from {from} to {to}: {reason}")]
    InvalidPhaseTransition { from: String, to: String, reason: String },

    #[error("Component dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),

    #[error("Contract validation failed: {0}")]
    ValidationFailed(String),

    #[error("Agent call failed: {0}")]
    AgentFailed(String),

    #[error("Nothing to archive for component: {0}")]
    NothingToArchive(String),

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error("Phase timed out after {0} seconds")]
    PhaseTimeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl PipelineError {
    /// Whether this error is the distinguished budget signal rather than a
    /// genuine failure.
    pub const fn is_budget(&self) -> bool {
        matches!(self, Self::BudgetExceeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_path_formatting() {
        let err = PipelineError::DependencyCycle(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Component dependency cycle detected: a -> b -> a"
        );
    }

    #[test]
    fn test_budget_is_distinguished() {
        assert!(PipelineError::BudgetExceeded("cap hit".into()).is_budget());
        assert!(!PipelineError::AgentFailed("boom".into()).is_budget());
    }
}
