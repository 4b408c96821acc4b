//! Port interfaces for external dependencies.

pub mod agent;

pub use agent::{AgentOutcome, AgentUsage, ImplementationReport, PipelineAgent};
