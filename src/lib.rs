//! Covenant - contract-first component pipeline.
//!
//! Covenant drives a software task through a fixed sequence of phases:
//! interview, decomposition into a component tree, mechanical contract
//! validation, implementation, and bottom-up integration. Agents do the
//! authoring; this crate owns the state machine around them, including
//! budget enforcement, diagnosis-driven recovery, competitive attempt
//! resolution, and a FIFO-coordinated daemon that any other process can
//! signal.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors, and the agent port
//! - **Service Layer** (`services`): scheduler, validator, wavefront,
//!   budget, and the per-phase drivers
//! - **Infrastructure Layer** (`infrastructure`): project storage, the
//!   daemon, configuration loading, and agent backends
//! - **CLI Layer** (`cli`): operator commands
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use covenant::infrastructure::agents::ScriptedAgent;
//! use covenant::infrastructure::ProjectStore;
//! use covenant::services::Scheduler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = ProjectStore::new(".");
//!     let agent = Arc::new(ScriptedAgent::new(my_plan()));
//!     let scheduler = Scheduler::new(store, config, agent);
//!     let state = scheduler.run_once().await?;
//!     println!("{}", state.format_summary());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{PipelineError, PipelineResult};
pub use domain::models::{
    BuildStatus, Component, ComponentContract, ContractTestSuite, CovenantConfig,
    DecompositionTree, Diagnosis, InterviewResult, RecoveryAction, RootCause, RunPhase, RunState,
    RunStatus, TestResults,
};
pub use domain::ports::{AgentOutcome, AgentUsage, PipelineAgent};
pub use infrastructure::{ConfigLoader, Daemon, ProjectStore};
pub use services::{BudgetTracker, ContractValidator, Scheduler, WavefrontScheduler};
