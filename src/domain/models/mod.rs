//! Domain models for the pipeline.

pub mod attempt;
pub mod component;
pub mod config;
pub mod contract;
pub mod diagnosis;
pub mod gate;
pub mod run_state;
pub mod test_results;
pub mod tree;

pub use attempt::{AttemptKind, AttemptMetadata, AttemptRecord, ScoredAttempt};
pub use component::{BuildStatus, Component};
pub use config::{CovenantConfig, DaemonConfig, LoggingConfig};
pub use contract::{
    ComponentContract, ContractTestSuite, ErrorCase, FieldSpec, FunctionContract, TestCase,
    TestCategory, TypeKind, TypeSpec,
};
pub use diagnosis::{Diagnosis, RecoveryAction, RootCause};
pub use gate::GateResult;
pub use run_state::{
    ComponentTask, InterviewResult, RunPhase, RunState, RunStatus, TaskStatus,
};
pub use test_results::{TestFailure, TestResults};
pub use tree::DecompositionTree;
