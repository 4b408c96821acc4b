//! Agent port - interface for the workers that produce pipeline artifacts.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::PipelineResult;
use crate::domain::models::{
    Component, ComponentContract, ContractTestSuite, DecompositionTree, Diagnosis,
    InterviewResult, TestResults,
};

/// Token and dollar spend from a single agent invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost_usd: f64,
}

impl AgentUsage {
    pub fn new(input_tokens: u64, output_tokens: u64, cost_usd: f64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cost_usd,
        }
    }
}

/// An agent's artifact plus what it cost to produce.
#[derive(Debug, Clone)]
pub struct AgentOutcome<T> {
    pub value: T,
    pub usage: AgentUsage,
}

impl<T> AgentOutcome<T> {
    pub fn new(value: T, usage: AgentUsage) -> Self {
        Self { value, usage }
    }

    /// An outcome with zero recorded spend, for scripted or replayed work.
    pub fn free(value: T) -> Self {
        Self {
            value,
            usage: AgentUsage::default(),
        }
    }
}

/// What an implementation attempt produced.
#[derive(Debug, Clone, Default)]
pub struct ImplementationReport {
    /// Contract test outcomes for the candidate sources.
    pub test_results: TestResults,
    /// Wall-clock build and test time; the resolution tie-breaker.
    pub build_duration_seconds: f64,
    /// Paths written under the work directory, relative to it.
    pub files: Vec<String>,
}

/// Trait for pipeline agent implementations.
///
/// An agent is the worker that produces each phase's artifacts: interview
/// findings, the decomposition tree, contracts, test suites, implementations,
/// and diagnoses. Different agents may sit on different backends; the
/// scheduler only sees this interface.
#[async_trait]
pub trait PipelineAgent: Send + Sync {
    /// Get the agent implementation name.
    fn name(&self) -> &'static str;

    /// Probe the task description for risks, ambiguities, and questions
    /// that need a human answer before decomposition starts.
    async fn interview(&self, task: &str) -> PipelineResult<AgentOutcome<InterviewResult>>;

    /// Break the task into a component tree.
    async fn decompose(
        &self,
        task: &str,
        interview: &InterviewResult,
    ) -> PipelineResult<AgentOutcome<DecompositionTree>>;

    /// Author the interface contract for one component.
    async fn author_contract(
        &self,
        component: &Component,
        tree: &DecompositionTree,
    ) -> PipelineResult<AgentOutcome<ComponentContract>>;

    /// Author the contract test suite for one contract.
    async fn author_test_suite(
        &self,
        contract: &ComponentContract,
    ) -> PipelineResult<AgentOutcome<ContractTestSuite>>;

    /// Produce one implementation attempt in `workdir` and run its contract
    /// tests. The agent writes sources under `workdir`; the caller owns the
    /// directory and decides whether the attempt gets promoted.
    async fn implement(
        &self,
        component: &Component,
        contract: &ComponentContract,
        suite: &ContractTestSuite,
        workdir: &Path,
    ) -> PipelineResult<AgentOutcome<ImplementationReport>>;

    /// Wire a non-leaf component's children together and run integration
    /// tests against the composition.
    async fn integrate(
        &self,
        component: &Component,
        tree: &DecompositionTree,
        workdir: &Path,
    ) -> PipelineResult<AgentOutcome<TestResults>>;

    /// Classify one failing test into a root cause.
    async fn diagnose(
        &self,
        component_id: &str,
        failing_test: &str,
        error_detail: &str,
    ) -> PipelineResult<AgentOutcome<Diagnosis>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_outcome_has_no_spend() {
        let outcome = AgentOutcome::free(42u32);
        assert_eq!(outcome.value, 42);
        assert_eq!(outcome.usage.input_tokens, 0);
        assert!((outcome.usage.cost_usd - 0.0).abs() < f64::EPSILON);
    }
}
