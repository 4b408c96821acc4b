//! Implementation phase driver.
//!
//! Leaves are built against their contracts, either one implementation with
//! retries or several racing in competitive mode. The agent writes sources
//! and runs the contract tests; this module owns attempt bookkeeping, budget
//! charging, winner promotion, and tree status updates.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{
    AttemptMetadata, BuildStatus, Component, ComponentContract, ContractTestSuite, CovenantConfig,
    DecompositionTree, ScoredAttempt, TestResults,
};
use crate::domain::ports::PipelineAgent;
use crate::infrastructure::project::ProjectStore;
use crate::services::budget::BudgetTracker;
use crate::services::resolution;

/// Build one component against its contract, retrying up to `max_attempts`
/// with the same canonical source directory. Returns the last test results,
/// green or not; the caller reads the verdict off them.
pub async fn implement_component(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
    max_attempts: u32,
    component: &Component,
    contract: &ComponentContract,
    suite: &ContractTestSuite,
) -> PipelineResult<TestResults> {
    let component_id = &component.component_id;
    let src_dir = store.impl_src_dir(component_id)?;
    let mut last_results = TestResults::default();

    for attempt in 1..=max_attempts.max(1) {
        let outcome = agent.implement(component, contract, suite, &src_dir).await?;
        budget.charge(&outcome.usage).await?;
        let report = outcome.value;

        let metadata = AttemptMetadata {
            attempt,
            timestamp: Utc::now(),
            files: report.files.clone(),
            ..AttemptMetadata::default()
        };
        store.save_impl_metadata(component_id, &metadata)?;
        store.append_audit(
            "implementation",
            &format!(
                "{component_id} attempt {attempt}: {} files",
                report.files.len()
            ),
        )?;
        store.save_test_results(component_id, &report.test_results)?;
        store.append_audit(
            "test_run",
            &format!(
                "{component_id}: {}/{} passed",
                report.test_results.passed, report.test_results.total
            ),
        )?;

        if report.test_results.all_passed() {
            info!(component_id = %component_id, attempt, "implementation passed contract tests");
            return Ok(report.test_results);
        }
        warn!(
            component_id = %component_id,
            attempt,
            failed = report.test_results.failed,
            errors = report.test_results.errors,
            "implementation attempt did not pass"
        );
        last_results = report.test_results;
    }
    Ok(last_results)
}

/// One competitive lane: implement into its own attempt directory, record
/// metadata and results, and score the outcome for resolution.
#[allow(clippy::too_many_arguments)]
async fn run_one_competitor(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
    component: &Component,
    contract: &ComponentContract,
    suite: &ContractTestSuite,
    attempt_id: &str,
    lane: u32,
) -> PipelineResult<ScoredAttempt> {
    let component_id = &component.component_id;
    let src_dir = store.attempt_src_dir(component_id, attempt_id)?;
    let outcome = agent.implement(component, contract, suite, &src_dir).await?;
    budget.charge(&outcome.usage).await?;
    let report = outcome.value;

    store.save_attempt_metadata(
        component_id,
        attempt_id,
        &AttemptMetadata::competitive(lane, report.files.clone()),
    )?;
    store.save_attempt_test_results(component_id, attempt_id, &report.test_results)?;

    Ok(ScoredAttempt {
        attempt_id: attempt_id.to_string(),
        component_id: component_id.clone(),
        test_results: report.test_results,
        build_duration_seconds: report.build_duration_seconds,
        src_dir,
    })
}

/// Race independent implementations of one component and promote the winner
/// into the canonical source directory. Losing attempts stay on disk under
/// `attempts/` as context for later diagnosis.
pub async fn implement_component_competitive(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
    num_agents: usize,
    component: &Component,
    contract: &ComponentContract,
    suite: &ContractTestSuite,
) -> PipelineResult<TestResults> {
    let lanes = num_agents.max(1);
    let attempt_ids: Vec<String> = (0..lanes)
        .map(|_| Uuid::new_v4().simple().to_string()[..8].to_string())
        .collect();
    info!(
        component_id = %component.component_id,
        lanes,
        "racing competitive implementations"
    );

    let lane_futures = attempt_ids.iter().zip(1u32..).map(|(attempt_id, lane)| {
        run_one_competitor(
            store, agent, budget, component, contract, suite, attempt_id, lane,
        )
    });
    let attempts: Vec<ScoredAttempt> = futures::future::join_all(lane_futures)
        .await
        .into_iter()
        .collect::<PipelineResult<_>>()?;

    let Some((winner, losers)) = resolution::resolve(&attempts) else {
        return Ok(TestResults::default());
    };
    let summary = resolution::format_resolution_summary(winner, &losers);
    info!("\n{summary}");
    store.append_audit(
        "competitive_resolution",
        &format!(
            "{}: winner={} ({}/{} passed)",
            component.component_id,
            winner.attempt_id,
            winner.test_results.passed,
            winner.test_results.total
        ),
    )?;
    let results = winner.test_results.clone();
    store.promote_attempt(&component.component_id, &winner.attempt_id)?;
    Ok(results)
}

/// Single or competitive build for one component, per config.
pub async fn build_component(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
    config: &CovenantConfig,
    component: &Component,
    contract: &ComponentContract,
    suite: &ContractTestSuite,
) -> PipelineResult<TestResults> {
    if config.competitive_implementations {
        implement_component_competitive(
            store,
            agent,
            budget,
            config.competitive_agents,
            component,
            contract,
            suite,
        )
        .await
    } else {
        implement_component(
            store,
            agent,
            budget,
            config.max_implementation_attempts,
            component,
            contract,
            suite,
        )
        .await
    }
}

/// Implement every leaf component that still needs work, optionally
/// restricted to `targets`. Re-entry after a diagnosis only rebuilds what
/// the diagnosis reset; leaves already tested green are left alone.
///
/// Leaves without a contract or test suite are skipped with a warning;
/// decomposition should have authored both, so a skip means an earlier phase
/// was interrupted. Node statuses are written back into the tree and the
/// tree is saved before returning.
pub async fn implement_all(
    store: &ProjectStore,
    agent: &Arc<dyn PipelineAgent>,
    budget: &BudgetTracker,
    config: &CovenantConfig,
    tree: &mut DecompositionTree,
    targets: Option<&[String]>,
) -> PipelineResult<BTreeMap<String, TestResults>> {
    let mut work: Vec<(Component, ComponentContract, ContractTestSuite)> = Vec::new();
    for node in tree.leaves() {
        let component_id = node.component_id.as_str();
        if let Some(targets) = targets {
            if !targets.iter().any(|t| t == component_id) {
                continue;
            }
        }
        if !node.implementation_status.needs_work() {
            debug!(component_id, "already tested, skipping");
            continue;
        }
        let Some(contract) = store.load_contract(component_id)? else {
            warn!(component_id, "no contract, skipping implementation");
            continue;
        };
        let Some(suite) = store.load_test_suite(component_id)? else {
            warn!(component_id, "no test suite, skipping implementation");
            continue;
        };
        work.push((node.clone(), contract, suite));
    }

    let results: Vec<(String, TestResults)> = if config.parallel_components && work.len() > 1 {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_agents.max(1)));
        let mut handles = Vec::new();
        for (component, contract, suite) in work {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::AgentFailed("agent pool closed".to_string()))?;
            let store = store.clone();
            let agent = Arc::clone(agent);
            let budget = budget.clone();
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = build_component(
                    &store,
                    agent.as_ref(),
                    &budget,
                    &config,
                    &component,
                    &contract,
                    &suite,
                )
                .await;
                (component.component_id, outcome)
            }));
        }
        let mut results = Vec::new();
        for handle in handles {
            let (component_id, outcome) = handle.await.map_err(|e| {
                PipelineError::AgentFailed(format!("implementation task panicked: {e}"))
            })?;
            results.push((component_id, outcome?));
        }
        results
    } else {
        let mut results = Vec::new();
        for (component, contract, suite) in work {
            let outcome = build_component(
                store,
                agent.as_ref(),
                budget,
                config,
                &component,
                &contract,
                &suite,
            )
            .await?;
            results.push((component.component_id, outcome));
        }
        results
    };

    let mut by_component = BTreeMap::new();
    for (component_id, test_results) in results {
        if let Some(node) = tree.get_mut(&component_id) {
            node.implementation_status = if test_results.all_passed() {
                BuildStatus::Tested
            } else {
                BuildStatus::Failed
            };
            node.test_results = Some(test_results.clone());
        }
        by_component.insert(component_id, test_results);
    }
    store.save_tree(tree)?;
    Ok(by_component)
}
