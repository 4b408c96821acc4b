//! Integration phase driver.
//!
//! Non-leaf components get glued together from their children's promoted
//! implementations and tested against the parent contract. Order matters:
//! groups run deepest first so children are always integrated before their
//! parents. Sequential mode degrades each group to a single component.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{
    BuildStatus, Component, CovenantConfig, DecompositionTree, TestResults,
};
use crate::domain::ports::PipelineAgent;
use crate::infrastructure::project::ProjectStore;
use crate::services::budget::BudgetTracker;

/// Glue one non-leaf component's children together and run the parent's
/// contract tests, retrying up to `max_attempts`. Results land in the
/// composition directory; the last run's results are returned, green or not.
pub async fn integrate_component(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
    max_attempts: u32,
    component: &Component,
    tree: &DecompositionTree,
) -> PipelineResult<TestResults> {
    let component_id = &component.component_id;
    let workdir = store.composition_dir(component_id)?;
    let mut last_results = TestResults::default();

    for attempt in 1..=max_attempts.max(1) {
        let outcome = agent.integrate(component, tree, &workdir).await?;
        budget.charge(&outcome.usage).await?;
        let results = outcome.value;

        store.append_audit(
            "integration",
            &format!("{component_id} attempt {attempt}"),
        )?;
        store.save_composition_results(component_id, &results)?;

        if results.all_passed() {
            info!(component_id = %component_id, attempt, "integration passed");
            return Ok(results);
        }
        warn!(
            component_id = %component_id,
            attempt,
            failed = results.failed,
            "integration attempt did not pass"
        );
        last_results = results;
    }
    Ok(last_results)
}

/// Integrate every non-leaf component that still needs work, deepest first.
///
/// Components in the same depth group integrate concurrently when parallel
/// mode is on; otherwise every component gets its own group in dependency
/// order. Node statuses are written back and the tree saved.
pub async fn integrate_all(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
    config: &CovenantConfig,
    tree: &mut DecompositionTree,
) -> PipelineResult<BTreeMap<String, TestResults>> {
    let groups: Vec<Vec<String>> = if config.parallel_components {
        tree.non_leaf_parallel_groups()
    } else {
        tree.topological_order()
            .into_iter()
            .filter(|cid| tree.get(cid).is_some_and(|n| !n.is_leaf()))
            .map(|cid| vec![cid])
            .collect()
    };

    let mut by_component = BTreeMap::new();
    for group in groups {
        let mut work: Vec<Component> = Vec::new();
        for component_id in &group {
            let Some(node) = tree.get(component_id) else {
                continue;
            };
            if !node.implementation_status.needs_work() {
                debug!(component_id = %component_id, "already integrated, skipping");
                continue;
            }
            if store.load_contract(component_id)?.is_none() {
                warn!(component_id = %component_id, "no contract, skipping integration");
                continue;
            }
            if store.load_test_suite(component_id)?.is_none() {
                warn!(component_id = %component_id, "no test suite, skipping integration");
                continue;
            }
            work.push(node.clone());
        }

        let group_futures = work.iter().map(|component| async {
            let results = integrate_component(
                store,
                agent,
                budget,
                config.max_implementation_attempts,
                component,
                tree,
            )
            .await?;
            Ok::<_, PipelineError>((component.component_id.clone(), results))
        });
        let outcomes: Vec<(String, TestResults)> = futures::future::join_all(group_futures)
            .await
            .into_iter()
            .collect::<PipelineResult<_>>()?;

        for (component_id, results) in outcomes {
            if let Some(node) = tree.get_mut(&component_id) {
                node.implementation_status = if results.all_passed() {
                    BuildStatus::Tested
                } else {
                    BuildStatus::Failed
                };
                node.test_results = Some(results.clone());
            }
            by_component.insert(component_id, results);
        }
    }
    store.save_tree(tree)?;
    Ok(by_component)
}
