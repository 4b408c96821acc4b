//! Failure diagnosis driver.
//!
//! Leaves get a mechanical verdict with no agent call: a leaf that fails its
//! own contract tests is an implementation bug, nothing else can be wrong.
//! Non-leaf failures are genuinely ambiguous (glue, contract, or design) and
//! go to the agent for classification.

use tracing::info;

use crate::domain::errors::PipelineResult;
use crate::domain::models::{Component, Diagnosis, RootCause, TestFailure, TestResults};
use crate::domain::ports::PipelineAgent;
use crate::infrastructure::project::ProjectStore;
use crate::services::budget::BudgetTracker;

/// Classify one component's failing test run into a root cause.
///
/// Returns `None` when there is nothing to diagnose: the run was green, or
/// the component has no contract to judge it against.
pub async fn diagnose_failure(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
    component: &Component,
    results: &TestResults,
) -> PipelineResult<Option<Diagnosis>> {
    if results.all_passed() {
        return Ok(None);
    }
    let component_id = &component.component_id;
    if store.load_contract(component_id)?.is_none() {
        return Ok(None);
    }

    let failing = results
        .failure_details
        .first()
        .cloned()
        .unwrap_or_else(|| TestFailure {
            test_id: "aggregate".to_string(),
            test_description: format!("{} tests failed", results.failed),
            ..TestFailure::default()
        });

    let diagnosis = if component.is_leaf() {
        Diagnosis {
            failing_test: failing.test_id.clone(),
            root_cause: RootCause::ImplementationBug,
            component_id: component_id.clone(),
            explanation: format!(
                "Component '{component_id}' failed {} of {} contract tests. \
                 Since this is a leaf component, the implementation does not \
                 match the contract.",
                results.failed + results.errors,
                results.total
            ),
            suggested_fix: "Re-implement with fresh context, focusing on the failing tests."
                .to_string(),
        }
    } else {
        let outcome = agent
            .diagnose(component_id, &failing.test_id, &failing.error_message)
            .await?;
        budget.charge(&outcome.usage).await?;
        outcome.value
    };

    let explanation_head: String = diagnosis.explanation.chars().take(100).collect();
    store.append_audit(
        "diagnosis",
        &format!(
            "{component_id}: {} - {explanation_head}",
            diagnosis.root_cause.as_str()
        ),
    )?;
    info!(
        component_id = %component_id,
        root_cause = diagnosis.root_cause.as_str(),
        action = diagnosis.recovery_action().as_str(),
        "failure diagnosed"
    );
    Ok(Some(diagnosis))
}
