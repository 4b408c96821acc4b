//! Interview and decompose-and-contract phase drivers.
//!
//! Decomposition is resumable: an existing tree on disk is reused, and
//! components that already have a contract and test suite on disk are
//! skipped, so a crashed or budget-stopped run picks up where it left off.
//! The phase ends at the mechanical validation gate; the scheduler decides
//! what a failed gate means for the run.

use tracing::{debug, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{BuildStatus, DecompositionTree, GateResult, InterviewResult};
use crate::domain::ports::PipelineAgent;
use crate::infrastructure::project::ProjectStore;
use crate::services::budget::BudgetTracker;
use crate::services::validator::ContractValidator;

/// Run the interview agent over the project task and persist the result.
///
/// The caller owns the flow decision: auto-approve when no questions came
/// back, or pause the run until a human answers.
pub async fn run_interview(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
) -> PipelineResult<InterviewResult> {
    let task = store.load_task()?;
    let outcome = agent.interview(&task).await?;
    budget.charge(&outcome.usage).await?;

    let interview = outcome.value;
    store.save_interview(&interview)?;
    store.append_audit(
        "interview",
        &format!("{} questions", interview.questions.len()),
    )?;
    info!(
        questions = interview.questions.len(),
        risks = interview.risks.len(),
        "interview complete"
    );
    Ok(interview)
}

/// Decompose the task into a component tree, author a contract and test
/// suite for every component in dependency order, then run the full
/// mechanical validation gate.
///
/// Returns the tree alongside the gate verdict; nothing downstream may run
/// off a failed gate.
pub async fn decompose_and_contract(
    store: &ProjectStore,
    agent: &dyn PipelineAgent,
    budget: &BudgetTracker,
    validator: &ContractValidator,
) -> PipelineResult<(DecompositionTree, GateResult)> {
    let task = store.load_task()?;
    let interview = store.load_interview()?.unwrap_or_default();

    let mut tree = match store.load_tree()? {
        Some(existing) if existing.len() > 1 => {
            debug!(components = existing.len(), "reusing existing decomposition");
            existing
        }
        _ => {
            let outcome = agent.decompose(&task, &interview).await?;
            budget.charge(&outcome.usage).await?;
            let tree = outcome.value;
            store.save_tree(&tree)?;
            store.append_audit("decomposition", &format!("{} components", tree.len()))?;
            info!(components = tree.len(), "task decomposed");
            tree
        }
    };

    for component_id in tree.topological_order() {
        let existing_contract = store.load_contract(&component_id)?;
        let has_suite = store.load_test_suite(&component_id)?.is_some();
        if existing_contract.is_some() && has_suite {
            debug!(%component_id, "contract and suite already authored");
            continue;
        }

        let contract = match existing_contract {
            Some(contract) => contract,
            None => {
                let node = tree
                    .get(&component_id)
                    .cloned()
                    .ok_or_else(|| PipelineError::ComponentNotFound(component_id.clone()))?;
                let outcome = agent.author_contract(&node, &tree).await?;
                budget.charge(&outcome.usage).await?;
                let contract = outcome.value;
                store.save_contract(&contract)?;
                store.append_audit(
                    "contract",
                    &format!("{component_id}: {} functions", contract.functions.len()),
                )?;
                if let Some(node) = tree.get_mut(&component_id) {
                    node.implementation_status = BuildStatus::Contracted;
                    node.contract = Some(contract.clone());
                }
                contract
            }
        };

        if !has_suite {
            let outcome = agent.author_test_suite(&contract).await?;
            budget.charge(&outcome.usage).await?;
            let suite = outcome.value;
            store.save_test_suite(&suite)?;
            store.append_audit(
                "tests",
                &format!("{component_id}: {} cases", suite.test_cases.len()),
            )?;
        }
    }
    store.save_tree(&tree)?;

    let contracts = store.load_all_contracts()?;
    let suites = store.load_all_test_suites()?;
    let gate = validator.validate_all_contracts(&tree, &contracts, &suites);
    store.append_audit(
        "validation",
        &format!(
            "{}: {}",
            if gate.passed { "PASSED" } else { "FAILED" },
            gate.reason
        ),
    )?;

    if gate.passed {
        for warning in validator.validate_hierarchy_locality(&tree, &contracts) {
            warn!(%warning, "locality advisory");
        }
    }

    Ok((tree, gate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Component;
    use crate::infrastructure::agents::ScriptedAgent;

    fn make_tree() -> DecompositionTree {
        let mut tree = DecompositionTree::new("root");
        tree.insert(
            Component::new("root", "Root", "top level")
                .with_child("leaf_a")
                .with_child("leaf_b"),
        );
        tree.insert(
            Component::new("leaf_a", "Leaf A", "")
                .with_depth(1)
                .with_parent("root"),
        );
        tree.insert(
            Component::new("leaf_b", "Leaf B", "")
                .with_depth(1)
                .with_parent("root"),
        );
        tree
    }

    fn make_store() -> (tempfile::TempDir, ProjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.init(10.0).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_decompose_authors_everything_and_passes_gate() {
        let (_dir, store) = make_store();
        let agent = ScriptedAgent::new(make_tree());
        let budget = BudgetTracker::new(10.0, 50.0);
        let validator = ContractValidator::new();

        let (tree, gate) = decompose_and_contract(&store, &agent, &budget, &validator)
            .await
            .unwrap();

        assert!(gate.passed, "gate errors: {:?}", gate.details);
        assert_eq!(tree.len(), 3);
        assert_eq!(store.load_all_contracts().unwrap().len(), 3);
        assert_eq!(store.load_all_test_suites().unwrap().len(), 3);
        // Contracted status survives persistence.
        let saved = store.load_tree().unwrap().unwrap();
        assert_eq!(
            saved.get("leaf_a").unwrap().implementation_status,
            BuildStatus::Contracted
        );
    }

    #[tokio::test]
    async fn test_decompose_skips_already_authored_components() {
        let (_dir, store) = make_store();
        let agent = ScriptedAgent::new(make_tree());
        let budget = BudgetTracker::new(10.0, 50.0);
        let validator = ContractValidator::new();

        decompose_and_contract(&store, &agent, &budget, &validator)
            .await
            .unwrap();
        let first_pass = store.load_contract("leaf_a").unwrap().unwrap();

        // Second run resumes: the audit log gains a validation entry but no
        // new contract entries.
        decompose_and_contract(&store, &agent, &budget, &validator)
            .await
            .unwrap();
        let audit = store.load_audit().unwrap();
        let contract_entries = audit.iter().filter(|e| e.action == "contract").count();
        assert_eq!(contract_entries, 3);
        let second_pass = store.load_contract("leaf_a").unwrap().unwrap();
        assert_eq!(first_pass, second_pass);
    }

    #[tokio::test]
    async fn test_interview_persists_result() {
        let (_dir, store) = make_store();
        let agent =
            ScriptedAgent::new(make_tree()).with_questions(vec!["Which database?".to_string()]);
        let budget = BudgetTracker::new(10.0, 50.0);

        let interview = run_interview(&store, &agent, &budget).await.unwrap();
        assert_eq!(interview.questions.len(), 1);
        assert!(!interview.approved);
        assert!(store.load_interview().unwrap().is_some());
        let audit = store.load_audit().unwrap();
        assert!(audit.iter().any(|e| e.action == "interview"));
    }
}
