//! Casual-pace run scheduler.
//!
//! A run advances in bursts: load the persisted state, do the work its
//! current phase calls for, save the state back. Everything between bursts
//! lives on disk, so the process can exit, crash, or sleep for hours and the
//! next burst picks up exactly where the last one stopped. Failures route
//! through the diagnose phase; blown budgets and design bugs are terminal.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{
    BuildStatus, ComponentTask, CovenantConfig, RecoveryAction, RunPhase, RunState, RunStatus,
    TaskStatus, TestResults,
};
use crate::domain::ports::PipelineAgent;
use crate::infrastructure::project::ProjectStore;
use crate::services::budget::{BudgetTracker, PricingTable};
use crate::services::validator::ContractValidator;
use crate::services::{decomposition, diagnoser, implementer, integrator};

/// How many components must fail the same way before the run stops to ask
/// for help instead of diagnosing them one by one.
const SYSTEMIC_FAILURE_THRESHOLD: usize = 3;

/// A failure shape shared across enough components to suggest one root
/// problem rather than several independent bugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemicPattern {
    pub pattern_type: String,
    pub affected_components: Vec<String>,
    pub sample_error: String,
    pub recommendation: String,
}

/// Look for a shared failure shape across failing components.
///
/// Checked in order: no tests ran at all, errors before any test passed,
/// then identical first-failure messages. Returns `None` below `threshold`.
pub fn detect_systemic_failure(
    results: &BTreeMap<String, TestResults>,
    threshold: usize,
) -> Option<SystemicPattern> {
    let failing: Vec<(&String, &TestResults)> = results
        .iter()
        .filter(|(_, r)| !r.all_passed())
        .collect();
    if failing.len() < threshold {
        return None;
    }

    let zero_tests: Vec<String> = failing
        .iter()
        .filter(|(_, r)| r.total == 0 && r.passed == 0)
        .map(|(cid, _)| (*cid).clone())
        .collect();
    if zero_tests.len() >= threshold {
        return Some(SystemicPattern {
            pattern_type: "zero_tests".to_string(),
            affected_components: zero_tests,
            sample_error: String::new(),
            recommendation: "Test harness produced no results; check test suite \
                             generation and runner wiring."
                .to_string(),
        });
    }

    let import_errors: Vec<(&String, &TestResults)> = failing
        .iter()
        .filter(|(_, r)| r.errors > 0 && r.passed == 0)
        .copied()
        .collect();
    if import_errors.len() >= threshold {
        let sample_error = import_errors
            .iter()
            .find_map(|(_, r)| r.failure_details.first())
            .map(|f| f.error_message.clone())
            .unwrap_or_default();
        return Some(SystemicPattern {
            pattern_type: "import_error".to_string(),
            affected_components: import_errors.iter().map(|(cid, _)| (*cid).clone()).collect(),
            sample_error,
            recommendation: "Implementations error before any test passes; check \
                             shared dependencies and the build environment."
                .to_string(),
        });
    }

    let mut by_message: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (cid, r) in &failing {
        if let Some(first) = r.failure_details.first() {
            if !first.error_message.is_empty() {
                by_message
                    .entry(first.error_message.as_str())
                    .or_default()
                    .push((*cid).clone());
            }
        }
    }
    for (message, components) in by_message {
        if components.len() >= threshold {
            return Some(SystemicPattern {
                pattern_type: "identical_failure".to_string(),
                affected_components: components,
                sample_error: message.to_string(),
                recommendation: "Multiple components fail identically; a shared \
                                 contract or fixture is likely wrong."
                    .to_string(),
            });
        }
    }
    None
}

/// Burst-based pipeline scheduler.
///
/// Owns the budget tracker and the validation gate; the agent arrives as a
/// trait object so the same scheduler drives scripted dry runs and real
/// backends alike.
pub struct Scheduler {
    store: ProjectStore,
    config: CovenantConfig,
    budget: BudgetTracker,
    agent: Arc<dyn PipelineAgent>,
    validator: ContractValidator,
}

impl Scheduler {
    pub fn new(store: ProjectStore, config: CovenantConfig, agent: Arc<dyn PipelineAgent>) -> Self {
        let pricing = PricingTable::default().with_overrides(config.model_pricing.clone());
        let budget =
            BudgetTracker::new(config.budget, config.daily_budget).with_model(&config.model, &pricing);
        let validator = ContractValidator::new().with_locality_radius(config.locality_radius);
        Self {
            store,
            config,
            budget,
            agent,
            validator,
        }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// One burst: do the current phase's work and persist the outcome.
    ///
    /// Any error that is not a blown budget fails the run; a blown budget
    /// gets its own terminal status so the operator can tell them apart.
    /// Spend totals and the heartbeat are synced to the state on every exit
    /// path.
    pub async fn run_once(&self) -> PipelineResult<RunState> {
        let mut state = self.store.load_state()?;
        if state.status.is_terminal() {
            debug!(run_id = %state.id, status = state.status.as_str(), "run already terminal");
            return Ok(state);
        }
        self.budget
            .restore(state.total_tokens, state.total_cost_usd)
            .await;

        match self.dispatch_burst(&mut state).await {
            Ok(()) => {}
            Err(err) if err.is_budget() => {
                warn!(run_id = %state.id, %err, "budget cap reached");
                state.status = RunStatus::BudgetExceeded;
                state.pause_reason = "Budget cap reached".to_string();
                state.completed_at = Some(Utc::now());
            }
            Err(err) => {
                error!(run_id = %state.id, %err, "burst failed");
                state.fail(format!("Unexpected error: {err}"));
            }
        }

        let (tokens_in, tokens_out) = self.budget.project_tokens().await;
        state.total_tokens = tokens_in + tokens_out;
        state.total_cost_usd = self.budget.project_spend().await;
        state.check_in();
        self.store.save_state(&state)?;
        Ok(state)
    }

    /// Burst repeatedly at the configured check interval until the run is
    /// terminal or paused for a human.
    pub async fn run_forever(&self) -> PipelineResult<RunState> {
        loop {
            let state = self.run_once().await?;
            if state.status.is_terminal() || state.status == RunStatus::Paused {
                info!(
                    run_id = %state.id,
                    status = state.status.as_str(),
                    "run stopped"
                );
                return Ok(state);
            }
            tokio::time::sleep(Duration::from_secs(self.config.check_interval.max(1))).await;
        }
    }

    async fn dispatch_burst(&self, state: &mut RunState) -> PipelineResult<()> {
        info!(run_id = %state.id, phase = state.phase.as_str(), "dispatching burst");
        match state.phase {
            RunPhase::Interview => self.burst_interview(state).await,
            RunPhase::Decompose => self.burst_decompose(state).await,
            RunPhase::Contract => {
                // Contracts are authored inside the decompose burst; this
                // phase only exists so resume-from-phase can name it.
                state.advance_phase();
                Ok(())
            }
            RunPhase::Implement => self.burst_implement(state).await,
            RunPhase::Integrate => self.burst_integrate(state).await,
            RunPhase::Diagnose => self.burst_diagnose(state).await,
            RunPhase::Complete => {
                state.complete();
                Ok(())
            }
        }
    }

    async fn burst_interview(&self, state: &mut RunState) -> PipelineResult<()> {
        if let Some(existing) = self.store.load_interview()? {
            if existing.approved {
                state.interview_result = Some(existing);
                state.advance_phase();
                return Ok(());
            }
        }

        let mut interview =
            decomposition::run_interview(&self.store, self.agent.as_ref(), &self.budget).await?;
        if interview.questions.is_empty() {
            interview.approved = true;
            self.store.save_interview(&interview)?;
            state.interview_result = Some(interview);
            state.advance_phase();
        } else {
            state.interview_result = Some(interview);
            state.pause("Interview questions pending - waiting for user answers");
        }
        Ok(())
    }

    async fn burst_decompose(&self, state: &mut RunState) -> PipelineResult<()> {
        let (tree, gate) = decomposition::decompose_and_contract(
            &self.store,
            self.agent.as_ref(),
            &self.budget,
            &self.validator,
        )
        .await?;

        if !gate.passed {
            state.fail(format!("Contract validation failed: {}", gate.reason));
            return Ok(());
        }

        state.component_tasks = tree
            .topological_order()
            .into_iter()
            .map(ComponentTask::new)
            .collect();
        if self.config.plan_only {
            state.pause("Plan-only mode: decomposition and contracts complete");
        } else {
            state.advance_phase();
            state.advance_phase();
        }
        Ok(())
    }

    async fn burst_implement(&self, state: &mut RunState) -> PipelineResult<()> {
        let Some(mut tree) = self.store.load_tree()? else {
            state.fail("No decomposition tree found");
            return Ok(());
        };

        let results = implementer::implement_all(
            &self.store,
            &self.agent,
            &self.budget,
            &self.config,
            &mut tree,
            None,
        )
        .await?;
        sync_component_tasks(state, &results);

        if let Some(pattern) = detect_systemic_failure(&results, SYSTEMIC_FAILURE_THRESHOLD) {
            self.record_systemic(state, &pattern)?;
            return Ok(());
        }

        let failed: Vec<String> = results
            .iter()
            .filter(|(_, r)| !r.all_passed())
            .map(|(cid, _)| cid.clone())
            .collect();
        if failed.is_empty() {
            state.advance_phase();
        } else {
            state.phase = RunPhase::Diagnose;
            state.pause_reason = format!("Components failed: {}", failed.join(", "));
        }
        Ok(())
    }

    async fn burst_integrate(&self, state: &mut RunState) -> PipelineResult<()> {
        let Some(mut tree) = self.store.load_tree()? else {
            state.fail("No decomposition tree found");
            return Ok(());
        };

        if tree.nodes.values().all(|n| n.is_leaf()) {
            state.advance_phase();
            state.complete();
            return Ok(());
        }

        let results = integrator::integrate_all(
            &self.store,
            self.agent.as_ref(),
            &self.budget,
            &self.config,
            &mut tree,
        )
        .await?;
        sync_component_tasks(state, &results);

        let failed: Vec<String> = results
            .iter()
            .filter(|(_, r)| !r.all_passed())
            .map(|(cid, _)| cid.clone())
            .collect();
        if failed.is_empty() {
            state.advance_phase();
            state.complete();
        } else {
            state.phase = RunPhase::Diagnose;
            state.pause_reason = format!("Integration failed: {}", failed.join(", "));
        }
        Ok(())
    }

    async fn burst_diagnose(&self, state: &mut RunState) -> PipelineResult<()> {
        state.phase_cycles += 1;
        if state.phase_cycles > self.config.max_phase_cycles {
            state.pause(format!(
                "Phase cycle limit reached ({} diagnose cycles, max={}). Human review required.",
                state.phase_cycles, self.config.max_phase_cycles
            ));
            return Ok(());
        }

        let Some(mut tree) = self.store.load_tree()? else {
            state.fail("No tree for diagnosis");
            return Ok(());
        };

        let failed_nodes: Vec<_> = tree
            .nodes
            .values()
            .filter(|n| {
                n.implementation_status == BuildStatus::Failed && n.test_results.is_some()
            })
            .cloned()
            .collect();
        if failed_nodes.is_empty() {
            // Nothing is actually red (a resume can land here); rejoin the
            // main sequence.
            state.advance_phase();
            return Ok(());
        }

        if failed_nodes.len() >= SYSTEMIC_FAILURE_THRESHOLD {
            let by_component: BTreeMap<String, TestResults> = failed_nodes
                .iter()
                .filter_map(|n| {
                    n.test_results
                        .clone()
                        .map(|r| (n.component_id.clone(), r))
                })
                .collect();
            if let Some(pattern) =
                detect_systemic_failure(&by_component, SYSTEMIC_FAILURE_THRESHOLD)
            {
                self.record_systemic(state, &pattern)?;
                return Ok(());
            }
        }

        for node in &failed_nodes {
            let Some(results) = &node.test_results else {
                continue;
            };
            let Some(diagnosis) = diagnoser::diagnose_failure(
                &self.store,
                self.agent.as_ref(),
                &self.budget,
                node,
                results,
            )
            .await?
            else {
                continue;
            };

            match diagnosis.recovery_action() {
                RecoveryAction::Reimplement => {
                    if let Some(n) = tree.get_mut(&node.component_id) {
                        n.implementation_status = BuildStatus::Pending;
                    }
                    state.phase = RunPhase::Implement;
                }
                RecoveryAction::Reglue => {
                    if let Some(n) = tree.get_mut(&node.component_id) {
                        n.implementation_status = BuildStatus::Pending;
                    }
                    state.phase = RunPhase::Integrate;
                }
                RecoveryAction::UpdateContract => {
                    state.phase = RunPhase::Decompose;
                }
                RecoveryAction::Redesign => {
                    state.fail(format!(
                        "Design bug in {}: requires human intervention",
                        node.component_id
                    ));
                    self.store.save_tree(&tree)?;
                    return Ok(());
                }
            }
        }
        state.pause_reason.clear();
        self.store.save_tree(&tree)?;
        Ok(())
    }

    fn record_systemic(&self, state: &mut RunState, pattern: &SystemicPattern) -> PipelineResult<()> {
        state.pause(format!(
            "Systemic failure detected: {} across {} components",
            pattern.pattern_type,
            pattern.affected_components.len()
        ));
        self.store.append_audit(
            "systemic_failure",
            &format!("{}: {}", pattern.pattern_type, pattern.recommendation),
        )?;
        Ok(())
    }

    /// Rebuild one component on demand, archiving the current implementation
    /// first. Used by the operator to redo a single component without
    /// touching the rest of the run.
    pub async fn build_component(
        &self,
        component_id: &str,
        competitive: bool,
        num_agents: usize,
    ) -> PipelineResult<TestResults> {
        let mut state = self.store.load_state()?;
        self.budget
            .restore(state.total_tokens, state.total_cost_usd)
            .await;

        let mut tree = self.store.load_tree()?.ok_or(PipelineError::TreeNotFound)?;
        let component = tree
            .get(component_id)
            .cloned()
            .ok_or_else(|| PipelineError::ComponentNotFound(component_id.to_string()))?;
        let contract = self.store.load_contract(component_id)?.ok_or_else(|| {
            PipelineError::ValidationFailed(format!("Component '{component_id}' has no contract"))
        })?;
        let suite = self.store.load_test_suite(component_id)?.ok_or_else(|| {
            PipelineError::ValidationFailed(format!("Component '{component_id}' has no test suite"))
        })?;

        if let Some(archive_id) = self
            .store
            .archive_current_impl(component_id, "Rebuilt via build")?
        {
            self.store
                .append_audit("archive", &format!("{component_id}: archived as {archive_id}"))?;
        }

        let results = if competitive {
            implementer::implement_component_competitive(
                &self.store,
                self.agent.as_ref(),
                &self.budget,
                num_agents,
                &component,
                &contract,
                &suite,
            )
            .await?
        } else {
            implementer::implement_component(
                &self.store,
                self.agent.as_ref(),
                &self.budget,
                self.config.max_implementation_attempts,
                &component,
                &contract,
                &suite,
            )
            .await?
        };

        if let Some(node) = tree.get_mut(component_id) {
            node.implementation_status = if results.all_passed() {
                BuildStatus::Tested
            } else {
                BuildStatus::Failed
            };
            node.test_results = Some(results.clone());
        }
        self.store.save_tree(&tree)?;

        let mut detail = format!(
            "{component_id}: {}/{} passed",
            results.passed, results.total
        );
        if competitive {
            detail.push_str(&format!(" (competitive, {num_agents} agents)"));
        }
        self.store.append_audit("build", &detail)?;

        let (tokens_in, tokens_out) = self.budget.project_tokens().await;
        state.total_tokens = tokens_in + tokens_out;
        state.total_cost_usd = self.budget.project_spend().await;
        self.store.save_state(&state)?;
        Ok(results)
    }
}

/// Mirror per-component outcomes into the run state's task trackers.
fn sync_component_tasks(state: &mut RunState, results: &BTreeMap<String, TestResults>) {
    for (component_id, test_results) in results {
        if let Some(task) = state.task_mut(component_id) {
            task.attempts += 1;
            if test_results.all_passed() {
                task.status = TaskStatus::Completed;
                task.last_error.clear();
            } else {
                task.status = TaskStatus::Failed;
                task.last_error = test_results
                    .failure_details
                    .first()
                    .map(|f| f.error_message.clone())
                    .unwrap_or_default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Component, DecompositionTree, TestFailure};
    use crate::infrastructure::agents::ScriptedAgent;

    fn failing(message: &str) -> TestResults {
        TestResults {
            total: 3,
            passed: 1,
            failed: 2,
            errors: 0,
            failure_details: vec![TestFailure {
                test_id: "t1".into(),
                error_message: message.to_string(),
                ..TestFailure::default()
            }],
        }
    }

    #[test]
    fn test_systemic_below_threshold_is_none() {
        let results: BTreeMap<String, TestResults> = [
            ("a".to_string(), failing("boom")),
            ("b".to_string(), failing("boom")),
            ("c".to_string(), TestResults::passing(3)),
        ]
        .into();
        assert!(detect_systemic_failure(&results, 3).is_none());
    }

    #[test]
    fn test_systemic_zero_tests() {
        let results: BTreeMap<String, TestResults> = ["a", "b", "c"]
            .into_iter()
            .map(|cid| (cid.to_string(), TestResults::default()))
            .collect();
        let pattern = detect_systemic_failure(&results, 3).unwrap();
        assert_eq!(pattern.pattern_type, "zero_tests");
        assert_eq!(pattern.affected_components, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_systemic_import_error() {
        let errored = TestResults {
            total: 3,
            passed: 0,
            failed: 0,
            errors: 3,
            failure_details: vec![TestFailure {
                test_id: "t1".into(),
                error_message: "cannot find crate `serde`".into(),
                ..TestFailure::default()
            }],
        };
        let results: BTreeMap<String, TestResults> = ["a", "b", "c"]
            .into_iter()
            .map(|cid| (cid.to_string(), errored.clone()))
            .collect();
        let pattern = detect_systemic_failure(&results, 3).unwrap();
        assert_eq!(pattern.pattern_type, "import_error");
        assert!(pattern.sample_error.contains("serde"));
    }

    #[test]
    fn test_systemic_identical_failures() {
        let results: BTreeMap<String, TestResults> = [
            ("a".to_string(), failing("assertion failed: left == right")),
            ("b".to_string(), failing("assertion failed: left == right")),
            ("c".to_string(), failing("assertion failed: left == right")),
            ("d".to_string(), failing("something else")),
        ]
        .into();
        let pattern = detect_systemic_failure(&results, 3).unwrap();
        assert_eq!(pattern.pattern_type, "identical_failure");
        assert_eq!(pattern.affected_components.len(), 3);
        assert_eq!(pattern.sample_error, "assertion failed: left == right");
    }

    #[test]
    fn test_distinct_failures_are_not_systemic() {
        let results: BTreeMap<String, TestResults> = [
            ("a".to_string(), failing("first")),
            ("b".to_string(), failing("second")),
            ("c".to_string(), failing("third")),
        ]
        .into();
        assert!(detect_systemic_failure(&results, 3).is_none());
    }

    fn make_tree() -> DecompositionTree {
        let mut tree = DecompositionTree::new("root");
        tree.insert(
            Component::new("root", "Root", "")
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

    fn make_scheduler(agent: ScriptedAgent) -> (tempfile::TempDir, Scheduler) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.init(10.0).unwrap();
        store.create_run().unwrap();
        let scheduler = Scheduler::new(store, CovenantConfig::default(), Arc::new(agent));
        (dir, scheduler)
    }

    #[tokio::test]
    async fn test_happy_path_completes_in_four_bursts() {
        let (_dir, scheduler) = make_scheduler(ScriptedAgent::new(make_tree()));

        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.phase, RunPhase::Decompose);
        assert_eq!(state.status, RunStatus::Active);

        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.phase, RunPhase::Implement);
        assert_eq!(state.component_tasks.len(), 3);

        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.phase, RunPhase::Integrate);

        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.completed_at.is_some());
        assert!(state
            .component_tasks
            .iter()
            .all(|t| t.status == TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_questions_pause_the_run() {
        let agent = ScriptedAgent::new(make_tree())
            .with_questions(vec!["Which database?".to_string()]);
        let (_dir, scheduler) = make_scheduler(agent);

        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.status, RunStatus::Paused);
        assert_eq!(state.phase, RunPhase::Interview);
        assert!(state.pause_reason.contains("Interview questions pending"));
        assert_eq!(
            state.interview_result.as_ref().unwrap().questions.len(),
            1
        );

        // A burst on a paused-then-resumed run with an approved interview
        // moves on without re-interviewing.
        let mut interview = scheduler.store().load_interview().unwrap().unwrap();
        interview.approved = true;
        scheduler.store().save_interview(&interview).unwrap();
        let mut state = scheduler.store().load_state().unwrap();
        state.resume();
        scheduler.store().save_state(&state).unwrap();

        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.phase, RunPhase::Decompose);
        assert_eq!(state.status, RunStatus::Active);
    }

    #[tokio::test]
    async fn test_failed_leaf_detours_to_diagnose_and_recovers() {
        let agent = ScriptedAgent::new(make_tree()).with_failing_times("leaf_b", 3);
        let (_dir, scheduler) = make_scheduler(agent);

        scheduler.run_once().await.unwrap(); // interview
        scheduler.run_once().await.unwrap(); // decompose
        let state = scheduler.run_once().await.unwrap(); // implement, 3 attempts all red
        assert_eq!(state.phase, RunPhase::Diagnose);
        assert_eq!(state.status, RunStatus::Active);
        assert!(state.pause_reason.contains("Components failed: leaf_b"));

        let state = scheduler.run_once().await.unwrap(); // diagnose -> reimplement
        assert_eq!(state.phase, RunPhase::Implement);
        assert_eq!(state.phase_cycles, 1);

        let state = scheduler.run_once().await.unwrap(); // implement, now green
        assert_eq!(state.phase, RunPhase::Integrate);

        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_cycle_limit_pauses_for_humans() {
        let agent = ScriptedAgent::new(make_tree()).with_failing("leaf_b");
        let (_dir, scheduler) = make_scheduler(agent);

        scheduler.run_once().await.unwrap(); // interview
        scheduler.run_once().await.unwrap(); // decompose
        let mut state = scheduler.run_once().await.unwrap(); // implement
        assert_eq!(state.phase, RunPhase::Diagnose);

        // Diagnose and reimplement cycles until the cap trips.
        loop {
            state = scheduler.run_once().await.unwrap();
            if state.status == RunStatus::Paused {
                break;
            }
            assert!(state.phase_cycles <= 4);
        }
        assert!(state.pause_reason.contains("Phase cycle limit reached"));
        assert_eq!(state.phase_cycles, 4);
    }

    #[tokio::test]
    async fn test_design_bug_fails_the_run() {
        use crate::domain::models::RootCause;

        let agent = ScriptedAgent::new(make_tree())
            .with_failing("root")
            .with_diagnosis(RootCause::DesignBug);
        let (_dir, scheduler) = make_scheduler(agent);

        scheduler.run_once().await.unwrap(); // interview
        scheduler.run_once().await.unwrap(); // decompose
        scheduler.run_once().await.unwrap(); // implement (leaves pass)
        let state = scheduler.run_once().await.unwrap(); // integrate, root red
        assert_eq!(state.phase, RunPhase::Diagnose);

        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.pause_reason.contains("Design bug in root"));
    }

    #[tokio::test]
    async fn test_terminal_run_is_left_alone() {
        let (_dir, scheduler) = make_scheduler(ScriptedAgent::new(make_tree()));
        let mut state = scheduler.store().load_state().unwrap();
        state.complete();
        scheduler.store().save_state(&state).unwrap();
        let before = scheduler.store().load_state().unwrap();

        let after = scheduler.run_once().await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_terminal() {
        use crate::domain::ports::AgentUsage;

        let agent = ScriptedAgent::new(make_tree()).with_usage(AgentUsage::new(0, 0, 6.0));
        let (_dir, scheduler) = make_scheduler(agent);

        // Interview charges $6 of the $10 default cap.
        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.status, RunStatus::Active);
        assert!((state.total_cost_usd - 6.0).abs() < 1e-9);

        // The decompose burst blows the cap partway through.
        let state = scheduler.run_once().await.unwrap();
        assert_eq!(state.status, RunStatus::BudgetExceeded);
        assert_eq!(state.pause_reason, "Budget cap reached");
        assert!(state.completed_at.is_some());
        assert!(state.total_cost_usd > 10.0);
    }

    #[tokio::test]
    async fn test_build_component_archives_and_rebuilds() {
        let (_dir, scheduler) = make_scheduler(ScriptedAgent::new(make_tree()));
        for _ in 0..4 {
            scheduler.run_once().await.unwrap();
        }
        assert_eq!(
            scheduler.store().load_state().unwrap().status,
            RunStatus::Completed
        );

        let results = scheduler.build_component("leaf_a", false, 0).await.unwrap();
        assert!(results.all_passed());
        let audit = scheduler.store().load_audit().unwrap();
        assert!(audit.iter().any(|e| e.action == "archive"));
        assert!(audit
            .iter()
            .any(|e| e.action == "build" && e.detail == "leaf_a: 3/3 passed"));
        // The old implementation survives as an archived attempt.
        let attempts = scheduler.store().list_attempts("leaf_a").unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].attempt_id.starts_with("archived_"));
    }
}
