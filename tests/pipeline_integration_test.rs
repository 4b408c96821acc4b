//! End-to-end pipeline tests over a real project directory
//!
//! Scheduler -> phase drivers -> ProjectStore, burst by burst, asserting the
//! artifacts each phase leaves on disk rather than just the in-memory state.
//!
//! ## Test Coverage
//! 1. Full run from interview to completion with every artifact persisted
//! 2. Interview pause, operator answers through the store, resumed run
//! 3. Competitive implementation racing driven by config
//! 4. Plan-only mode stopping at the validation gate
//! 5. State reset producing a clean second run
//! 6. Scripted plans derived from the operator's task file
//! 7. Single-component rebuild archiving the previous implementation

use std::fs;
use std::sync::Arc;

use covenant::domain::models::{
    AttemptKind, BuildStatus, Component, CovenantConfig, DecompositionTree, RunPhase, RunState,
    RunStatus, TaskStatus,
};
use covenant::domain::ports::AgentUsage;
use covenant::infrastructure::agents::{plan_from_task, ScriptedAgent};
use covenant::infrastructure::ProjectStore;
use covenant::services::Scheduler;

// ============================================================================
// Test Helpers
// ============================================================================

/// root -> (leaf_a, leaf_b): the smallest tree that exercises both the
/// implement and the integrate phase.
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

/// Initialized project with a fresh run and a scheduler over `agent`.
fn setup(agent: ScriptedAgent, config: CovenantConfig) -> (tempfile::TempDir, Scheduler) {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(dir.path());
    store.init(10.0).unwrap();
    store.create_run().unwrap();
    let scheduler = Scheduler::new(store, config, Arc::new(agent));
    (dir, scheduler)
}

/// Burst until the run stops moving (terminal or paused), with a hard cap so
/// a stuck run fails the test instead of hanging it.
async fn drive(scheduler: &Scheduler) -> RunState {
    for _ in 0..12 {
        let state = scheduler.run_once().await.unwrap();
        if state.status.is_terminal() || state.status == RunStatus::Paused {
            return state;
        }
    }
    panic!("run did not settle within 12 bursts");
}

// ============================================================================
// Test 1: Full run, every artifact persisted
// ============================================================================

#[tokio::test]
async fn test_full_run_persists_every_artifact() {
    let agent = ScriptedAgent::new(make_tree()).with_usage(AgentUsage::new(800, 200, 0.01));
    let (_dir, scheduler) = setup(agent, CovenantConfig::default());

    let state = drive(&scheduler).await;

    assert_eq!(state.status, RunStatus::Completed);
    assert!(state.completed_at.is_some());
    assert!(state.total_cost_usd > 0.0);
    assert!(state.total_tokens > 0);
    assert!(state
        .component_tasks
        .iter()
        .all(|t| t.status == TaskStatus::Completed));

    // The state on disk is the state we got back.
    let store = scheduler.store();
    assert_eq!(store.load_state().unwrap(), state);

    // The tree carries final statuses for every component.
    let tree = store.load_tree().unwrap().unwrap();
    assert_eq!(tree.len(), 3);
    for id in ["root", "leaf_a", "leaf_b"] {
        assert_eq!(
            tree.get(id).unwrap().implementation_status,
            BuildStatus::Tested
        );
    }

    // Contract, test suite, and runnable test code per component.
    assert_eq!(store.load_all_contracts().unwrap().len(), 3);
    assert_eq!(store.load_all_test_suites().unwrap().len(), 3);
    assert!(store.test_code_path("leaf_a").exists());

    // Leaf sources and the root's integration glue.
    for id in ["leaf_a", "leaf_b"] {
        assert!(store.impl_src_path(id).join("lib.rs").exists());
        assert!(store.load_test_results(id).unwrap().unwrap().all_passed());
    }
    assert!(store
        .composition_dir("root")
        .unwrap()
        .join("glue.rs")
        .exists());
    assert!(store
        .load_composition_results("root")
        .unwrap()
        .unwrap()
        .all_passed());

    // Every phase left its mark in the audit log.
    let audit = store.load_audit().unwrap();
    for action in [
        "interview",
        "decomposition",
        "contract",
        "tests",
        "validation",
        "implementation",
        "test_run",
        "integration",
    ] {
        assert!(
            audit.iter().any(|e| e.action == action),
            "missing audit action {action}"
        );
    }
}

// ============================================================================
// Test 2: Interview answered through the store
// ============================================================================

#[tokio::test]
async fn test_interview_answers_recorded_and_run_resumes() {
    let agent =
        ScriptedAgent::new(make_tree()).with_questions(vec!["Which storage format?".to_string()]);
    let (_dir, scheduler) = setup(agent, CovenantConfig::default());

    let state = drive(&scheduler).await;
    assert_eq!(state.status, RunStatus::Paused);
    assert_eq!(state.phase, RunPhase::Interview);

    // The interview is on disk for a separate operator process to answer.
    let store = scheduler.store();
    let mut interview = store.load_interview().unwrap().unwrap();
    assert_eq!(interview.questions, ["Which storage format?"]);
    assert!(!interview.approved);

    // Answer and approve the way the answer command does, then resume.
    interview
        .user_answers
        .insert("Which storage format?".to_string(), "JSON on disk".to_string());
    interview.approved = true;
    store.save_interview(&interview).unwrap();
    let mut paused = store.load_state().unwrap();
    paused.resume();
    store.save_state(&paused).unwrap();

    let state = drive(&scheduler).await;
    assert_eq!(state.status, RunStatus::Completed);
    let recorded = state.interview_result.unwrap();
    assert!(recorded.approved);
    assert_eq!(recorded.user_answers["Which storage format?"], "JSON on disk");
}

// ============================================================================
// Test 3: Competitive racing from config
// ============================================================================

#[tokio::test]
async fn test_competitive_config_races_and_promotes_winners() {
    let agent = ScriptedAgent::new(make_tree());
    let config = CovenantConfig {
        competitive_implementations: true,
        competitive_agents: 3,
        ..CovenantConfig::default()
    };
    let (_dir, scheduler) = setup(agent, config);

    let state = drive(&scheduler).await;
    assert_eq!(state.status, RunStatus::Completed);

    let store = scheduler.store();
    for id in ["leaf_a", "leaf_b"] {
        // All lanes stay on disk; the winner also became canonical.
        let attempts = store.list_attempts(id).unwrap();
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|a| {
            a.metadata
                .as_ref()
                .is_some_and(|m| m.kind == AttemptKind::Competitive)
        }));
        assert!(store.impl_src_path(id).join("lib.rs").exists());
        assert!(store.load_test_results(id).unwrap().unwrap().all_passed());
    }
    let audit = store.load_audit().unwrap();
    assert_eq!(
        audit
            .iter()
            .filter(|e| e.action == "competitive_resolution")
            .count(),
        2
    );
}

// ============================================================================
// Test 4: Plan-only mode
// ============================================================================

#[tokio::test]
async fn test_plan_only_stops_at_the_validation_gate() {
    let agent = ScriptedAgent::new(make_tree());
    let config = CovenantConfig {
        plan_only: true,
        ..CovenantConfig::default()
    };
    let (_dir, scheduler) = setup(agent, config);

    let state = drive(&scheduler).await;

    assert_eq!(state.status, RunStatus::Paused);
    assert_eq!(state.phase, RunPhase::Decompose);
    assert!(state.pause_reason.contains("Plan-only"));

    // Contracts and suites exist; no implementation was attempted.
    let store = scheduler.store();
    assert_eq!(store.load_all_contracts().unwrap().len(), 3);
    assert_eq!(store.load_all_test_suites().unwrap().len(), 3);
    assert!(!store.impl_src_path("leaf_a").exists());
    assert!(store.load_test_results("leaf_a").unwrap().is_none());
    // Tasks are registered for an eventual real run.
    assert_eq!(state.component_tasks.len(), 3);
}

// ============================================================================
// Test 5: State reset
// ============================================================================

#[tokio::test]
async fn test_state_reset_gives_a_clean_second_run() {
    let agent = ScriptedAgent::new(make_tree());
    let (_dir, scheduler) = setup(agent, CovenantConfig::default());
    let first = drive(&scheduler).await;
    assert_eq!(first.status, RunStatus::Completed);

    let store = scheduler.store();
    store.clear_state().unwrap();
    assert!(!store.has_state());
    assert!(store.load_tree().unwrap().is_none());
    assert!(store.load_all_contracts().unwrap().is_empty());
    // User files survive the reset.
    assert!(store.task_path().exists());
    assert!(store.config_path().exists());

    let second = store.create_run().unwrap();
    assert_ne!(second.id, first.id);
    let state = drive(&scheduler).await;
    assert_eq!(state.status, RunStatus::Completed);
    // The audit log restarted with the new run.
    let interviews = store
        .load_audit()
        .unwrap()
        .iter()
        .filter(|e| e.action == "interview")
        .count();
    assert_eq!(interviews, 1);
}

// ============================================================================
// Test 6: Plans derived from the task file
// ============================================================================

#[tokio::test]
async fn test_plan_from_task_builds_what_the_operator_listed() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(dir.path());
    store.init(5.0).unwrap();
    fs::write(
        store.task_path(),
        "# Task\n\nBuild a tiny feed digester.\n\n\
         - Fetch configured feeds\n\
         - Parse entries into records\n\
         - Render a digest page\n",
    )
    .unwrap();
    store.create_run().unwrap();

    let plan = plan_from_task(&store.load_task().unwrap());
    assert_eq!(plan.root_id, "app");
    assert_eq!(plan.len(), 4);
    assert!(plan.get("fetch_configured_feeds").is_some());
    assert!(plan.get("parse_entries_into").is_some());
    assert!(plan.get("render_a_digest").is_some());

    let scheduler = Scheduler::new(
        store,
        CovenantConfig::default(),
        Arc::new(ScriptedAgent::new(plan)),
    );
    let state = drive(&scheduler).await;
    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(state.component_tasks.len(), 4);

    let tree = scheduler.store().load_tree().unwrap().unwrap();
    assert_eq!(tree.children_of("app").len(), 3);
}

// ============================================================================
// Test 7: Rebuild with archive
// ============================================================================

#[tokio::test]
async fn test_rebuild_competitively_archives_the_previous_sources() {
    let agent = ScriptedAgent::new(make_tree());
    let (_dir, scheduler) = setup(agent, CovenantConfig::default());
    let state = drive(&scheduler).await;
    assert_eq!(state.status, RunStatus::Completed);

    let results = scheduler.build_component("leaf_b", true, 2).await.unwrap();
    assert!(results.all_passed());

    let store = scheduler.store();
    let attempts = store.list_attempts("leaf_b").unwrap();
    // One archive of the original sources plus two competitive lanes.
    assert_eq!(attempts.len(), 3);
    let archived: Vec<_> = attempts
        .iter()
        .filter(|a| a.attempt_id.starts_with("archived_"))
        .collect();
    assert_eq!(archived.len(), 1);
    assert!(archived[0]
        .metadata
        .as_ref()
        .is_some_and(|m| m.kind == AttemptKind::Archived));
    assert!(archived[0].path.join("src").join("lib.rs").exists());

    // Canonical sources are the promoted winner, not archive leftovers.
    assert!(store.impl_src_path("leaf_b").join("lib.rs").exists());
    let audit = store.load_audit().unwrap();
    assert!(audit
        .iter()
        .any(|e| e.action == "archive" && e.detail.starts_with("leaf_b")));
    assert!(audit
        .iter()
        .any(|e| e.action == "build" && e.detail.contains("(competitive, 2 agents)")));
}
