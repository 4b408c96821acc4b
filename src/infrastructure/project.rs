//! Filesystem persistence for a covenant project.
//!
//! All pipeline state lives under `<project>/.covenant/` as plain JSON so
//! that a run can be inspected, diffed, and resumed with ordinary tools.
//! Layout:
//!
//! ```text
//! project/
//!   task.md                 task description (user-authored)
//!   .covenant.yaml          project config overrides
//!   .covenant/
//!     state.json            RunState for the current run
//!     audit.jsonl           append-only action log
//!     decomposition/        tree.json, interview.json
//!     contracts/<id>/       interface.json, history/, tests/
//!     implementations/<id>/ src/, metadata.json, test_results.json, attempts/
//!     compositions/<id>/    integration workspaces
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{
    AttemptMetadata, AttemptRecord, ComponentContract, ContractTestSuite, DecompositionTree,
    InterviewResult, RunState, TestResults,
};

/// Name of the state directory inside a project.
pub const STATE_DIR_NAME: &str = ".covenant";

/// Name of the project-local config file read by the config loader.
pub const CONFIG_FILE_NAME: &str = ".covenant.yaml";

const STATE_FILE: &str = "state.json";
const AUDIT_FILE: &str = "audit.jsonl";
const TASK_FILE: &str = "task.md";

/// One line of the append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default)]
    pub detail: String,
}

/// Reads and writes everything under a project's `.covenant/` directory.
///
/// The store is deliberately dumb: callers decide what to persist and when.
/// Every write is a whole-file replace, so a crash mid-run leaves at worst
/// one stale file rather than a torn record.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    project_dir: PathBuf,
    state_dir: PathBuf,
}

impl ProjectStore {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let state_dir = project_dir.join(STATE_DIR_NAME);
        Self {
            project_dir,
            state_dir,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn task_path(&self) -> PathBuf {
        self.project_dir.join(TASK_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.project_dir.join(CONFIG_FILE_NAME)
    }

    fn decomposition_dir(&self) -> PathBuf {
        self.state_dir.join("decomposition")
    }

    fn contracts_root(&self) -> PathBuf {
        self.state_dir.join("contracts")
    }

    fn implementations_root(&self) -> PathBuf {
        self.state_dir.join("implementations")
    }

    fn compositions_root(&self) -> PathBuf {
        self.state_dir.join("compositions")
    }

    /// Scaffold a new project: the state directory tree, a starter
    /// `task.md`, and a `.covenant.yaml` carrying the budget. Existing
    /// files are left untouched, so re-running init is safe.
    pub fn init(&self, budget: f64) -> PipelineResult<()> {
        for dir in [
            self.state_dir.clone(),
            self.decomposition_dir(),
            self.contracts_root(),
            self.implementations_root(),
            self.compositions_root(),
        ] {
            fs::create_dir_all(&dir)?;
        }

        let task = self.task_path();
        if !task.exists() {
            fs::write(
                &task,
                "# Task\n\nDescribe what to build here.\n\n\
                 ## Context\n\nConstraints, requirements, anything the pipeline should know.\n",
            )?;
        }

        let config = self.config_path();
        if !config.exists() {
            fs::write(
                &config,
                format!("# Covenant project configuration\nbudget: {budget:.2}\n"),
            )?;
        }

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir()
    }

    /// Read the task description, trimmed.
    pub fn load_task(&self) -> PipelineResult<String> {
        let path = self.task_path();
        if !path.exists() {
            return Err(PipelineError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no {TASK_FILE} in {}", self.project_dir.display()),
            )));
        }
        Ok(fs::read_to_string(path)?.trim().to_string())
    }

    // ---- run state ----

    pub fn has_state(&self) -> bool {
        self.state_dir.join(STATE_FILE).exists()
    }

    pub fn save_state(&self, state: &RunState) -> PipelineResult<()> {
        fs::create_dir_all(&self.state_dir)?;
        write_json(&self.state_dir.join(STATE_FILE), state)
    }

    pub fn load_state(&self) -> PipelineResult<RunState> {
        read_json(&self.state_dir.join(STATE_FILE))?
            .ok_or_else(|| PipelineError::RunNotFound(self.project_dir.display().to_string()))
    }

    /// Start a fresh run for this project and persist it immediately.
    pub fn create_run(&self) -> PipelineResult<RunState> {
        let state = RunState::new(self.project_dir.display().to_string());
        self.save_state(&state)?;
        Ok(state)
    }

    /// Wipe all pipeline state while leaving user files (task.md, config)
    /// in place. The empty directory layout is recreated.
    pub fn clear_state(&self) -> PipelineResult<()> {
        if self.state_dir.exists() {
            fs::remove_dir_all(&self.state_dir)?;
        }
        for dir in [
            self.state_dir.clone(),
            self.decomposition_dir(),
            self.contracts_root(),
            self.implementations_root(),
            self.compositions_root(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    // ---- audit log ----

    /// Append one timestamped action to `audit.jsonl`.
    pub fn append_audit(&self, action: &str, detail: &str) -> PipelineResult<()> {
        fs::create_dir_all(&self.state_dir)?;
        let entry = AuditEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            detail: detail.to_string(),
        };
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.state_dir.join(AUDIT_FILE))?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read the audit log. Unparseable lines are skipped rather than
    /// failing the whole read; a truncated final line must not make the
    /// log unreadable.
    pub fn load_audit(&self) -> PipelineResult<Vec<AuditEntry>> {
        let path = self.state_dir.join(AUDIT_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for line in fs::read_to_string(path)?.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => debug!(error = %err, "skipping malformed audit line"),
            }
        }
        Ok(entries)
    }

    // ---- decomposition ----

    pub fn save_tree(&self, tree: &DecompositionTree) -> PipelineResult<()> {
        fs::create_dir_all(self.decomposition_dir())?;
        write_json(&self.decomposition_dir().join("tree.json"), tree)
    }

    pub fn load_tree(&self) -> PipelineResult<Option<DecompositionTree>> {
        read_json(&self.decomposition_dir().join("tree.json"))
    }

    pub fn save_interview(&self, interview: &InterviewResult) -> PipelineResult<()> {
        fs::create_dir_all(self.decomposition_dir())?;
        write_json(&self.decomposition_dir().join("interview.json"), interview)
    }

    pub fn load_interview(&self) -> PipelineResult<Option<InterviewResult>> {
        read_json(&self.decomposition_dir().join("interview.json"))
    }

    // ---- contracts ----

    /// Directory holding one component's contract artifacts, created on
    /// first use.
    pub fn contract_dir(&self, component_id: &str) -> PipelineResult<PathBuf> {
        let dir = self.contracts_root().join(component_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Persist a contract as `interface.json`, plus a timestamped copy in
    /// `history/` so contract revisions stay reviewable.
    pub fn save_contract(&self, contract: &ComponentContract) -> PipelineResult<()> {
        let dir = self.contract_dir(&contract.component_id)?;
        write_json(&dir.join("interface.json"), contract)?;

        let history = dir.join("history");
        fs::create_dir_all(&history)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        write_json(&history.join(format!("{stamp}.json")), contract)
    }

    pub fn load_contract(&self, component_id: &str) -> PipelineResult<Option<ComponentContract>> {
        read_json(
            &self
                .contracts_root()
                .join(component_id)
                .join("interface.json"),
        )
    }

    pub fn load_all_contracts(&self) -> PipelineResult<BTreeMap<String, ComponentContract>> {
        let mut contracts = BTreeMap::new();
        let root = self.contracts_root();
        if !root.exists() {
            return Ok(contracts);
        }
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let component_id = entry.file_name().to_string_lossy().into_owned();
            if let Some(contract) = self.load_contract(&component_id)? {
                contracts.insert(component_id, contract);
            }
        }
        Ok(contracts)
    }

    // ---- contract test suites ----

    pub fn save_test_suite(&self, suite: &ContractTestSuite) -> PipelineResult<()> {
        let dir = self.contract_dir(&suite.component_id)?.join("tests");
        fs::create_dir_all(&dir)?;
        write_json(&dir.join("contract_test_suite.json"), suite)?;
        if !suite.generated_code.is_empty() {
            fs::write(self.test_code_path(&suite.component_id), &suite.generated_code)?;
        }
        Ok(())
    }

    pub fn load_test_suite(&self, component_id: &str) -> PipelineResult<Option<ContractTestSuite>> {
        read_json(
            &self
                .contracts_root()
                .join(component_id)
                .join("tests")
                .join("contract_test_suite.json"),
        )
    }

    pub fn load_all_test_suites(&self) -> PipelineResult<BTreeMap<String, ContractTestSuite>> {
        let mut suites = BTreeMap::new();
        let root = self.contracts_root();
        if !root.exists() {
            return Ok(suites);
        }
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let component_id = entry.file_name().to_string_lossy().into_owned();
            if let Some(suite) = self.load_test_suite(&component_id)? {
                suites.insert(component_id, suite);
            }
        }
        Ok(suites)
    }

    /// Where the runnable contract test file for a component lives.
    pub fn test_code_path(&self, component_id: &str) -> PathBuf {
        self.contracts_root()
            .join(component_id)
            .join("tests")
            .join("contract_test.rs")
    }

    // ---- implementations ----

    pub fn impl_dir(&self, component_id: &str) -> PipelineResult<PathBuf> {
        let dir = self.implementations_root().join(component_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Canonical source directory for a component, created on first use.
    pub fn impl_src_dir(&self, component_id: &str) -> PipelineResult<PathBuf> {
        let dir = self.implementations_root().join(component_id).join("src");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Canonical source directory path without creating it, for read-only
    /// listings.
    pub fn impl_src_path(&self, component_id: &str) -> PathBuf {
        self.implementations_root().join(component_id).join("src")
    }

    pub fn save_impl_metadata(
        &self,
        component_id: &str,
        metadata: &AttemptMetadata,
    ) -> PipelineResult<()> {
        let dir = self.impl_dir(component_id)?;
        write_json(&dir.join("metadata.json"), metadata)
    }

    pub fn save_test_results(
        &self,
        component_id: &str,
        results: &TestResults,
    ) -> PipelineResult<()> {
        let dir = self.impl_dir(component_id)?;
        write_json(&dir.join("test_results.json"), results)
    }

    pub fn load_test_results(&self, component_id: &str) -> PipelineResult<Option<TestResults>> {
        read_json(
            &self
                .implementations_root()
                .join(component_id)
                .join("test_results.json"),
        )
    }

    // ---- attempts ----

    pub fn attempt_dir(&self, component_id: &str, attempt_id: &str) -> PipelineResult<PathBuf> {
        let dir = self
            .implementations_root()
            .join(component_id)
            .join("attempts")
            .join(attempt_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn attempt_src_dir(&self, component_id: &str, attempt_id: &str) -> PipelineResult<PathBuf> {
        let dir = self.attempt_dir(component_id, attempt_id)?.join("src");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn save_attempt_metadata(
        &self,
        component_id: &str,
        attempt_id: &str,
        metadata: &AttemptMetadata,
    ) -> PipelineResult<()> {
        let dir = self.attempt_dir(component_id, attempt_id)?;
        write_json(&dir.join("metadata.json"), metadata)
    }

    pub fn save_attempt_test_results(
        &self,
        component_id: &str,
        attempt_id: &str,
        results: &TestResults,
    ) -> PipelineResult<()> {
        let dir = self.attempt_dir(component_id, attempt_id)?;
        write_json(&dir.join("test_results.json"), results)
    }

    /// Make an attempt the canonical implementation: the canonical `src/`
    /// is cleared and replaced by a full copy of the attempt's `src/`, and
    /// the attempt's metadata and test results overwrite the canonical
    /// ones. Stale files from a previous implementation never survive a
    /// promotion. A missing attempt is a no-op.
    pub fn promote_attempt(&self, component_id: &str, attempt_id: &str) -> PipelineResult<()> {
        let attempt = self.attempt_dir(component_id, attempt_id)?;
        let attempt_src = attempt.join("src");
        if !attempt_src.exists() {
            warn!(component_id, attempt_id, "attempt has no src directory, nothing to promote");
            return Ok(());
        }

        let canonical_src = self.impl_src_dir(component_id)?;
        fs::remove_dir_all(&canonical_src)?;
        copy_dir_recursive(&attempt_src, &canonical_src)?;

        let canonical = self.impl_dir(component_id)?;
        for name in ["metadata.json", "test_results.json"] {
            let source = attempt.join(name);
            if source.exists() {
                fs::copy(&source, canonical.join(name))?;
            }
        }
        Ok(())
    }

    /// Snapshot the canonical implementation as an archived attempt before
    /// it gets replaced, returning the archive id. Returns `Ok(None)` when
    /// there is nothing to archive (no canonical src, or an empty one).
    pub fn archive_current_impl(
        &self,
        component_id: &str,
        reason: &str,
    ) -> PipelineResult<Option<String>> {
        let canonical = self.implementations_root().join(component_id);
        let canonical_src = canonical.join("src");
        if !canonical_src.exists() || fs::read_dir(&canonical_src)?.next().is_none() {
            return Ok(None);
        }

        let archive_id = format!("archived_{}", Utc::now().format("%Y%m%d_%H%M%S"));
        let archive = self.attempt_dir(component_id, &archive_id)?;
        let archive_src = archive.join("src");
        if archive_src.exists() {
            fs::remove_dir_all(&archive_src)?;
        }
        copy_dir_recursive(&canonical_src, &archive_src)?;

        write_json(
            &archive.join("metadata.json"),
            &AttemptMetadata::archived(reason),
        )?;
        for name in ["metadata.json", "test_results.json"] {
            let source = canonical.join(name);
            if source.exists() {
                fs::copy(&source, archive.join(format!("original_{name}")))?;
            }
        }

        fs::remove_dir_all(&canonical_src)?;
        fs::create_dir_all(&canonical_src)?;
        Ok(Some(archive_id))
    }

    /// All recorded attempts for a component, sorted by id, each with
    /// whatever metadata parses. Competitive attempts and archived
    /// snapshots both show up here.
    pub fn list_attempts(&self, component_id: &str) -> PipelineResult<Vec<AttemptRecord>> {
        let root = self
            .implementations_root()
            .join(component_id)
            .join("attempts");
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            let metadata = match read_json::<AttemptMetadata>(&path.join("metadata.json")) {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(component_id, error = %err, "unreadable attempt metadata");
                    None
                }
            };
            records.push(AttemptRecord {
                attempt_id: entry.file_name().to_string_lossy().into_owned(),
                path,
                metadata,
            });
        }
        records.sort_by(|a, b| a.attempt_id.cmp(&b.attempt_id));
        Ok(records)
    }

    // ---- compositions ----

    /// Workspace for integrating a non-leaf component's children, created
    /// on first use.
    pub fn composition_dir(&self, parent_id: &str) -> PipelineResult<PathBuf> {
        let dir = self.compositions_root().join(parent_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn save_composition_results(
        &self,
        parent_id: &str,
        results: &TestResults,
    ) -> PipelineResult<()> {
        let dir = self.composition_dir(parent_id)?;
        write_json(&dir.join("test_results.json"), results)
    }

    pub fn load_composition_results(
        &self,
        parent_id: &str,
    ) -> PipelineResult<Option<TestResults>> {
        read_json(
            &self
                .compositions_root()
                .join(parent_id)
                .join("test_results.json"),
        )
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> PipelineResult<()> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> PipelineResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let body = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&body)?))
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ContractTestSuite;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, ProjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path());
        store.init(10.0).unwrap();
        (dir, store)
    }

    fn make_contract(id: &str) -> ComponentContract {
        ComponentContract::new(id, id.to_uppercase())
    }

    #[test]
    fn test_init_scaffolds_layout() {
        let (_dir, store) = make_store();
        assert!(store.is_initialized());
        assert!(store.task_path().exists());
        assert!(store.config_path().exists());
        assert!(store.state_dir().join("decomposition").is_dir());
        assert!(store.state_dir().join("contracts").is_dir());
        assert!(store.state_dir().join("implementations").is_dir());
        assert!(store.state_dir().join("compositions").is_dir());
    }

    #[test]
    fn test_init_preserves_existing_task() {
        let (_dir, store) = make_store();
        fs::write(store.task_path(), "# My task\n").unwrap();
        store.init(10.0).unwrap();
        assert_eq!(fs::read_to_string(store.task_path()).unwrap(), "# My task\n");
    }

    #[test]
    fn test_load_task_trims() {
        let (_dir, store) = make_store();
        fs::write(store.task_path(), "  build a parser\n\n").unwrap();
        assert_eq!(store.load_task().unwrap(), "build a parser");
    }

    #[test]
    fn test_state_round_trip() {
        let (_dir, store) = make_store();
        assert!(!store.has_state());
        let state = store.create_run().unwrap();
        assert!(store.has_state());
        let loaded = store.load_state().unwrap();
        assert_eq!(loaded.id, state.id);
        assert_eq!(loaded.status, state.status);
    }

    #[test]
    fn test_load_state_missing_is_run_not_found() {
        let (_dir, store) = make_store();
        let err = store.load_state().unwrap_err();
        assert!(matches!(err, PipelineError::RunNotFound(_)));
    }

    #[test]
    fn test_clear_state_resets_layout() {
        let (_dir, store) = make_store();
        store.create_run().unwrap();
        store.save_tree(&DecompositionTree::new("root")).unwrap();
        store.clear_state().unwrap();
        assert!(!store.has_state());
        assert!(store.load_tree().unwrap().is_none());
        assert!(store.state_dir().join("contracts").is_dir());
    }

    #[test]
    fn test_tree_and_interview_round_trip() {
        let (_dir, store) = make_store();
        assert!(store.load_tree().unwrap().is_none());
        store.save_tree(&DecompositionTree::new("root")).unwrap();
        assert_eq!(store.load_tree().unwrap().unwrap().root_id, "root");

        assert!(store.load_interview().unwrap().is_none());
        let interview = InterviewResult {
            approved: true,
            ..InterviewResult::default()
        };
        store.save_interview(&interview).unwrap();
        assert!(store.load_interview().unwrap().unwrap().approved);
    }

    #[test]
    fn test_contract_save_writes_history() {
        let (_dir, store) = make_store();
        store.save_contract(&make_contract("auth")).unwrap();
        let dir = store.contract_dir("auth").unwrap();
        assert!(dir.join("interface.json").exists());
        let history: Vec<_> = fs::read_dir(dir.join("history")).unwrap().collect();
        assert!(!history.is_empty());
        assert_eq!(store.load_contract("auth").unwrap().unwrap().name, "AUTH");
    }

    #[test]
    fn test_missing_contract_is_none() {
        let (_dir, store) = make_store();
        assert!(store.load_contract("ghost").unwrap().is_none());
    }

    #[test]
    fn test_load_all_contracts() {
        let (_dir, store) = make_store();
        store.save_contract(&make_contract("a")).unwrap();
        store.save_contract(&make_contract("b")).unwrap();
        let all = store.load_all_contracts().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key("a"));
        assert!(all.contains_key("b"));
    }

    #[test]
    fn test_suite_round_trip_writes_code_file() {
        let (_dir, store) = make_store();
        let mut suite = ContractTestSuite::new("auth");
        suite.generated_code = "fn main() {}\n".to_string();
        store.save_test_suite(&suite).unwrap();

        assert!(store.test_code_path("auth").exists());
        let loaded = store.load_test_suite("auth").unwrap().unwrap();
        assert_eq!(loaded.component_id, "auth");
        assert_eq!(store.load_all_test_suites().unwrap().len(), 1);
    }

    #[test]
    fn test_promote_attempt_replaces_canonical() {
        let (_dir, store) = make_store();
        let canonical = store.impl_src_dir("auth").unwrap();
        fs::write(canonical.join("stale.rs"), "// old\n").unwrap();

        let attempt_src = store.attempt_src_dir("auth", "attempt_1").unwrap();
        fs::write(attempt_src.join("main.rs"), "fn main() {}\n").unwrap();
        fs::create_dir_all(attempt_src.join("util")).unwrap();
        fs::write(attempt_src.join("util").join("mod.rs"), "// util\n").unwrap();
        store
            .save_attempt_metadata("auth", "attempt_1", &AttemptMetadata::competitive(1, vec![]))
            .unwrap();
        store
            .save_attempt_test_results("auth", "attempt_1", &TestResults::passing(4))
            .unwrap();

        store.promote_attempt("auth", "attempt_1").unwrap();

        let canonical = store.impl_src_dir("auth").unwrap();
        assert!(!canonical.join("stale.rs").exists());
        assert!(canonical.join("main.rs").exists());
        assert!(canonical.join("util").join("mod.rs").exists());
        assert!(store.impl_dir("auth").unwrap().join("metadata.json").exists());
        let results = store.load_test_results("auth").unwrap().unwrap();
        assert_eq!(results.passed, 4);
    }

    #[test]
    fn test_promote_missing_attempt_is_noop() {
        let (_dir, store) = make_store();
        let canonical = store.impl_src_dir("auth").unwrap();
        fs::write(canonical.join("keep.rs"), "// keep\n").unwrap();
        store.promote_attempt("auth", "nope").unwrap();
        assert!(canonical.join("keep.rs").exists());
    }

    #[test]
    fn test_archive_empty_canonical_returns_none() {
        let (_dir, store) = make_store();
        assert!(store.archive_current_impl("auth", "why").unwrap().is_none());
        store.impl_src_dir("auth").unwrap();
        assert!(store.archive_current_impl("auth", "why").unwrap().is_none());
    }

    #[test]
    fn test_archive_snapshots_and_clears_canonical() {
        let (_dir, store) = make_store();
        let canonical = store.impl_src_dir("auth").unwrap();
        fs::write(canonical.join("lib.rs"), "// v1\n").unwrap();
        store
            .save_impl_metadata("auth", &AttemptMetadata::competitive(1, vec!["lib.rs".into()]))
            .unwrap();

        let archive_id = store
            .archive_current_impl("auth", "reimplementing after diagnosis")
            .unwrap()
            .unwrap();
        assert!(archive_id.starts_with("archived_"));

        // Canonical src survives but is empty again.
        assert!(canonical.exists());
        assert!(fs::read_dir(&canonical).unwrap().next().is_none());

        let records = store.list_attempts("auth").unwrap();
        let archived = records
            .iter()
            .find(|r| r.attempt_id == archive_id)
            .expect("archive should be listed");
        assert!(archived.path.join("src").join("lib.rs").exists());
        assert!(archived.path.join("original_metadata.json").exists());
        let metadata = archived.metadata.as_ref().unwrap();
        assert_eq!(metadata.reason, "reimplementing after diagnosis");
    }

    #[test]
    fn test_list_attempts_sorted_with_metadata() {
        let (_dir, store) = make_store();
        store
            .save_attempt_metadata("auth", "b2", &AttemptMetadata::competitive(2, vec![]))
            .unwrap();
        store
            .save_attempt_metadata("auth", "a1", &AttemptMetadata::competitive(1, vec![]))
            .unwrap();

        let records = store.list_attempts("auth").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].attempt_id, "a1");
        assert_eq!(records[1].attempt_id, "b2");
        assert_eq!(records[0].metadata.as_ref().unwrap().attempt, 1);
    }

    #[test]
    fn test_list_attempts_missing_component_is_empty() {
        let (_dir, store) = make_store();
        assert!(store.list_attempts("ghost").unwrap().is_empty());
    }

    #[test]
    fn test_audit_round_trip() {
        let (_dir, store) = make_store();
        store.append_audit("run_started", "fresh run").unwrap();
        store.append_audit("phase_advanced", "decompose").unwrap();
        let entries = store.load_audit().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "run_started");
        assert_eq!(entries[1].detail, "decompose");
    }

    #[test]
    fn test_load_audit_skips_malformed_lines() {
        let (_dir, store) = make_store();
        store.append_audit("ok", "").unwrap();
        let path = store.state_dir().join("audit.jsonl");
        let mut body = fs::read_to_string(&path).unwrap();
        body.push_str("{not json\n");
        fs::write(&path, body).unwrap();
        store.append_audit("also_ok", "").unwrap();

        let entries = store.load_audit().unwrap();
        assert_eq!(entries.len(), 2);
    }
}
