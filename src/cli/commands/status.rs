//! Implementation of the `covenant status` command.
//!
//! Without a component id this shows the daemon, the run, the tree, and the
//! tail of the audit trail. With one it shows everything known about that
//! component: contract surface, test suite, latest results, attempts, and
//! the files of the canonical implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, status_icon, truncate, CommandOutput};
use crate::domain::models::TestResults;
use crate::infrastructure::daemon::check_daemon_health;
use crate::infrastructure::project::AuditEntry;
use crate::infrastructure::{DaemonHealth, ProjectStore};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Show detailed status for one component
    pub component_id: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ComponentLine {
    pub component_id: String,
    pub name: String,
    pub status: String,
    pub depth: u32,
}

#[derive(Debug, serde::Serialize)]
pub struct StatusOutput {
    pub success: bool,
    pub daemon: DaemonHealth,
    pub has_run: bool,
    pub summary: String,
    pub components: Vec<ComponentLine>,
    pub audit_total: usize,
    pub audit_recent: Vec<AuditEntry>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if self.daemon.alive {
            let pid = self.daemon.pid.map_or_else(|| "?".to_string(), |p| p.to_string());
            lines.push(format!("Daemon: running (PID {pid})"));
        } else if self.daemon.fifo_exists {
            lines.push("Daemon: FIFO exists but process not found (stale?)".to_string());
        } else {
            lines.push("Daemon: not running".to_string());
        }

        if !self.has_run {
            lines.push("No active run. Use 'covenant daemon' to start.".to_string());
            return lines.join("\n");
        }
        lines.push(self.summary.clone());

        if !self.components.is_empty() {
            lines.push(format!("\nDecomposition: {} components", self.components.len()));
            for line in &self.components {
                let indent = "  ".repeat(line.depth as usize);
                lines.push(format!(
                    "  {indent}{} {} ({})",
                    status_icon(&line.status),
                    line.name,
                    line.component_id
                ));
            }
        }

        if self.audit_total > 0 {
            lines.push(format!("\nAudit trail: {} entries", self.audit_total));
            for entry in &self.audit_recent {
                lines.push(format!(
                    "  {} {} - {}",
                    entry.timestamp.format("%Y-%m-%dT%H:%M:%S"),
                    entry.action,
                    entry.detail
                ));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ContractSummary {
    pub version: u32,
    pub functions: Vec<String>,
    pub types: Vec<String>,
    pub dependencies: Vec<String>,
    pub invariants: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct SuiteSummary {
    pub cases: Vec<String>,
    pub generated_code_lines: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct AttemptLine {
    pub attempt_id: String,
    pub kind: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ComponentDetailOutput {
    pub success: bool,
    pub found: bool,
    pub component_id: String,
    pub name: String,
    pub node_type: String,
    pub depth: u32,
    pub status: String,
    pub parent: String,
    pub children: Vec<String>,
    pub contract: Option<ContractSummary>,
    pub test_suite: Option<SuiteSummary>,
    pub test_results: Option<TestResults>,
    pub attempts: Vec<AttemptLine>,
    pub impl_files: Vec<String>,
    /// Component ids offered when the requested one does not exist
    pub available: Vec<String>,
}

impl CommandOutput for ComponentDetailOutput {
    fn to_human(&self) -> String {
        if !self.found {
            let mut lines = vec![
                format!("Component not found: {}", self.component_id),
                "Available components:".to_string(),
            ];
            for id in &self.available {
                lines.push(format!("  {id}"));
            }
            return lines.join("\n");
        }

        let mut lines = vec![
            format!("Component: {}", self.name),
            format!("  ID: {}", self.component_id),
            format!("  Type: {} (depth {})", self.node_type, self.depth),
            format!("  Status: {}", self.status),
        ];
        if !self.parent.is_empty() {
            lines.push(format!("  Parent: {}", self.parent));
        }
        if !self.children.is_empty() {
            lines.push(format!("  Children: {}", self.children.join(", ")));
        }

        match &self.contract {
            Some(contract) => {
                lines.push(format!("\nContract (v{}):", contract.version));
                lines.push(format!("  Functions: {}", contract.functions.len()));
                for rendered in &contract.functions {
                    lines.push(format!("    {rendered}"));
                }
                if !contract.types.is_empty() {
                    lines.push(format!("  Types: {}", contract.types.join(", ")));
                }
                if !contract.dependencies.is_empty() {
                    lines.push(format!("  Dependencies: {}", contract.dependencies.join(", ")));
                }
                if !contract.invariants.is_empty() {
                    lines.push("  Invariants:".to_string());
                    for inv in &contract.invariants {
                        lines.push(format!("    - {inv}"));
                    }
                }
            }
            None => lines.push("\nContract: not yet generated".to_string()),
        }

        match &self.test_suite {
            Some(suite) => {
                lines.push("\nTest Suite:".to_string());
                lines.push(format!("  Cases: {}", suite.cases.len()));
                for case in &suite.cases {
                    lines.push(format!("    {case}"));
                }
                if suite.generated_code_lines > 0 {
                    lines.push(format!("  Generated code: {} lines", suite.generated_code_lines));
                }
            }
            None => lines.push("\nTest Suite: not yet generated".to_string()),
        }

        if let Some(results) = &self.test_results {
            let verdict = if results.all_passed() { "PASS" } else { "FAIL" };
            lines.push(format!(
                "\nTest Results: {verdict} ({}/{} passed, {} failed, {} errors)",
                results.passed, results.total, results.failed, results.errors
            ));
            if !results.failure_details.is_empty() {
                lines.push("  Failures:".to_string());
                for failure in &results.failure_details {
                    lines.push(format!(
                        "    {}: {}",
                        failure.test_id,
                        truncate(&failure.error_message, 80)
                    ));
                }
            }
        }

        if !self.attempts.is_empty() {
            lines.push(format!("\nAttempts: {}", self.attempts.len()));
            for attempt in &self.attempts {
                lines.push(format!("  {} ({})", attempt.attempt_id, attempt.kind));
            }
        }

        if !self.impl_files.is_empty() {
            lines.push(format!("\nImplementation: {} file(s)", self.impl_files.len()));
            for file in self.impl_files.iter().take(10) {
                lines.push(format!("  {file}"));
            }
            if self.impl_files.len() > 10 {
                lines.push(format!("  ... and {} more", self.impl_files.len() - 10));
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: StatusArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);

    if let Some(component_id) = &args.component_id {
        let output_data = component_detail(&store, component_id)?;
        output(&output_data, json_mode);
        return Ok(());
    }

    let daemon = check_daemon_health(&args.project_dir);
    let has_run = store.has_state();
    let summary = if has_run {
        store.load_state()?.format_summary()
    } else {
        String::new()
    };

    let mut components = Vec::new();
    if has_run {
        if let Some(tree) = store.load_tree()? {
            for node in tree.nodes.values() {
                components.push(ComponentLine {
                    component_id: node.component_id.clone(),
                    name: node.name.clone(),
                    status: node.implementation_status.as_str().to_string(),
                    depth: node.depth,
                });
            }
        }
    }

    let audit = if has_run { store.load_audit()? } else { Vec::new() };
    let audit_total = audit.len();
    let audit_recent = audit.into_iter().rev().take(5).rev().collect();

    let output_data = StatusOutput {
        success: true,
        daemon,
        has_run,
        summary,
        components,
        audit_total,
        audit_recent,
    };
    output(&output_data, json_mode);
    Ok(())
}

fn component_detail(store: &ProjectStore, component_id: &str) -> Result<ComponentDetailOutput> {
    let tree = store
        .load_tree()?
        .ok_or_else(|| anyhow::anyhow!("No decomposition tree found."))?;

    let Some(node) = tree.get(component_id) else {
        return Ok(ComponentDetailOutput {
            success: false,
            found: false,
            component_id: component_id.to_string(),
            name: String::new(),
            node_type: String::new(),
            depth: 0,
            status: String::new(),
            parent: String::new(),
            children: Vec::new(),
            contract: None,
            test_suite: None,
            test_results: None,
            attempts: Vec::new(),
            impl_files: Vec::new(),
            available: tree
                .nodes
                .values()
                .map(|n| format!("{}: {}", n.component_id, n.name))
                .collect(),
        });
    };

    let contract = store.load_contract(component_id)?.map(|contract| ContractSummary {
        version: contract.version,
        functions: contract
            .functions
            .iter()
            .map(|f| {
                let inputs = f
                    .inputs
                    .iter()
                    .map(|i| format!("{}: {}", i.name, i.type_ref))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({inputs}) -> {}", f.name, f.output_type)
            })
            .collect(),
        types: contract.types.iter().map(|t| t.name.clone()).collect(),
        dependencies: contract.dependencies.clone(),
        invariants: contract.invariants.clone(),
    });

    let test_suite = store.load_test_suite(component_id)?.map(|suite| SuiteSummary {
        cases: suite
            .test_cases
            .iter()
            .map(|tc| {
                format!(
                    "[{}] {}: {}",
                    tc.category.as_str(),
                    tc.id,
                    truncate(&tc.description, 60)
                )
            })
            .collect(),
        generated_code_lines: if suite.generated_code.is_empty() {
            0
        } else {
            suite.generated_code.lines().count()
        },
    });

    let attempts = store
        .list_attempts(component_id)?
        .into_iter()
        .map(|record| AttemptLine {
            attempt_id: record.attempt_id,
            kind: record
                .metadata
                .map_or("competitive", |m| m.kind.as_str())
                .to_string(),
        })
        .collect();

    let mut impl_files = Vec::new();
    let impl_src = store.impl_src_path(component_id);
    collect_files(&impl_src, &impl_src, &mut impl_files);
    impl_files.sort();

    let parent = if node.parent_id.is_empty() {
        String::new()
    } else {
        tree.get(&node.parent_id)
            .map_or_else(|| node.parent_id.clone(), |p| p.name.clone())
    };

    Ok(ComponentDetailOutput {
        success: true,
        found: true,
        component_id: node.component_id.clone(),
        name: node.name.clone(),
        node_type: if node.is_leaf() { "leaf" } else { "parent" }.to_string(),
        depth: node.depth,
        status: node.implementation_status.as_str().to_string(),
        parent,
        children: node.children.clone(),
        contract,
        test_suite,
        test_results: node.test_results.clone(),
        attempts,
        impl_files,
        available: Vec::new(),
    })
}

/// Gather every file under `dir`, reported relative to `base`.
fn collect_files(dir: &Path, base: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, base, out);
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.display().to_string());
        }
    }
}
