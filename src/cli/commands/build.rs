//! Implementation of the `covenant build` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::agents::{plan_from_task, ScriptedAgent};
use crate::infrastructure::{ConfigLoader, ProjectStore};
use crate::services::Scheduler;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Component to rebuild
    pub component_id: String,

    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Race several agents and promote the best result
    #[arg(long)]
    pub competitive: bool,

    /// Number of competing agents
    #[arg(long, default_value_t = 2)]
    pub agents: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct BuildOutput {
    pub success: bool,
    pub found: bool,
    pub component_id: String,
    pub name: String,
    pub competitive: bool,
    pub agents: usize,
    pub passed: u32,
    pub total: u32,
    pub failed: u32,
    pub errors: u32,
    pub spend: f64,
    /// Component ids offered when the requested one does not exist
    pub available: Vec<String>,
}

impl CommandOutput for BuildOutput {
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

        let mut lines = vec![format!(
            "Building component: {} ({})",
            self.name, self.component_id
        )];
        if self.competitive {
            lines.push(format!("  Mode: competitive ({} agents)", self.agents));
        } else {
            lines.push("  Mode: sequential".to_string());
        }
        if self.success {
            lines.push(format!("\nSUCCESS: {}/{} tests passed", self.passed, self.total));
        } else {
            lines.push(format!(
                "\nFAILED: {}/{} tests passed, {} failed, {} errors",
                self.passed, self.total, self.failed, self.errors
            ));
        }
        lines.push(format!("\nSpend: ${:.4}", self.spend));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: BuildArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);
    let config = ConfigLoader::load(&args.project_dir)?;

    let Some(tree) = store.load_tree()? else {
        anyhow::bail!("No decomposition tree found.");
    };
    let Some(node) = tree.get(&args.component_id) else {
        let output_data = BuildOutput {
            success: false,
            found: false,
            component_id: args.component_id,
            name: String::new(),
            competitive: args.competitive,
            agents: args.agents,
            passed: 0,
            total: 0,
            failed: 0,
            errors: 0,
            spend: 0.0,
            available: tree
                .nodes
                .values()
                .map(|n| format!("{}: {}", n.component_id, n.name))
                .collect(),
        };
        output(&output_data, json_mode);
        return Ok(());
    };
    let name = node.name.clone();

    let task = store
        .load_task()
        .context("Cannot read the task file; run 'covenant init' first")?;
    let agent = Arc::new(ScriptedAgent::new(plan_from_task(&task)));
    let scheduler = Scheduler::new(store, config, agent);

    let results = scheduler
        .build_component(&args.component_id, args.competitive, args.agents)
        .await?;
    let spend = scheduler.store().load_state()?.total_cost_usd;

    let output_data = BuildOutput {
        success: results.all_passed(),
        found: true,
        component_id: args.component_id,
        name,
        competitive: args.competitive,
        agents: args.agents,
        passed: results.passed,
        total: results.total,
        failed: results.failed,
        errors: results.errors,
        spend,
        available: Vec::new(),
    };
    output(&output_data, json_mode);
    Ok(())
}
