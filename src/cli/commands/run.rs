//! Implementation of the `covenant run` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::agents::{plan_from_task, ScriptedAgent};
use crate::infrastructure::{ConfigLoader, ProjectStore};
use crate::services::Scheduler;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Dispatch a single burst instead of running until the run stops
    #[arg(long)]
    pub once: bool,

    /// Discard existing state and start a fresh run
    #[arg(long)]
    pub force_new: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub success: bool,
    pub run_id: String,
    pub status: String,
    pub phase: String,
    pub total_cost_usd: f64,
    pub summary: String,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        self.summary.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);
    let config = ConfigLoader::load(&args.project_dir)?;

    if args.force_new {
        store.clear_state()?;
    }
    if !store.has_state() {
        store.create_run()?;
    }

    let task = store
        .load_task()
        .context("Cannot read the task file; run 'covenant init' first")?;
    let agent = Arc::new(ScriptedAgent::new(plan_from_task(&task)));
    let scheduler = Scheduler::new(store, config, agent);

    let state = if args.once {
        scheduler.run_once().await?
    } else {
        scheduler.run_forever().await?
    };

    let output_data = RunOutput {
        success: true,
        run_id: state.id.clone(),
        status: state.status.as_str().to_string(),
        phase: state.phase.as_str().to_string(),
        total_cost_usd: state.total_cost_usd,
        summary: state.format_summary(),
    };
    output(&output_data, json_mode);
    Ok(())
}
