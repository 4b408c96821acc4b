//! Implementation of the `covenant daemon` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::agents::{plan_from_task, ScriptedAgent};
use crate::infrastructure::{ConfigLoader, Daemon, ProjectStore};
use crate::services::Scheduler;

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Discard existing state and start a fresh run
    #[arg(long)]
    pub force_new: bool,

    /// Seconds between liveness log lines while waiting (overrides config)
    #[arg(long)]
    pub health_interval: Option<u64>,

    /// Seconds to wait on human input before giving up (overrides config)
    #[arg(long)]
    pub max_idle: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
pub struct DaemonOutput {
    pub success: bool,
    pub run_id: String,
    pub status: String,
    pub phase: String,
    pub total_cost_usd: f64,
    pub summary: String,
}

impl CommandOutput for DaemonOutput {
    fn to_human(&self) -> String {
        self.summary.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: DaemonArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);
    let mut config = ConfigLoader::load(&args.project_dir)?;
    if let Some(interval) = args.health_interval {
        config.daemon.health_check_interval = interval;
    }
    if let Some(max_idle) = args.max_idle {
        config.daemon.max_idle = max_idle;
    }

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
    let daemon_config = config.daemon.clone();
    let scheduler = Scheduler::new(store, config, agent);
    let daemon = Daemon::new(scheduler, &daemon_config);

    if !json_mode {
        println!("Daemon starting for: {}", args.project_dir.display());
        println!("  FIFO: {}", daemon.fifo_path().display());
        println!("  Health check: every {}s", daemon_config.health_check_interval);
        println!("  Max idle: {}s", daemon_config.max_idle);
        println!("  Resume with: covenant signal {}", args.project_dir.display());
        println!();
    }

    let state = daemon.run().await?;

    let output_data = DaemonOutput {
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
