//! Implementation of the `covenant stop` command.
//!
//! Uses two mechanisms so the daemon hears the request whatever it is doing:
//! a "shutdown" line on the FIFO (heard while paused and waiting) and the
//! shutdown sentinel file (checked between phases while dispatching).

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::daemon::{check_daemon_health, request_shutdown, send_signal};

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct StopOutput {
    pub success: bool,
    pub daemon_running: bool,
    pub pid: Option<i32>,
    pub project_dir: PathBuf,
}

impl CommandOutput for StopOutput {
    fn to_human(&self) -> String {
        if !self.daemon_running {
            return "No daemon running.".to_string();
        }
        let pid = self.pid.map_or_else(|| "?".to_string(), |p| p.to_string());
        [
            format!("Shutdown signal sent to daemon (PID {pid})."),
            "Daemon will stop cleanly after the current phase completes.".to_string(),
            format!(
                "State is preserved - restart with: covenant daemon {}",
                self.project_dir.display()
            ),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: StopArgs, json_mode: bool) -> Result<()> {
    let health = check_daemon_health(&args.project_dir);
    if !health.alive {
        let output_data = StopOutput {
            success: false,
            daemon_running: false,
            pid: None,
            project_dir: args.project_dir,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    // Sentinel first for a daemon mid-phase, then the FIFO in case it is
    // paused and listening right now.
    request_shutdown(&args.project_dir)?;
    send_signal(&args.project_dir, "shutdown")?;

    let output_data = StopOutput {
        success: true,
        daemon_running: true,
        pid: health.pid,
        project_dir: args.project_dir,
    };
    output(&output_data, json_mode);
    Ok(())
}
