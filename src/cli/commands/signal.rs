//! Implementation of the `covenant signal` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::daemon::{check_daemon_health, send_signal};

#[derive(Args, Debug)]
pub struct SignalArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Message to write to the daemon's FIFO
    #[arg(long, default_value = "resume")]
    pub msg: String,
}

#[derive(Debug, serde::Serialize)]
pub struct SignalOutput {
    pub success: bool,
    pub daemon_running: bool,
    pub sent: bool,
    pub message: String,
}

impl CommandOutput for SignalOutput {
    fn to_human(&self) -> String {
        if !self.daemon_running {
            return "No daemon running. Start with: covenant daemon <project-dir>".to_string();
        }
        if self.sent {
            format!("Signal sent: {}", self.message)
        } else {
            "Failed to send signal (FIFO not found or daemon not listening)".to_string()
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SignalArgs, json_mode: bool) -> Result<()> {
    let health = check_daemon_health(&args.project_dir);
    if !health.alive {
        let output_data = SignalOutput {
            success: false,
            daemon_running: false,
            sent: false,
            message: args.msg,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    let sent = send_signal(&args.project_dir, &args.msg)?;
    let output_data = SignalOutput {
        success: sent,
        daemon_running: true,
        sent,
        message: args.msg,
    };
    output(&output_data, json_mode);
    Ok(())
}
