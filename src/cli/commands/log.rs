//! Implementation of the `covenant log` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::project::AuditEntry;
use crate::infrastructure::ProjectStore;

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Show only the last N entries
    #[arg(long, default_value_t = 0)]
    pub tail: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct LogOutput {
    pub success: bool,
    pub entries: Vec<AuditEntry>,
    pub total: usize,
    /// Whether output was limited with --tail
    pub tailed: bool,
}

impl CommandOutput for LogOutput {
    fn to_human(&self) -> String {
        if self.total == 0 {
            return "No audit entries.".to_string();
        }
        let mut lines = Vec::new();
        for entry in &self.entries {
            lines.push(format!(
                "{}  {:<20}  {}",
                entry.timestamp.format("%Y-%m-%dT%H:%M:%S"),
                entry.action,
                entry.detail
            ));
        }
        if !self.tailed {
            lines.push(format!("\n{} entries total", self.total));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: LogArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);
    let mut entries = store.load_audit()?;
    let total = entries.len();

    let tailed = args.tail > 0;
    if tailed && entries.len() > args.tail {
        entries.drain(..entries.len() - args.tail);
    }

    let output_data = LogOutput {
        success: true,
        entries,
        total,
        tailed,
    };
    output(&output_data, json_mode);
    Ok(())
}
