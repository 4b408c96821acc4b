//! Implementation of the `covenant attempts` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::ProjectStore;

#[derive(Args, Debug)]
pub struct AttemptsArgs {
    /// Component whose attempts to list
    pub component_id: String,

    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct AttemptRow {
    pub attempt_id: String,
    pub kind: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub reason: String,
    pub files: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct AttemptsOutput {
    pub success: bool,
    pub component_id: String,
    pub attempts: Vec<AttemptRow>,
}

impl CommandOutput for AttemptsOutput {
    fn to_human(&self) -> String {
        if self.attempts.is_empty() {
            return format!("No attempts recorded for component: {}", self.component_id);
        }
        let mut lines = vec![format!(
            "Attempts for {}: {}",
            self.component_id,
            self.attempts.len()
        )];
        for row in &self.attempts {
            let when = row
                .timestamp
                .map_or_else(String::new, |ts| format!("  {}", ts.format("%Y-%m-%dT%H:%M:%S")));
            let mut line = format!("  {} ({}){when}", row.attempt_id, row.kind);
            if !row.reason.is_empty() {
                line.push_str(&format!("  {}", row.reason));
            }
            if row.files > 0 {
                line.push_str(&format!("  [{} file(s)]", row.files));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AttemptsArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);
    let attempts = store
        .list_attempts(&args.component_id)?
        .into_iter()
        .map(|record| match record.metadata {
            Some(metadata) => AttemptRow {
                attempt_id: record.attempt_id,
                kind: metadata.kind.as_str().to_string(),
                timestamp: Some(metadata.timestamp),
                reason: metadata.reason,
                files: metadata.files.len(),
            },
            None => AttemptRow {
                attempt_id: record.attempt_id,
                kind: "competitive".to_string(),
                timestamp: None,
                reason: String::new(),
                files: 0,
            },
        })
        .collect();

    let output_data = AttemptsOutput {
        success: true,
        component_id: args.component_id,
        attempts,
    };
    output(&output_data, json_mode);
    Ok(())
}
