//! Implementation of the `covenant init` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::ProjectStore;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Per-project budget cap in dollars
    #[arg(long, default_value_t = 10.0)]
    pub budget: f64,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub project_dir: PathBuf,
    pub task_path: PathBuf,
    pub config_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        [
            format!("Initialized project: {}", self.project_dir.display()),
            format!("  Edit {} to describe your task", self.task_path.display()),
            format!("  Then run: covenant daemon {}", self.project_dir.display()),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);
    store.init(args.budget)?;

    let output_data = InitOutput {
        success: true,
        project_dir: store.project_dir().to_path_buf(),
        task_path: store.task_path(),
        config_path: store.config_path(),
    };
    output(&output_data, json_mode);
    Ok(())
}
