//! Implementation of the `covenant resume` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{RunPhase, RunStatus, TaskStatus};
use crate::infrastructure::daemon::send_signal;
use crate::infrastructure::ProjectStore;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Phase to resume from instead of where the run stopped
    #[arg(long)]
    pub from_phase: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ResumeOutput {
    pub success: bool,
    pub resumed: bool,
    pub phase: String,
    pub original_reason: String,
    pub completed_components: usize,
    pub signaled: bool,
    pub message: String,
    pub project_dir: PathBuf,
}

impl CommandOutput for ResumeOutput {
    fn to_human(&self) -> String {
        if !self.resumed {
            return self.message.clone();
        }
        let mut lines = vec![
            format!("Resumed from {}", self.phase),
            format!("  Original failure: {}", self.original_reason),
            format!("  Completed components: {}", self.completed_components),
        ];
        if self.signaled {
            lines.push("Daemon signaled to continue.".to_string());
        } else {
            lines.push(format!(
                "Start daemon with: covenant daemon {}",
                self.project_dir.display()
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ResumeArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);

    let not_resumed = |message: &str| ResumeOutput {
        success: false,
        resumed: false,
        phase: String::new(),
        original_reason: String::new(),
        completed_components: 0,
        signaled: false,
        message: message.to_string(),
        project_dir: args.project_dir.clone(),
    };

    if !store.has_state() {
        output(&not_resumed("No active run found."), json_mode);
        return Ok(());
    }

    let mut state = store.load_state()?;
    match state.status {
        RunStatus::Active => {
            output(&not_resumed("Run is already active."), json_mode);
            return Ok(());
        }
        RunStatus::Completed => {
            output(&not_resumed("Run already completed."), json_mode);
            return Ok(());
        }
        RunStatus::Paused | RunStatus::Failed | RunStatus::BudgetExceeded => {}
    }

    if let Some(raw) = &args.from_phase {
        let Some(phase) = RunPhase::from_str(raw) else {
            anyhow::bail!("Unknown phase: {raw}");
        };
        state.phase = phase;
    }

    let original_reason = state.pause_reason.clone();
    store.append_audit(
        "daemon_resume",
        &format!("Resuming from {}: {}", state.status.as_str(), original_reason),
    )?;

    state.resume();
    // A failed run carries a completion stamp that no longer applies.
    state.completed_at = None;
    store.save_state(&state)?;

    let completed_components = state
        .component_tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();

    let signaled = send_signal(&args.project_dir, "resumed")?;

    let output_data = ResumeOutput {
        success: true,
        resumed: true,
        phase: state.phase.as_str().to_string(),
        original_reason,
        completed_components,
        signaled,
        message: String::new(),
        project_dir: args.project_dir,
    };
    output(&output_data, json_mode);
    Ok(())
}
