//! Run lifecycle state.
//!
//! Status transitions:
//!   active -> paused          (human input needed)
//!   active -> failed          (unrecoverable error)
//!   active -> completed       (all components pass)
//!   active -> budget_exceeded (spend cap hit)
//!   paused -> active          (resume signal)
//!
//! Phase transitions:
//!   interview -> decompose -> contract -> implement -> integrate -> complete
//!   implement/integrate can detour to diagnose and back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Overall status of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Failed,
    BudgetExceeded,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::BudgetExceeded => "budget_exceeded",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "budget_exceeded" => Some(Self::BudgetExceeded),
            _ => None,
        }
    }

    /// Terminal statuses never run another burst.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::BudgetExceeded)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline phase a run is currently in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Interview,
    Decompose,
    Contract,
    Implement,
    Integrate,
    Diagnose,
    Complete,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interview => "interview",
            Self::Decompose => "decompose",
            Self::Contract => "contract",
            Self::Implement => "implement",
            Self::Integrate => "integrate",
            Self::Diagnose => "diagnose",
            Self::Complete => "complete",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "interview" => Some(Self::Interview),
            "decompose" => Some(Self::Decompose),
            "contract" => Some(Self::Contract),
            "implement" => Some(Self::Implement),
            "integrate" => Some(Self::Integrate),
            "diagnose" => Some(Self::Diagnose),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    /// The phase after this one in the main sequence. Diagnose is a detour,
    /// not part of the sequence; it advances back to implement.
    pub fn next(&self) -> Self {
        match self {
            Self::Interview => Self::Decompose,
            Self::Decompose => Self::Contract,
            Self::Contract => Self::Implement,
            Self::Implement => Self::Integrate,
            Self::Integrate | Self::Complete => Self::Complete,
            Self::Diagnose => Self::Implement,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-component progress inside a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Contracting,
    Testing,
    Implementing,
    Integrating,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Contracting => "contracting",
            Self::Testing => "testing",
            Self::Implementing => "implementing",
            Self::Integrating => "integrating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Tracks a single component's progress through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentTask {
    pub component_id: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: String,
}

impl ComponentTask {
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            ..Self::default()
        }
    }
}

/// Output of the interview phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewResult {
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub ambiguities: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub user_answers: BTreeMap<String, String>,
    #[serde(default)]
    pub approved: bool,
}

/// Mutable lifecycle state for one run. Loaded, mutated, and saved by every
/// scheduler burst; terminal once status is completed/failed/budget_exceeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub id: String,
    pub project_dir: String,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub phase: RunPhase,
    #[serde(default)]
    pub component_tasks: Vec<ComponentTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_result: Option<InterviewResult>,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_in: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pause_reason: String,
    /// How many times diagnose has looped back; capped by the scheduler.
    #[serde(default)]
    pub phase_cycles: u32,
}

impl RunState {
    /// Fresh run in the interview phase. Run ids are 12 hex chars, short
    /// enough to type while still unique per project.
    pub fn new(project_dir: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string()[..12].to_string(),
            project_dir: project_dir.into(),
            status: RunStatus::Active,
            phase: RunPhase::Interview,
            created_at: Utc::now(),
            ..Self::default()
        }
    }

    /// Advance to the next phase in the main sequence; returns the new phase.
    pub fn advance_phase(&mut self) -> RunPhase {
        self.phase = self.phase.next();
        self.phase
    }

    /// Accumulate token and dollar spend.
    pub fn record_tokens(&mut self, input_tokens: u64, output_tokens: u64, cost: f64) {
        self.total_tokens += input_tokens + output_tokens;
        self.total_cost_usd += cost;
    }

    /// Pause for human input.
    pub fn pause(&mut self, reason: impl Into<String>) {
        self.status = RunStatus::Paused;
        self.pause_reason = reason.into();
    }

    /// Clear a pause and go back to work.
    pub fn resume(&mut self) {
        self.status = RunStatus::Active;
        self.pause_reason.clear();
    }

    /// Terminal failure.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.pause_reason = reason.into();
        self.completed_at = Some(Utc::now());
    }

    /// Terminal success. Idempotent.
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the daemon's activity heartbeat.
    pub fn check_in(&mut self) {
        self.last_check_in = Some(Utc::now());
    }

    /// Find the tracker for one component.
    pub fn task_mut(&mut self, component_id: &str) -> Option<&mut ComponentTask> {
        self.component_tasks
            .iter_mut()
            .find(|t| t.component_id == component_id)
    }

    /// Operator-facing status block.
    pub fn format_summary(&self) -> String {
        let mut lines = vec![
            format!(
                "[{}] {:<15} ${:.4}",
                self.id,
                self.status.as_str(),
                self.total_cost_usd
            ),
            format!("  Phase: {}", self.phase),
            format!("  Project: {}", self.project_dir),
        ];
        if !self.component_tasks.is_empty() {
            let completed = self
                .component_tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count();
            let failed = self
                .component_tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Failed)
                .count();
            lines.push(format!(
                "  Components: {}/{} done, {} failed",
                completed,
                self.component_tasks.len(),
                failed
            ));
        }
        if !self.pause_reason.is_empty() {
            lines.push(format!("  Reason: {}", self.pause_reason));
        }
        lines.join("\n")
    }
}
