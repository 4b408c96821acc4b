//! Runtime configuration for the pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_model() -> String {
    "claude-opus-4-1".to_string()
}

fn default_budget() -> f64 {
    10.00
}

fn default_daily_budget() -> f64 {
    50.00
}

fn default_check_interval() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_phase_cycles() -> u32 {
    3
}

fn default_competitive_agents() -> usize {
    2
}

fn default_max_concurrent() -> usize {
    4
}

fn default_locality_radius() -> usize {
    3
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_max_idle() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Daemon timing knobs. `health_check_interval` is the short tier used for
/// wait-loop checkpoints; `max_idle` is the long tier that bounds both a
/// paused wait and a single phase burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval: u64,
    #[serde(default = "default_max_idle")]
    pub max_idle: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            health_check_interval: default_health_check_interval(),
            max_idle: default_max_idle(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Merged pipeline configuration.
///
/// Values come from programmatic defaults, an optional global config file,
/// the project's `.covenant.yaml`, and `COVENANT_*` environment variables,
/// in that order of increasing precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovenantConfig {
    /// Model id used for pricing lookups.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-project dollar cap.
    #[serde(default = "default_budget")]
    pub budget: f64,

    /// Daily dollar cap across all runs.
    #[serde(default = "default_daily_budget")]
    pub daily_budget: f64,

    /// Seconds between polling bursts in `run` mode.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Implementation retries per component before it counts as failed.
    #[serde(default = "default_max_attempts")]
    pub max_implementation_attempts: u32,

    /// Diagnose round-trips before the run pauses for human review.
    #[serde(default = "default_max_phase_cycles")]
    pub max_phase_cycles: u32,

    /// Implement independent leaves concurrently.
    #[serde(default)]
    pub parallel_components: bool,

    /// Race several agents per component and promote the best attempt.
    #[serde(default)]
    pub competitive_implementations: bool,

    /// Lanes per component in competitive mode.
    #[serde(default = "default_competitive_agents")]
    pub competitive_agents: usize,

    /// Concurrency cap for parallel fan-out.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_agents: usize,

    /// Stop after decomposition and contracts; implement nothing.
    #[serde(default)]
    pub plan_only: bool,

    /// Kinship-hop threshold for dependency locality warnings.
    #[serde(default = "default_locality_radius")]
    pub locality_radius: usize,

    /// Per-million-token pricing overrides: model id -> (input, output).
    #[serde(default)]
    pub model_pricing: BTreeMap<String, (f64, f64)>,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CovenantConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            budget: default_budget(),
            daily_budget: default_daily_budget(),
            check_interval: default_check_interval(),
            max_implementation_attempts: default_max_attempts(),
            max_phase_cycles: default_max_phase_cycles(),
            parallel_components: false,
            competitive_implementations: false,
            competitive_agents: default_competitive_agents(),
            max_concurrent_agents: default_max_concurrent(),
            plan_only: false,
            locality_radius: default_locality_radius(),
            model_pricing: BTreeMap::new(),
            daemon: DaemonConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
