use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::CovenantConfig;
use crate::infrastructure::project::CONFIG_FILE_NAME;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid budget: {0}. Must be positive")]
    InvalidBudget(f64),

    #[error("Invalid daily budget: {0}. Must be positive")]
    InvalidDailyBudget(f64),

    #[error("Model id cannot be empty")]
    EmptyModel,

    #[error("Invalid max_implementation_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error("Invalid max_phase_cycles: {0}. Cannot be 0")]
    InvalidPhaseCycles(u32),

    #[error("Invalid competitive_agents: {0}. Must be between 1 and 16")]
    InvalidCompetitiveAgents(usize),

    #[error("Invalid max_concurrent_agents: {0}. Must be between 1 and 100")]
    InvalidMaxConcurrent(usize),

    #[error("Invalid locality_radius: {0}. Must be at least 1")]
    InvalidLocalityRadius(usize),

    #[error("Invalid check_interval: {0}. Must be at least 1 second")]
    InvalidCheckInterval(u64),

    #[error(
        "Invalid daemon timing: health_check_interval ({0}) must be between 1 and max_idle ({1})"
    )]
    InvalidDaemonTiming(u64, u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a project with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. Global config (`$COVENANT_CONFIG`, or `~/.config/covenant/config.yaml`)
    /// 3. Project config (`<project>/.covenant.yaml`, created by init)
    /// 4. Environment variables (COVENANT_* prefix, highest priority)
    pub fn load(project_dir: impl AsRef<Path>) -> Result<CovenantConfig> {
        let mut figment =
            Figment::new().merge(Serialized::defaults(CovenantConfig::default()));
        if let Some(global) = Self::global_config_path() {
            figment = figment.merge(Yaml::file(global));
        }
        let config: CovenantConfig = figment
            .merge(Yaml::file(project_dir.as_ref().join(CONFIG_FILE_NAME)))
            .merge(Env::prefixed("COVENANT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<CovenantConfig> {
        let config: CovenantConfig = Figment::new()
            .merge(Serialized::defaults(CovenantConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Where the optional machine-wide config lives. `COVENANT_CONFIG`
    /// overrides the XDG-style default under the home directory.
    fn global_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("COVENANT_CONFIG") {
            return Some(PathBuf::from(path));
        }
        std::env::var_os("HOME").map(|home| {
            Path::new(&home)
                .join(".config")
                .join("covenant")
                .join("config.yaml")
        })
    }

    /// Validate configuration after loading
    pub fn validate(config: &CovenantConfig) -> Result<(), ConfigError> {
        if config.budget <= 0.0 {
            return Err(ConfigError::InvalidBudget(config.budget));
        }
        if config.daily_budget <= 0.0 {
            return Err(ConfigError::InvalidDailyBudget(config.daily_budget));
        }
        if config.model.is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if config.max_implementation_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(
                config.max_implementation_attempts,
            ));
        }
        if config.max_phase_cycles == 0 {
            return Err(ConfigError::InvalidPhaseCycles(config.max_phase_cycles));
        }
        if config.competitive_agents == 0 || config.competitive_agents > 16 {
            return Err(ConfigError::InvalidCompetitiveAgents(
                config.competitive_agents,
            ));
        }
        if config.max_concurrent_agents == 0 || config.max_concurrent_agents > 100 {
            return Err(ConfigError::InvalidMaxConcurrent(
                config.max_concurrent_agents,
            ));
        }
        if config.locality_radius == 0 {
            return Err(ConfigError::InvalidLocalityRadius(config.locality_radius));
        }
        if config.check_interval == 0 {
            return Err(ConfigError::InvalidCheckInterval(config.check_interval));
        }

        if config.daemon.health_check_interval == 0
            || config.daemon.health_check_interval > config.daemon.max_idle
        {
            return Err(ConfigError::InvalidDaemonTiming(
                config.daemon.health_check_interval,
                config.daemon.max_idle,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        for (model, (input, output)) in &config.model_pricing {
            if *input < 0.0 || *output < 0.0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "Pricing for model '{model}' cannot be negative"
                )));
            }
        }

        Ok(())
    }
}
