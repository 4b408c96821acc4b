//! Implementation of the `covenant validate` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::{ConfigLoader, ProjectStore};
use crate::services::ContractValidator;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct ValidateOutput {
    pub success: bool,
    pub tree_found: bool,
    pub passed: bool,
    pub reason: String,
    pub details: Vec<String>,
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        if !self.tree_found {
            return "No decomposition tree found.".to_string();
        }
        if self.passed {
            return "Validation PASSED".to_string();
        }
        let mut lines = vec![format!("Validation FAILED: {}", self.reason)];
        for detail in &self.details {
            lines.push(format!("  - {detail}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ValidateArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);
    let config = ConfigLoader::load(&args.project_dir)?;

    let Some(tree) = store.load_tree()? else {
        let output_data = ValidateOutput {
            success: false,
            tree_found: false,
            passed: false,
            reason: String::new(),
            details: Vec::new(),
        };
        output(&output_data, json_mode);
        return Ok(());
    };

    let contracts = store.load_all_contracts()?;
    let test_suites = store.load_all_test_suites()?;
    let validator = ContractValidator::new().with_locality_radius(config.locality_radius);
    let gate = validator.validate_all_contracts(&tree, &contracts, &test_suites);

    let output_data = ValidateOutput {
        success: gate.passed,
        tree_found: true,
        passed: gate.passed,
        reason: gate.reason,
        details: gate.details,
    };
    output(&output_data, json_mode);
    Ok(())
}
