//! Implementation of the `covenant answer` command.

use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::ProjectStore;

#[derive(Args, Debug)]
pub struct AnswerArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct AnswerOutput {
    pub success: bool,
    pub found: bool,
    pub already_approved: bool,
    pub answered: usize,
}

impl CommandOutput for AnswerOutput {
    fn to_human(&self) -> String {
        if !self.found {
            return "No interview found. Run 'covenant run' first.".to_string();
        }
        if self.already_approved {
            return "Interview already approved.".to_string();
        }
        "\nInterview complete. Run 'covenant run' to proceed.".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AnswerArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);

    let Some(mut interview) = store.load_interview()? else {
        let output_data = AnswerOutput {
            success: false,
            found: false,
            already_approved: false,
            answered: 0,
        };
        output(&output_data, json_mode);
        return Ok(());
    };

    if interview.approved {
        let output_data = AnswerOutput {
            success: true,
            found: true,
            already_approved: true,
            answered: interview.user_answers.len(),
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    println!("Answer each question (or press Enter to accept assumption):\n");
    let questions = interview.questions.clone();
    for question in questions {
        let assumption = default_assumption(&question, &interview.assumptions)
            .unwrap_or("No default")
            .to_string();
        print!("Q: {question}\n  [Default: {assumption}]\n  A: ");
        io::stdout().flush()?;

        let mut raw = String::new();
        io::stdin().read_line(&mut raw)?;
        let answer = raw.trim();
        let chosen = if answer.is_empty() {
            assumption
        } else {
            answer.to_string()
        };
        interview.user_answers.insert(question, chosen);
    }

    interview.approved = true;
    store.save_interview(&interview)?;

    let output_data = AnswerOutput {
        success: true,
        found: true,
        already_approved: false,
        answered: interview.user_answers.len(),
    };
    output(&output_data, json_mode);
    Ok(())
}

/// First assumption that literally appears inside the question, if any.
fn default_assumption<'a>(question: &str, assumptions: &'a [String]) -> Option<&'a str> {
    let lowered = question.to_lowercase();
    assumptions
        .iter()
        .find(|a| lowered.contains(&a.to_lowercase()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_assumption_substring_match() {
        let assumptions = ["utf-8".to_string(), "daily".to_string()];
        assert_eq!(
            default_assumption("Should the export run daily?", &assumptions),
            Some("daily")
        );
    }

    #[test]
    fn test_default_assumption_none_when_no_overlap() {
        let assumptions = ["utf-8".to_string()];
        assert_eq!(default_assumption("What color scheme?", &assumptions), None);
    }
}
