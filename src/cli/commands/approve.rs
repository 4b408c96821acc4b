//! Implementation of the `covenant approve` command.
//!
//! Non-interactive counterpart of `answer`: every open question gets the
//! assumption that best matches it, the interview is marked approved, and a
//! waiting daemon is signaled to continue.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::daemon::send_signal;
use crate::infrastructure::ProjectStore;

#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct ApproveOutput {
    pub success: bool,
    pub found: bool,
    pub already_approved: bool,
    pub signaled: bool,
}

impl CommandOutput for ApproveOutput {
    fn to_human(&self) -> String {
        if !self.found {
            return "No interview found.".to_string();
        }
        let first = if self.already_approved {
            "Already approved."
        } else {
            "Interview approved with default assumptions."
        };
        let second = if self.signaled {
            "Daemon signaled to continue."
        } else {
            "No daemon running. Start with: covenant daemon <project-dir>"
        };
        format!("{first}\n{second}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ApproveArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);

    let Some(mut interview) = store.load_interview()? else {
        let output_data = ApproveOutput {
            success: false,
            found: false,
            already_approved: false,
            signaled: false,
        };
        output(&output_data, json_mode);
        return Ok(());
    };

    let already_approved = interview.approved;
    if !already_approved {
        let questions = interview.questions.clone();
        for (index, question) in questions.iter().enumerate() {
            if !interview.user_answers.contains_key(question) {
                let (answer, _confidence) =
                    match_answer_to_question(question, &interview.assumptions, index);
                interview.user_answers.insert(question.clone(), answer);
            }
        }
        interview.approved = true;
        store.save_interview(&interview)?;
    }

    let signaled = send_signal(&args.project_dir, "approved")?;

    let output_data = ApproveOutput {
        success: true,
        found: true,
        already_approved,
        signaled,
    };
    output(&output_data, json_mode);
    Ok(())
}

/// Words carrying no matching signal.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "shall", "should", "may", "might", "can", "could",
    "must", "for", "to", "in", "of", "on", "at", "by", "with", "from", "about", "into",
    "through", "during", "before", "after", "above", "below", "between", "out", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "each", "every", "both", "few", "more", "most", "other", "some", "such", "no", "nor",
    "not", "only", "own", "same", "so", "than", "too", "very", "just", "because", "as", "until",
    "while", "if", "or", "and", "but", "yet", "what", "which", "who", "whom", "this", "that",
    "these", "those", "i", "me", "my", "we", "our", "you", "your", "he", "him", "his", "she",
    "her", "it", "its", "they", "them", "their",
];

fn significant_words(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .map(|word| {
            word.to_lowercase()
                .trim_matches(|c: char| "?.,!:;\"'()".contains(c))
                .to_string()
        })
        .filter(|word| !word.is_empty() && !STOPWORDS.contains(&word.as_str()))
        .collect()
}

/// Pick the assumption that best answers a question.
///
/// Tried in order: keyword overlap of at least two significant words, scored
/// as overlap over the larger word set; the assumption at the question's own
/// index, at half confidence; accepting the question as stated, at zero.
pub fn match_answer_to_question(
    question: &str,
    assumptions: &[String],
    question_index: usize,
) -> (String, f64) {
    let q_words = significant_words(question);
    if q_words.is_empty() {
        if let Some(assumption) = assumptions.get(question_index) {
            return (assumption.clone(), 0.5);
        }
        return ("Accepted as stated".to_string(), 0.0);
    }

    let mut best_match = String::new();
    let mut best_confidence = 0.0_f64;
    for assumption in assumptions {
        let a_words = significant_words(assumption);
        let overlap = q_words.intersection(&a_words).count();
        if overlap >= 2 {
            let confidence = overlap as f64 / q_words.len().max(a_words.len()) as f64;
            if confidence > best_confidence {
                best_confidence = confidence;
                best_match = assumption.clone();
            }
        }
    }
    if !best_match.is_empty() && best_confidence > 0.0 {
        return (best_match, best_confidence);
    }

    if let Some(assumption) = assumptions.get(question_index) {
        return (assumption.clone(), 0.5);
    }
    ("Accepted as stated".to_string(), 0.0)
}
