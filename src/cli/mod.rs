//! Command-line interface for the covenant pipeline.
//!
//! Every subcommand follows the same shape: an `XArgs` struct parsed by
//! clap, a serializable `XOutput` rendered either as human text or JSON
//! (global `--json`), and an `execute(args, json_mode)` entry point. The
//! commands never talk to the scheduler internals directly; they go through
//! [`crate::services::Scheduler`], [`crate::infrastructure::ProjectStore`],
//! and the daemon helpers, the same surfaces the tests use.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "covenant")]
#[command(about = "Contract-first component pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new project directory
    Init(commands::init::InitArgs),

    /// Run pipeline bursts in the foreground
    Run(commands::run::RunArgs),

    /// Run the signal-driven daemon
    Daemon(commands::daemon::DaemonArgs),

    /// Gracefully stop a running daemon
    Stop(commands::stop::StopArgs),

    /// Send a message to the running daemon over its FIFO
    Signal(commands::signal::SignalArgs),

    /// Show run, tree, and daemon status
    Status(commands::status::StatusArgs),

    /// Answer interview questions interactively
    Answer(commands::answer::AnswerArgs),

    /// Approve the interview with default assumptions
    Approve(commands::approve::ApproveArgs),

    /// Re-run the contract validation gate
    Validate(commands::validate::ValidateArgs),

    /// Show the audit trail
    Log(commands::log::LogArgs),

    /// Rebuild a single component
    Build(commands::build::BuildArgs),

    /// List archived attempts for a component
    Attempts(commands::attempts::AttemptsArgs),

    /// Resume a paused or failed run
    Resume(commands::resume::ResumeArgs),

    /// Render the decomposition tree
    Tree(commands::tree::TreeArgs),
}

/// Report a command failure on stderr and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
