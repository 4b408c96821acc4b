//! Covenant CLI entry point.

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use covenant::cli::{Cli, Commands};
use covenant::domain::models::LoggingConfig;
use covenant::infrastructure::config::ConfigLoader;
use covenant::infrastructure::{logging, ProjectStore};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.command);

    let result = match cli.command {
        Commands::Init(args) => covenant::cli::commands::init::execute(args, cli.json).await,
        Commands::Run(args) => covenant::cli::commands::run::execute(args, cli.json).await,
        Commands::Daemon(args) => covenant::cli::commands::daemon::execute(args, cli.json).await,
        Commands::Stop(args) => covenant::cli::commands::stop::execute(args, cli.json).await,
        Commands::Signal(args) => covenant::cli::commands::signal::execute(args, cli.json).await,
        Commands::Status(args) => covenant::cli::commands::status::execute(args, cli.json).await,
        Commands::Answer(args) => covenant::cli::commands::answer::execute(args, cli.json).await,
        Commands::Approve(args) => covenant::cli::commands::approve::execute(args, cli.json).await,
        Commands::Validate(args) => covenant::cli::commands::validate::execute(args, cli.json).await,
        Commands::Log(args) => covenant::cli::commands::log::execute(args, cli.json).await,
        Commands::Build(args) => covenant::cli::commands::build::execute(args, cli.json).await,
        Commands::Attempts(args) => covenant::cli::commands::attempts::execute(args, cli.json).await,
        Commands::Resume(args) => covenant::cli::commands::resume::execute(args, cli.json).await,
        Commands::Tree(args) => covenant::cli::commands::tree::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        covenant::cli::handle_error(err, cli.json);
    }
}

/// Project-aware logging for the long-running commands, defaults for the
/// rest. The daemon also gets a rolling file under `.covenant/logs/`; the
/// returned guard flushes it on exit. Config errors fall back to default
/// logging here and surface properly once the command runs.
fn init_logging(command: &Commands) -> Option<WorkerGuard> {
    match command {
        Commands::Daemon(args) => {
            let config = ConfigLoader::load(&args.project_dir).unwrap_or_default();
            let logs = ProjectStore::new(&args.project_dir).state_dir().join("logs");
            logging::init(&config.logging, Some(&logs))
        }
        Commands::Run(args) => {
            let config = ConfigLoader::load(&args.project_dir).unwrap_or_default();
            logging::init(&config.logging, None)
        }
        _ => logging::init(&LoggingConfig::default(), None),
    }
}
