//! gpstracker CLI - replay and simulate GPS tracks through the tracker core.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use commands::common::{default_config_path, default_log_dir, load_config};
use commands::output::EventPrinter;
use commands::replay::ReplayArgs;
use commands::simulate::SimulateArgs;
use error::CliError;
use gpstracker::logging::{init_file_logging, init_logging, LoggingGuard, DEFAULT_LOG_FILE};

#[derive(Parser)]
#[command(name = "gpstracker")]
#[command(version = gpstracker::VERSION)]
#[command(about = "Filter GPS fixes and follow the tracker lifecycle", long_about = None)]
struct Cli {
    /// Print events as JSON lines in the host bridge format
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (default: ~/.gpstracker/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mirror log output to stdout
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded JSON track
    Replay(ReplayArgs),

    /// Drive a synthetic straight-line track
    Simulate(SimulateArgs),

    /// Validate a configuration file
    CheckConfig {
        /// File to check
        file: PathBuf,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination (default: ~/.gpstracker/config.ini)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let printer = EventPrinter::new(cli.json);

    match cli.command {
        Commands::CheckConfig { file } => commands::check::run_check(&file, cli.json),
        Commands::InitConfig { path, force } => {
            commands::check::run_init(&path.unwrap_or_else(default_config_path), force)
        }
        Commands::Replay(args) => {
            let _logging = start_logging(cli.verbose && !cli.json)?;
            let config = load_config(cli.config.as_deref())?;
            let cancel = install_interrupt_handler()?;
            runtime()?.block_on(commands::replay::run(args, config, printer, cancel))
        }
        Commands::Simulate(args) => {
            let _logging = start_logging(cli.verbose && !cli.json)?;
            let config = load_config(cli.config.as_deref())?;
            let cancel = install_interrupt_handler()?;
            runtime()?.block_on(commands::simulate::run(args, config, printer, cancel))
        }
    }
}

fn start_logging(stdout: bool) -> Result<LoggingGuard, CliError> {
    let dir = default_log_dir();
    let result = if stdout {
        init_logging(&dir, DEFAULT_LOG_FILE)
    } else {
        init_file_logging(&dir, DEFAULT_LOG_FILE)
    };
    result.map_err(|e| CliError::LoggingInit(format!("{}: {}", dir.display(), e)))
}

/// Ctrl-C cancels the returned token; the session then stops gracefully.
fn install_interrupt_handler() -> Result<CancellationToken, CliError> {
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::Signal(e.to_string()))?;
    Ok(cancel)
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}
