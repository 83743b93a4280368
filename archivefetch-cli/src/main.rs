//! archivefetch CLI - Command-line interface
//!
//! Downloads every file of an archive collection, optionally filtered by a
//! glob, across a bounded pool of parallel workers.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use archivefetch::logging::{init_logging, FILE_ONLY_TARGET};
use clap::{Parser, Subcommand};
use console::style;
use tracing::error;

use commands::common::ClientArgs;
use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use commands::list::ListArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "archivefetch")]
#[command(version, about = "Parallel bulk downloads from archive collections", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a collection into a local directory
    Download {
        /// Collection identifier
        identifier: String,

        /// Destination directory (created if missing)
        #[arg(short, long = "dest", value_name = "DIR")]
        destination: Option<PathBuf>,

        /// Only fetch files matching this glob; alternatives separated by '|'
        #[arg(short, long, value_name = "PATTERN")]
        glob: Option<String>,

        /// Number of parallel workers [default: from config, else 4]
        #[arg(short, long)]
        workers: Option<usize>,

        /// Seconds to wait for any one worker; 0 waits indefinitely
        #[arg(long, value_name = "SECS")]
        worker_timeout: Option<u64>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// List a collection's files without downloading
    List {
        /// Collection identifier
        identifier: String,

        /// Only list files matching this glob; alternatives separated by '|'
        #[arg(short, long, value_name = "PATTERN")]
        glob: Option<String>,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// View or modify configuration settings
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Create the configuration file with default settings
    Init,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => return report_error(&CliError::from(e)),
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Download {
            identifier,
            destination,
            glob,
            workers,
            worker_timeout,
            no_progress,
            client,
        } => commands::download::run(DownloadArgs {
            identifier,
            destination,
            glob,
            workers,
            worker_timeout,
            client,
            no_progress,
        }),
        Commands::List {
            identifier,
            glob,
            client,
        } => commands::list::run(ListArgs {
            identifier,
            glob,
            client,
        }),
        Commands::Config(command) => commands::config::run(command),
        Commands::Init => commands::init::run(),
    }
}

fn report_error(err: &CliError) -> ExitCode {
    error!(target: FILE_ONLY_TARGET, error = %err, "Command failed");
    eprintln!("{} {}", style("error:").red().bold(), err);
    ExitCode::from(err.exit_code())
}
