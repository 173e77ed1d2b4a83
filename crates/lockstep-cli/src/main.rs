#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use lockstep_core::Config;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lockstep")]
#[command(author, version, about = "Inspect package lock files, restore order and pending deletions", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Print packages from the lock file, dependencies first
    Order {
        /// Lock file to read (defaults to the project's lock file)
        #[arg(long, value_name = "PATH")]
        lock: Option<PathBuf>,
    },

    /// Show packages added and removed between two lock files
    Diff {
        /// The earlier lock file (a missing file counts as empty)
        original: PathBuf,

        /// The later lock file (a missing file counts as empty)
        updated: PathBuf,
    },

    /// Manage package directories marked for deletion
    Deleteme {
        #[command(subcommand)]
        deleteme_cmd: DeletemeCommands,
    },

    /// Show resolved package folders
    Paths,
}

#[derive(clap::Subcommand, Debug)]
enum DeletemeCommands {
    /// List package directories marked for deletion (removes orphan markers)
    Scan {
        /// Packages folder (defaults to the configured repository path)
        #[arg(long, value_name = "DIR")]
        packages: Option<PathBuf>,
    },

    /// Delete every marked package directory
    Sweep {
        /// Packages folder (defaults to the configured repository path)
        #[arg(long, value_name = "DIR")]
        packages: Option<PathBuf>,
    },

    /// Mark a package directory for deletion on the next sweep
    Mark {
        /// Package directory, named `<id>.<version>`
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    let span = tracing::info_span!("lockstep", cwd = %cwd.display());
    let _guard = span.enter();

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(cli.json),
        Some(Commands::Order { lock }) => commands::order::run(&cwd, lock.as_deref(), cli.json),
        Some(Commands::Diff { original, updated }) => {
            commands::diff::run(&cwd, &original, &updated, cli.json)
        }
        Some(Commands::Deleteme { deleteme_cmd }) => {
            let action = match deleteme_cmd {
                DeletemeCommands::Scan { packages } => commands::deleteme::DeletemeAction::Scan {
                    cwd: cwd.clone(),
                    packages,
                },
                DeletemeCommands::Sweep { packages } => {
                    commands::deleteme::DeletemeAction::Sweep {
                        cwd: cwd.clone(),
                        packages,
                    }
                }
                DeletemeCommands::Mark { dir } => commands::deleteme::DeletemeAction::Mark {
                    cwd: cwd.clone(),
                    dir,
                },
            };
            commands::deleteme::run(action, cli.json)
        }
        Some(Commands::Paths) => commands::paths::run(&cwd, cli.json),
    }
}
