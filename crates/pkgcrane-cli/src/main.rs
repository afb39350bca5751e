#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod commands;
mod logging;

use clap::Parser;
use commands::cleanup::CleanupArgs;
use commands::install::InstallArgs;
use miette::Result;
use pkgcrane_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pkgcrane")]
#[command(author, version, about = "Install package dependencies and clean up unreleased package versions", long_about = None)]
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

    /// Install the project's package dependencies into an org
    Install(InstallArgs),

    /// Delete unreleased versions of a package matching Major.Minor.Patch
    Cleanup(CleanupArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Install(args)) => {
            let span = tracing::info_span!("install", cmd = "install", cwd = %cwd.display());
            let _guard = span.enter();
            commands::install::run(&config.cwd, args, cli.json)
        }
        Some(Commands::Cleanup(args)) => {
            let span = tracing::info_span!("cleanup", cmd = "cleanup", package = %args.package);
            let _guard = span.enter();
            commands::cleanup::run(&config.cwd, args, cli.json)
        }
    }
}
