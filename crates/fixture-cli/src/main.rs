//! Fixture CLI
//!
//! Commits, pushes and tags git fixture repositories for end-to-end test
//! harnesses.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .try_init();
    tracing::debug!("verbose mode enabled");

    match cli.command {
        Some(cmd) => execute_command(cli.config.as_deref(), cmd),
        None => {
            println!("{} git fixture synchronization", "fixture".green().bold());
            println!();
            println!("Run {} for available commands.", "fixture --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(config: Option<&std::path::Path>, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Sync {
            branch,
            workdir,
            files,
        } => {
            let config = commands::load_config(config)?;
            commands::run_sync(config, branch.as_deref(), workdir.as_deref(), &files)
        }
        Commands::Tag {
            name,
            branch,
            workdir,
        } => {
            let config = commands::load_config(config)?;
            commands::run_tag(config, &name, branch.as_deref(), workdir.as_deref())
        }
        Commands::Bootstrap { branch, workdir } => {
            let config = commands::load_config(config)?;
            commands::run_bootstrap(config, branch.as_deref(), workdir.as_deref())
        }
        Commands::BootstrapArgs { workdir } => {
            let config = commands::load_config(config)?;
            commands::run_bootstrap_args(config, workdir.as_deref())
        }
        Commands::WaitReady {
            status_file,
            interval_secs,
            timeout_secs,
        } => {
            let config = commands::load_config(config)?;
            commands::run_wait_ready(&config, &status_file, interval_secs, timeout_secs)
        }
    }
}
