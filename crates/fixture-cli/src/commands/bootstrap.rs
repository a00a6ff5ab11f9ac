//! Bootstrap commands

use std::path::Path;

use colored::Colorize;

use fixture_core::FixtureConfig;

use crate::error::Result;

/// Print the bootstrap command line. Secrets are redacted.
pub fn run_bootstrap_args(config: FixtureConfig, workdir: Option<&Path>) -> Result<()> {
    let fixture = super::open_fixture(config, workdir)?;
    let invocation = fixture.bootstrap_invocation()?;
    println!("{invocation}");
    Ok(())
}

/// Seed the bootstrap path on the branch, then run the bootstrap command.
pub fn run_bootstrap(
    config: FixtureConfig,
    branch: Option<&str>,
    workdir: Option<&Path>,
) -> Result<()> {
    let branch = branch.unwrap_or(&config.branch).to_string();
    let fixture = super::open_fixture(config, workdir)?;

    println!(
        "{} Bootstrapping from {} ({})...",
        "=>".blue().bold(),
        fixture.url().cyan(),
        branch.cyan()
    );
    let output = fixture.bootstrap(&branch)?;
    if !output.trim().is_empty() {
        println!("{}", output.trim_end().dimmed());
    }
    println!("{} Bootstrap finished.", "OK".green().bold());
    Ok(())
}
