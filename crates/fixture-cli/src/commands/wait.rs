//! Wait-ready command: poll a status document until Ready

use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use fixture_core::{FileStatusSource, FixtureConfig, PollPolicy, wait_until_ready};

use crate::error::Result;

/// Run the wait-ready command
pub fn run_wait_ready(
    config: &FixtureConfig,
    status_file: &Path,
    interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let mut policy = PollPolicy::from(&config.readiness);
    if let Some(secs) = interval_secs {
        policy.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = timeout_secs {
        policy.timeout = Duration::from_secs(secs);
    }

    println!(
        "{} Waiting up to {:?} for {}...",
        "=>".blue().bold(),
        policy.timeout,
        status_file.display().to_string().cyan()
    );
    let object = wait_until_ready(&FileStatusSource::new(status_file), policy)?;
    println!("{} {}", "OK".green().bold(), object.summary());
    Ok(())
}
