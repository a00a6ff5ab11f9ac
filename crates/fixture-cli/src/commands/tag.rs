//! Tag command: recreate a tag at a branch tip

use std::path::Path;

use colored::Colorize;

use fixture_core::FixtureConfig;

use crate::error::Result;

/// Run the tag command
pub fn run_tag(
    config: FixtureConfig,
    name: &str,
    branch: Option<&str>,
    workdir: Option<&Path>,
) -> Result<()> {
    let branch = branch.unwrap_or(&config.branch).to_string();
    println!(
        "{} Recreating tag {} at the tip of {}...",
        "=>".blue().bold(),
        name.cyan(),
        branch.cyan()
    );

    let fixture = super::open_fixture(config, workdir)?;
    let tag = fixture.publish_tag(&branch, name)?;

    println!(
        "{} {} -> {}",
        "OK".green().bold(),
        tag.refname().cyan(),
        tag.target.to_string().yellow()
    );
    Ok(())
}
