//! Sync command: commit local files to a fixture branch and push

use std::path::Path;

use colored::Colorize;

use fixture_core::FixtureConfig;
use fixture_git::FileSet;

use crate::error::{CliError, Result};

/// Split `REPO_PATH=LOCAL_SOURCE`.
pub fn parse_file_arg(arg: &str) -> Result<(&str, &Path)> {
    match arg.split_once('=') {
        Some((target, source)) if !target.is_empty() && !source.is_empty() => {
            Ok((target, Path::new(source)))
        }
        _ => Err(CliError::user(format!(
            "expected FILE=SOURCE, got '{arg}'"
        ))),
    }
}

fn load_files(args: &[String]) -> Result<FileSet> {
    let mut files = FileSet::new();
    for arg in args {
        let (target, source) = parse_file_arg(arg)?;
        let content = fixture_fs::io::read_bytes(source)?;
        files.insert(target, content)?;
    }
    Ok(files)
}

/// Run the sync command
pub fn run_sync(
    config: FixtureConfig,
    branch: Option<&str>,
    workdir: Option<&Path>,
    file_args: &[String],
) -> Result<()> {
    let branch = branch.unwrap_or(&config.branch).to_string();
    let files = load_files(file_args)?;

    println!(
        "{} Syncing {} file(s) to {}...",
        "=>".blue().bold(),
        files.len(),
        branch.cyan()
    );

    let fixture = super::open_fixture(config, workdir)?;
    let outcome = fixture.sync(&branch, files)?;

    match outcome.commit {
        Some(commit) => println!(
            "{} Pushed {} to {}",
            "OK".green().bold(),
            commit.to_string().yellow(),
            branch.cyan()
        ),
        None => println!(
            "{} {} already holds these files; nothing pushed.",
            "OK".green().bold(),
            branch.cyan()
        ),
    }
    Ok(())
}
