//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Git fixture synchronization - commit, push and tag fixture repositories
#[derive(Parser, Debug)]
#[command(name = "fixture")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (TOML, JSON or YAML); environment variables
    /// override it
    #[arg(short, long, global = true, env = "FIXTURE_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Commit files to a branch and push them
    ///
    /// Each FILE=SOURCE pair writes the content of the local file SOURCE to
    /// FILE in the repository. Nothing is pushed when the branch already
    /// holds exactly these contents.
    ///
    /// Examples:
    ///   fixture sync --branch main apps/podinfo.yaml=./podinfo.yaml
    ///   fixture sync --branch e2e/update -w /tmp/wc policy.yaml=policy.yaml
    Sync {
        /// Branch to commit on (created when missing)
        #[arg(short, long)]
        branch: Option<String>,

        /// Directory for working copies; reused between runs
        #[arg(short, long)]
        workdir: Option<PathBuf>,

        /// Files as REPO_PATH=LOCAL_SOURCE
        #[arg(required = true, value_name = "FILE=SOURCE")]
        files: Vec<String>,
    },

    /// Recreate a tag at the tip of a branch and publish it
    Tag {
        /// Tag name
        name: String,

        /// Branch whose tip the tag points at
        #[arg(short, long)]
        branch: Option<String>,

        /// Directory for working copies; reused between runs
        #[arg(short, long)]
        workdir: Option<PathBuf>,
    },

    /// Seed the bootstrap path and run the bootstrap command
    Bootstrap {
        /// Branch the cluster syncs from
        #[arg(short, long)]
        branch: Option<String>,

        /// Directory for working copies and key material
        #[arg(short, long)]
        workdir: Option<PathBuf>,
    },

    /// Print the bootstrap command line for the configured transport
    BootstrapArgs {
        /// Directory that receives key material referenced by the arguments
        #[arg(short, long)]
        workdir: Option<PathBuf>,
    },

    /// Poll a status document until its Ready condition is True
    WaitReady {
        /// JSON, YAML or TOML file holding the resource status
        #[arg(long, value_name = "FILE")]
        status_file: PathBuf,

        /// Seconds between polls (defaults to configuration)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Seconds before giving up (defaults to configuration)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}
