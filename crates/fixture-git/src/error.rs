//! Error types for fixture-git

use std::fmt;
use std::time::Duration;

/// Result type for fixture-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a commit that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    /// Checking that the requested branch is checked out
    Branch,
    /// Reading content or writing it into the working tree
    Write,
    /// Adding paths to the index
    Stage,
    /// Writing the tree and commit objects
    Commit,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Branch => "branch check",
            Self::Write => "write",
            Self::Stage => "stage",
            Self::Commit => "commit",
        })
    }
}

/// Where a tag deletion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagLocus {
    Local,
    Remote,
}

impl fmt::Display for TagLocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Errors that can occur in fixture-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid auth configuration: {message}")]
    AuthConfig { message: String },

    #[error("Failed to clone {url}: {message}")]
    Clone { url: String, message: String },

    #[error("Failed to fetch from {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Reference '{name}' not found")]
    RefNotFound { name: String },

    #[error("Could not resolve reference '{name}': {source}")]
    ReferenceResolution {
        name: String,
        #[source]
        source: git2::Error,
    },

    #[error("Invalid reference name: {name}")]
    InvalidRefName { name: String },

    #[error("Invalid refspec '{spec}': {reason}")]
    InvalidRefspec { spec: String, reason: String },

    #[error("Could not checkout branch '{branch}': {source}")]
    Checkout {
        branch: String,
        #[source]
        source: git2::Error,
    },

    #[error("Commit failed during {step}: {message}")]
    Commit { step: CommitStep, message: String },

    #[error("Push failed: {message}")]
    Push { message: String },

    #[error("Could not delete {locus} tag '{name}': {source}")]
    TagDelete {
        name: String,
        locus: TagLocus,
        #[source]
        source: Box<Error>,
    },

    #[error("Could not create tag '{name}': {source}")]
    TagCreate {
        name: String,
        #[source]
        source: git2::Error,
    },

    #[error("Could not publish tag '{name}': {source}")]
    TagPublish {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] fixture_fs::Error),
}

impl Error {
    pub(crate) fn auth_config(message: impl Into<String>) -> Self {
        Self::AuthConfig {
            message: message.into(),
        }
    }

    pub(crate) fn commit(step: CommitStep, message: impl fmt::Display) -> Self {
        Self::Commit {
            step,
            message: message.to_string(),
        }
    }

    /// Whether this error, or the step error it wraps, is a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::TagDelete { source, .. } | Self::TagPublish { source, .. } => {
                source.is_timeout()
            }
            _ => false,
        }
    }
}
