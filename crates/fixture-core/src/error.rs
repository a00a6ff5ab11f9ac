//! Error types for fixture-core

use std::fmt;
use std::time::Duration;

/// Result type for fixture-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Step of a fixture flow, named in failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    Open,
    Reconcile,
    Commit,
    Push,
    ResolveTip,
    Tag,
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open working copy",
            Self::Reconcile => "reconcile branch",
            Self::Commit => "commit files",
            Self::Push => "push",
            Self::ResolveTip => "resolve branch tip",
            Self::Tag => "recreate tag",
        })
    }
}

/// Errors that can occur in fixture-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A fixture flow failed at a named step
    #[error("Fixture step '{step}' failed: {source}")]
    Step {
        step: FlowStep,
        #[source]
        source: fixture_git::Error,
    },

    /// Configuration is missing material or inconsistent
    #[error("Invalid fixture configuration: {message}")]
    Config { message: String },

    /// Polling gave up before the resource reported Ready
    #[error("Resource not ready after {after:?}: {last_message}")]
    NotReady { after: Duration, last_message: String },

    /// External command exited unsuccessfully
    #[error("Command `{command}` failed ({status}): {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    /// External command exceeded its time limit and was killed
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// I/O error outside the working copy
    #[error("I/O error during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Transparent wrappers for underlying crate errors
    /// Error from fixture-git outside a named flow step
    #[error(transparent)]
    Git(#[from] fixture_git::Error),

    /// Filesystem error from fixture-fs
    #[error(transparent)]
    Fs(#[from] fixture_fs::Error),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Step that failed, for flow errors.
    pub fn step(&self) -> Option<FlowStep> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Whether the failure was a time limit, at any layer.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Step { source, .. } | Self::Git(source) => source.is_timeout(),
            _ => false,
        }
    }
}

/// Attach a flow step to fixture-git failures.
pub(crate) trait StepContext<T> {
    fn step(self, step: FlowStep) -> Result<T>;
}

impl<T> StepContext<T> for std::result::Result<T, fixture_git::Error> {
    fn step(self, step: FlowStep) -> Result<T> {
        self.map_err(|source| Error::Step { step, source })
    }
}
