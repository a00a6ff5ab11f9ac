//! Caller-supplied time limits for network operations.

use std::time::{Duration, Instant};

use crate::Error;

/// Deadline for a single clone, fetch, ls-remote or push.
///
/// Remote callbacks check it and abort the transfer once it has passed;
/// the failure is then reported as [`Error::Timeout`] instead of a
/// transport error. Nothing is retried.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    /// Error for `operation` if the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<(), Error> {
        if self.expired() {
            Err(self.timeout(operation))
        } else {
            Ok(())
        }
    }

    pub fn timeout(&self, operation: &str) -> Error {
        Error::Timeout {
            operation: operation.to_string(),
            after: self.limit,
        }
    }

    /// libgit2-level error returned from callbacks to abort a transfer.
    pub(crate) fn abort_error(&self) -> git2::Error {
        git2::Error::new(
            git2::ErrorCode::User,
            git2::ErrorClass::Net,
            format!("operation exceeded {:?} deadline", self.limit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_deadline_is_expired() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert!(matches!(
            deadline.check("fetch"),
            Err(Error::Timeout { .. })
        ));
    }

    #[test]
    fn generous_deadline_passes() {
        let deadline = Deadline::after(Duration::from_secs(3600));
        assert!(!deadline.expired());
        assert!(deadline.check("fetch").is_ok());
    }
}
