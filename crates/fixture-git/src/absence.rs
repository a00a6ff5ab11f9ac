//! Classification of git failures into expected absence versus fatal errors.
//!
//! Branch lookup, tag deletion and delete-refspec pushes all treat "the ref
//! is not there" as a normal input rather than a failure. This module is the
//! single place that judgment is made.

use git2::ErrorCode;

/// Outcome of classifying a git failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The target does not exist; callers turn this into control flow.
    Absent,
    /// Anything else; callers propagate it.
    Fatal,
}

/// Classify a libgit2 error.
///
/// An unborn HEAD counts as absent: an empty repository has no current
/// commit, which the reconciler handles like any other missing ref.
pub fn classify(err: &git2::Error) -> Presence {
    match err.code() {
        ErrorCode::NotFound | ErrorCode::UnbornBranch => Presence::Absent,
        _ => Presence::Fatal,
    }
}

/// Turn a lookup result into `Ok(None)` when the target is absent.
pub fn optional<T>(result: Result<T, git2::Error>) -> Result<Option<T>, git2::Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if classify(&err) == Presence::Absent => Ok(None),
        Err(err) => Err(err),
    }
}

/// Whether a textual server reply reports that a ref does not exist.
///
/// Remotes answer a delete of a missing ref in their own words; these are
/// the phrasings git, libgit2 and the common forges use.
pub fn is_absent_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "does not exist",
        "not found",
        "no such ref",
        "non-existent ref",
        "nonexistent ref",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}
