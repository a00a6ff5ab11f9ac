//! Branch reconciliation against local and remote state.
//!
//! The decision itself is a pure function of [`BranchState`]; everything
//! else in this module gathers that state and carries out the action.

use git2::build::CheckoutBuilder;
use git2::{Commit, Oid, Reference, Repository};

use crate::absence;
use crate::remote::REMOTE_NAME;
use crate::repository::RepositoryHandle;
use crate::{Error, Result};

/// Where a branch exists right now. Derived fresh on every reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchState {
    pub remote_exists: bool,
    pub local_exists: bool,
}

/// What reconciling a branch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Force-checkout the existing local branch
    CheckoutLocal,
    /// Create a local branch at the remote tip, track it, check it out
    TrackRemote,
    /// Create the branch at the current HEAD and check it out
    CreateFromHead,
}

/// Pick the action for a branch state.
///
/// A local branch always wins, whether or not the remote also has it.
pub fn decide(state: BranchState) -> Action {
    match (state.remote_exists, state.local_exists) {
        (_, true) => Action::CheckoutLocal,
        (true, false) => Action::TrackRemote,
        (false, false) => Action::CreateFromHead,
    }
}

/// Result of a reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Branch HEAD is now attached to
    pub checked_out: String,
    pub action: Action,
    /// Tip of the checked-out branch; `None` while it is still unborn
    pub tip: Option<Oid>,
}

/// Bring `branch` into a checked-out state.
///
/// Fetches first so the remote half of the decision reflects the remote as
/// it is now, not as it was at clone time.
pub fn reconcile(handle: &RepositoryHandle, branch: &str) -> Result<ReconcileOutcome> {
    validate_branch_name(branch)?;
    handle.fetch()?;
    reconcile_local(handle.repo(), branch)
}

/// Reconcile using only the remote-tracking refs already present locally.
pub fn reconcile_local(repo: &Repository, branch: &str) -> Result<ReconcileOutcome> {
    validate_branch_name(branch)?;

    let local_name = format!("refs/heads/{branch}");
    let remote_name = format!("refs/remotes/{REMOTE_NAME}/{branch}");

    let local = lookup(repo, &local_name)?;
    let remote = lookup(repo, &remote_name)?;

    let state = BranchState {
        remote_exists: remote.is_some(),
        local_exists: local.is_some(),
    };
    let action = decide(state);
    tracing::debug!(branch = %branch, ?state, ?action, "reconciling branch");

    let tip = match action {
        Action::CheckoutLocal => {
            let commit = peel(local, &local_name)?;
            checkout(repo, branch, &commit)?;
            Some(commit.id())
        }
        Action::TrackRemote => {
            let commit = peel(remote, &remote_name)?;
            let mut created = repo.branch(branch, &commit, false)?;
            created.set_upstream(Some(&format!("{REMOTE_NAME}/{branch}")))?;
            checkout(repo, branch, &commit)?;
            Some(commit.id())
        }
        Action::CreateFromHead => {
            let head = absence::optional(repo.head()).map_err(|source| {
                Error::ReferenceResolution {
                    name: "HEAD".into(),
                    source,
                }
            })?;
            match head {
                Some(head) => {
                    let commit = head.peel_to_commit()?;
                    repo.branch(branch, &commit, false)?;
                    checkout(repo, branch, &commit)?;
                    Some(commit.id())
                }
                None => {
                    // Unborn: the branch comes into being with its first commit.
                    repo.set_head(&local_name)
                        .map_err(|source| Error::Checkout {
                            branch: branch.to_string(),
                            source,
                        })?;
                    None
                }
            }
        }
    };

    tracing::info!(branch = %branch, ?action, tip = ?tip, "branch checked out");
    Ok(ReconcileOutcome {
        checked_out: branch.to_string(),
        action,
        tip,
    })
}

pub(crate) fn validate_branch_name(branch: &str) -> Result<()> {
    if branch.is_empty() || !Reference::is_valid_name(&format!("refs/heads/{branch}")) {
        return Err(Error::InvalidRefName {
            name: branch.to_string(),
        });
    }
    Ok(())
}

fn lookup<'r>(repo: &'r Repository, name: &str) -> Result<Option<Reference<'r>>> {
    absence::optional(repo.find_reference(name)).map_err(|source| Error::ReferenceResolution {
        name: name.to_string(),
        source,
    })
}

fn peel<'r>(reference: Option<Reference<'r>>, name: &str) -> Result<Commit<'r>> {
    let reference = reference.ok_or_else(|| Error::RefNotFound {
        name: name.to_string(),
    })?;
    reference
        .peel_to_commit()
        .map_err(|source| Error::ReferenceResolution {
            name: name.to_string(),
            source,
        })
}

fn checkout(repo: &Repository, branch: &str, commit: &Commit<'_>) -> Result<()> {
    let checkout_error = |source| Error::Checkout {
        branch: branch.to_string(),
        source,
    };

    let mut opts = CheckoutBuilder::new();
    opts.force();
    repo.checkout_tree(commit.as_object(), Some(&mut opts))
        .map_err(checkout_error)?;
    repo.set_head(&format!("refs/heads/{branch}"))
        .map_err(checkout_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, true, Action::CheckoutLocal)]
    #[case(true, false, Action::TrackRemote)]
    #[case(false, true, Action::CheckoutLocal)]
    #[case(false, false, Action::CreateFromHead)]
    fn decision_table(#[case] remote: bool, #[case] local: bool, #[case] expected: Action) {
        let state = BranchState {
            remote_exists: remote,
            local_exists: local,
        };
        assert_eq!(decide(state), expected);
    }

    #[rstest]
    #[case("main")]
    #[case("feature/e2e-1")]
    #[case("fixture_branch.2")]
    fn accepts_valid_branch_names(#[case] name: &str) {
        assert!(validate_branch_name(name).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("has space")]
    #[case("double..dot")]
    #[case("trailing/")]
    #[case("ends.lock")]
    #[case("tilde~1")]
    fn rejects_invalid_branch_names(#[case] name: &str) {
        assert!(matches!(
            validate_branch_name(name),
            Err(Error::InvalidRefName { .. })
        ));
    }

    #[test]
    fn unborn_repository_points_head_at_new_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let outcome = reconcile_local(&repo, "fixture").unwrap();
        assert_eq!(outcome.action, Action::CreateFromHead);
        assert_eq!(outcome.tip, None);
        let head = repo.find_reference("HEAD").unwrap();
        assert_eq!(head.symbolic_target(), Some("refs/heads/fixture"));
    }
}
