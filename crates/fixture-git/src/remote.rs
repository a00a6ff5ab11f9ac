//! Shared remote plumbing: callbacks and advertised-ref listing.

use std::cell::Cell;

use git2::{Direction, Oid, Remote, RemoteCallbacks};

use crate::auth::Authenticator;
use crate::deadline::Deadline;
use crate::Error;

/// Name of the single remote every fixture working copy tracks.
pub const REMOTE_NAME: &str = "origin";

/// libgit2 re-asks for credentials after a rejection; stop after this many.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Build callbacks wiring `auth` and `deadline` into a transfer.
///
/// Every callback that can abort checks the deadline first. Pushes add
/// their own negotiation callback on top.
pub(crate) fn callbacks<'a>(
    auth: &'a dyn Authenticator,
    deadline: &'a Deadline,
) -> RemoteCallbacks<'a> {
    let attempts = Cell::new(0u32);
    let mut callbacks = RemoteCallbacks::new();

    callbacks.credentials(move |url, username_from_url, allowed| {
        if deadline.expired() {
            return Err(deadline.abort_error());
        }
        let attempt = attempts.get() + 1;
        attempts.set(attempt);
        if attempt > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(&format!(
                "authentication rejected by {url} after {MAX_CREDENTIAL_ATTEMPTS} attempts"
            )));
        }
        tracing::debug!(url = %url, attempt, ?allowed, "credential request");
        auth.credentials(url, username_from_url, allowed)
    });

    callbacks.certificate_check(move |cert, host| {
        if deadline.expired() {
            return Err(deadline.abort_error());
        }
        auth.check_host(cert, host)
    });

    callbacks.transfer_progress(move |progress| {
        tracing::trace!(
            received = progress.received_objects(),
            total = progress.total_objects(),
            "transfer progress"
        );
        !deadline.expired()
    });

    callbacks.sideband_progress(move |_| !deadline.expired());

    callbacks
}

/// Map a transfer failure, reporting a timeout if the deadline was the cause.
pub(crate) fn transfer_error(
    err: git2::Error,
    deadline: &Deadline,
    operation: &str,
    otherwise: impl FnOnce(git2::Error) -> Error,
) -> Error {
    if deadline.expired() {
        tracing::warn!(operation, limit = ?deadline.limit(), "network operation timed out");
        deadline.timeout(operation)
    } else {
        otherwise(err)
    }
}

/// Refs a remote advertises, as seen by `git ls-remote`.
#[derive(Debug, Clone, Default)]
pub struct RemoteRefs {
    refs: Vec<(String, Oid)>,
    default_branch: Option<String>,
}

impl RemoteRefs {
    /// Whether the remote advertises exactly `refname`.
    pub fn contains(&self, refname: &str) -> bool {
        self.refs.iter().any(|(name, _)| name == refname)
    }

    pub fn target(&self, refname: &str) -> Option<Oid> {
        self.refs
            .iter()
            .find(|(name, _)| name == refname)
            .map(|(_, oid)| *oid)
    }

    /// Branch names under `refs/heads/`.
    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.refs
            .iter()
            .filter_map(|(name, _)| name.strip_prefix("refs/heads/"))
    }

    /// Whether the remote has no branches at all.
    pub fn is_empty(&self) -> bool {
        self.branches().next().is_none()
    }

    /// The branch the remote HEAD points at.
    ///
    /// Uses the advertised symref when the transport provides it, otherwise
    /// the first branch whose tip equals HEAD's.
    pub fn default_branch(&self) -> Option<&str> {
        if let Some(name) = &self.default_branch {
            return Some(name.as_str());
        }
        let head = self.target("HEAD")?;
        self.refs
            .iter()
            .filter(|(_, oid)| *oid == head)
            .find_map(|(name, _)| name.strip_prefix("refs/heads/"))
    }
}

/// List the refs `remote` advertises.
pub(crate) fn list_refs(
    remote: &mut Remote<'_>,
    auth: &dyn Authenticator,
    deadline: &Deadline,
) -> std::result::Result<RemoteRefs, git2::Error> {
    let connection = remote.connect_auth(Direction::Fetch, Some(callbacks(auth, deadline)), None)?;

    let refs = connection
        .list()?
        .iter()
        .map(|head| (head.name().to_string(), head.oid()))
        .collect();
    let default_branch = connection
        .default_branch()
        .ok()
        .and_then(|buf| buf.as_str().map(str::to_string))
        .and_then(|name| name.strip_prefix("refs/heads/").map(str::to_string));

    Ok(RemoteRefs {
        refs,
        default_branch,
    })
}

/// Open a detached remote for `url` and list its refs.
pub(crate) fn list_url_refs(
    url: &str,
    auth: &dyn Authenticator,
    deadline: &Deadline,
) -> std::result::Result<RemoteRefs, git2::Error> {
    let mut remote = Remote::create_detached(url)?;
    list_refs(&mut remote, auth, deadline)
}
