//! Push executor with typed refspecs and per-ref outcomes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use git2::{BranchType, Oid, PushOptions, Reference, Repository};

use crate::absence;
use crate::deadline::Deadline;
use crate::remote::{self, REMOTE_NAME};
use crate::repository::RepositoryHandle;
use crate::{Error, Result};

/// One push refspec: `[+]src:dst`, or `:dst` for a delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Refspec {
    src: Option<String>,
    dst: String,
    force: bool,
}

impl Refspec {
    /// `refs/heads/<name>:refs/heads/<name>`
    pub fn branch(name: &str) -> Self {
        let full = format!("refs/heads/{name}");
        Self {
            src: Some(full.clone()),
            dst: full,
            force: false,
        }
    }

    /// `:<dst>`, removing `dst` on the remote.
    pub fn delete(dst: impl Into<String>) -> Self {
        Self {
            src: None,
            dst: dst.into(),
            force: false,
        }
    }

    /// `refs/tags/*:refs/tags/*`
    pub fn all_tags() -> Self {
        Self {
            src: Some("refs/tags/*".to_string()),
            dst: "refs/tags/*".to_string(),
            force: false,
        }
    }

    /// Parse the textual `[+][src]:dst` form. A lone `src` pushes to the
    /// same name.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRefspec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (force, body) = match spec.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let (src, dst) = match body.split_once(':') {
            Some(("", dst)) => (None, dst),
            Some((src, dst)) => (Some(src), dst),
            None => (Some(body), body),
        };

        if dst.is_empty() {
            return Err(invalid("destination is empty"));
        }
        if dst.contains(':') {
            return Err(invalid("more than one ':'"));
        }
        if !dst.starts_with("refs/") {
            return Err(invalid("destination must be a full ref name"));
        }
        if src.is_none() && force {
            return Err(invalid("a delete cannot be forced"));
        }

        let dst_stars = dst.matches('*').count();
        let src_stars = src.map_or(0, |s| s.matches('*').count());
        if dst_stars > 1 || src_stars > 1 {
            return Err(invalid("at most one '*' per side"));
        }
        if src.is_some() && src_stars != dst_stars {
            return Err(invalid("wildcard must appear on both sides"));
        }
        if src.is_none() && dst_stars > 0 {
            return Err(invalid("a delete cannot use a wildcard"));
        }
        for name in src.into_iter().chain([dst]) {
            if !Reference::is_valid_name(&name.replace('*', "x")) {
                return Err(invalid("not a valid reference name"));
            }
        }

        Ok(Self {
            src: src.map(str::to_string),
            dst: dst.to_string(),
            force,
        })
    }

    /// Same refspec with `+`. Deletes are unaffected.
    pub fn forced(mut self) -> Self {
        self.force = self.src.is_some();
        self
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn is_force(&self) -> bool {
        self.force
    }

    pub fn is_delete(&self) -> bool {
        self.src.is_none()
    }

    pub fn is_wildcard(&self) -> bool {
        self.dst.contains('*')
    }

    /// Expand a wildcard refspec against the local refs it matches.
    ///
    /// Non-wildcard refspecs expand to themselves.
    pub fn expand(&self, repo: &Repository) -> Result<Vec<Refspec>> {
        let Some(src) = self.src.as_deref().filter(|_| self.is_wildcard()) else {
            return Ok(vec![self.clone()]);
        };
        let (src_prefix, src_suffix) = src.split_once('*').unwrap_or((src, ""));

        let mut expanded = Vec::new();
        for reference in repo.references_glob(src)? {
            let reference = reference?;
            let Some(name) = reference.name() else {
                continue;
            };
            let Some(middle) = name
                .strip_prefix(src_prefix)
                .and_then(|rest| rest.strip_suffix(src_suffix))
            else {
                continue;
            };
            expanded.push(Refspec {
                src: Some(name.to_string()),
                dst: self.dst.replacen('*', middle, 1),
                force: self.force,
            });
        }
        expanded.sort_by(|a, b| a.dst.cmp(&b.dst));
        Ok(expanded)
    }
}

impl fmt::Display for Refspec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.src {
            None => write!(f, ":{}", self.dst),
            Some(src) => {
                if self.force {
                    f.write_str("+")?;
                }
                write!(f, "{src}:{}", self.dst)
            }
        }
    }
}

impl std::str::FromStr for Refspec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// What happened to one remote ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUpdate {
    /// The remote ref moved, was created, or was deleted
    Updated,
    /// The remote already had exactly this value
    UpToDate,
    /// A delete targeted a ref the remote does not have
    AlreadyAbsent,
}

/// Per-ref outcome of a push, in refspec order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    updates: Vec<(String, RefUpdate)>,
}

impl PushReport {
    pub fn updates(&self) -> &[(String, RefUpdate)] {
        &self.updates
    }

    /// Outcome for the remote ref `dst`.
    pub fn get(&self, dst: &str) -> Option<RefUpdate> {
        self.updates
            .iter()
            .find(|(name, _)| name == dst)
            .map(|(_, update)| *update)
    }

    /// Whether the push changed nothing on the remote.
    pub fn is_noop(&self) -> bool {
        self.updates
            .iter()
            .all(|(_, update)| *update != RefUpdate::Updated)
    }
}

#[derive(Debug, Clone, Copy)]
struct Negotiated {
    old: Oid,
    new: Oid,
}

/// Push `refspecs` to `origin`.
///
/// An empty list pushes the current branch to its upstream, falling back to
/// the same-named remote branch and recording that as the upstream. With
/// `force` every non-delete refspec is pushed with `+`.
pub fn push(handle: &RepositoryHandle, refspecs: &[Refspec], force: bool) -> Result<PushReport> {
    let repo = handle.repo();

    let (requested, track) = if refspecs.is_empty() {
        let (spec, branch) = current_branch_refspec(handle)?;
        (vec![spec], Some(branch))
    } else {
        (refspecs.to_vec(), None)
    };

    let mut specs = Vec::new();
    for spec in &requested {
        let spec = if force { spec.clone().forced() } else { spec.clone() };
        specs.extend(spec.expand(repo)?);
    }
    if specs.is_empty() {
        tracing::debug!(requested = ?requested, "wildcard refspecs matched no local refs, nothing to push");
        return Ok(PushReport::default());
    }

    let spec_strings: Vec<String> = specs.iter().map(ToString::to_string).collect();
    tracing::debug!(refspecs = ?spec_strings, url = %handle.remote_url(), "pushing");

    let deadline = handle.deadline();
    let negotiated: RefCell<HashMap<String, Negotiated>> = RefCell::new(HashMap::new());
    let statuses: RefCell<HashMap<String, Option<String>>> = RefCell::new(HashMap::new());

    let result = {
        let mut callbacks = remote::callbacks(handle.auth(), &deadline);
        callbacks.push_negotiation(|updates| {
            if deadline.expired() {
                return Err(deadline.abort_error());
            }
            let mut negotiated = negotiated.borrow_mut();
            for update in updates {
                if let Some(dst) = update.dst_refname() {
                    negotiated.insert(
                        dst.to_string(),
                        Negotiated {
                            old: update.src(),
                            new: update.dst(),
                        },
                    );
                }
            }
            Ok(())
        });
        callbacks.push_update_reference(|refname, status| {
            statuses
                .borrow_mut()
                .insert(refname.to_string(), status.map(str::to_string));
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let mut remote = repo.find_remote(REMOTE_NAME)?;
        remote.push(&spec_strings, Some(&mut options))
    };

    if let Err(err) = result {
        return whole_push_failure(err, &specs, &deadline);
    }

    let negotiated = negotiated.into_inner();
    let statuses = statuses.into_inner();
    let mut report = PushReport::default();
    let mut rejected = Vec::new();

    for spec in &specs {
        match classify(spec, negotiated.get(&spec.dst), statuses.get(&spec.dst)) {
            Ok(update) => {
                if update == RefUpdate::AlreadyAbsent {
                    tracing::warn!(refname = %spec.dst, "delete target already absent on remote");
                }
                report.updates.push((spec.dst.clone(), update));
            }
            Err(reason) => rejected.push(format!("{}: {reason}", spec.dst)),
        }
    }

    if !rejected.is_empty() {
        return Err(Error::Push {
            message: rejected.join("; "),
        });
    }

    if let Some(branch) = track {
        set_upstream(repo, &branch);
    }

    tracing::info!(updates = ?report.updates, "push complete");
    Ok(report)
}

/// Outcome of a push that failed as a whole.
///
/// Only an "up to date" reply counts as success. Absence is judged per ref
/// from the server's replies, never from a failure of the whole push.
fn whole_push_failure(
    err: git2::Error,
    specs: &[Refspec],
    deadline: &Deadline,
) -> Result<PushReport> {
    if is_up_to_date_message(err.message()) {
        tracing::info!("remote already up to date");
        return Ok(PushReport {
            updates: specs
                .iter()
                .map(|s| (s.dst.clone(), RefUpdate::UpToDate))
                .collect(),
        });
    }
    Err(remote::transfer_error(err, deadline, "push", |e| {
        Error::Push {
            message: e.message().to_string(),
        }
    }))
}

fn classify(
    spec: &Refspec,
    negotiated: Option<&Negotiated>,
    status: Option<&Option<String>>,
) -> std::result::Result<RefUpdate, String> {
    if let Some(Some(reason)) = status {
        if spec.is_delete() && absence::is_absent_message(reason) {
            return Ok(RefUpdate::AlreadyAbsent);
        }
        if is_up_to_date_message(reason) {
            return Ok(RefUpdate::UpToDate);
        }
        return Err(reason.clone());
    }

    match negotiated {
        Some(n) if spec.is_delete() && n.old.is_zero() => Ok(RefUpdate::AlreadyAbsent),
        Some(n) if n.old == n.new => Ok(RefUpdate::UpToDate),
        Some(_) => Ok(RefUpdate::Updated),
        // Not negotiated at all: nothing to send for this ref.
        None if spec.is_delete() => Ok(RefUpdate::AlreadyAbsent),
        None if status.is_some() => Ok(RefUpdate::Updated),
        None => Ok(RefUpdate::UpToDate),
    }
}

fn is_up_to_date_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("up to date") || lower.contains("up-to-date")
}

fn current_branch_refspec(handle: &RepositoryHandle) -> Result<(Refspec, String)> {
    let branch = handle.current_branch()?.ok_or_else(|| Error::Push {
        message: "HEAD is detached; nothing to push".to_string(),
    })?;
    let local = format!("refs/heads/{branch}");

    let merge = absence::optional(handle.repo().branch_upstream_merge(&local))
        .map_err(|source| Error::ReferenceResolution {
            name: format!("branch.{branch}.merge"),
            source,
        })?
        .and_then(|buf| buf.as_str().map(str::to_string));

    let spec = Refspec {
        src: Some(local.clone()),
        dst: merge.unwrap_or(local),
        force: false,
    };
    Ok((spec, branch))
}

fn set_upstream(repo: &Repository, branch: &str) {
    let result = repo
        .find_branch(branch, BranchType::Local)
        .and_then(|mut b| b.set_upstream(Some(&format!("{REMOTE_NAME}/{branch}"))));
    if let Err(e) = result {
        tracing::warn!(branch = %branch, error = %e, "could not record upstream after push");
    }
}
