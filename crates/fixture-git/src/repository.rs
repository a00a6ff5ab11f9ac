//! Working copy bound to one fixture remote.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use git2::build::RepoBuilder;
use git2::{AutotagOption, FetchOptions, FetchPrune, Oid, Repository};

use crate::absence;
use crate::auth::Authenticator;
use crate::deadline::Deadline;
use crate::remote::{self, REMOTE_NAME, RemoteRefs};
use crate::{Error, Result};

/// Default limit for each network operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const BRANCH_FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";
const TAG_FETCH_REFSPEC: &str = "+refs/tags/*:refs/tags/*";

/// A working copy exclusively owned by one fixture flow.
///
/// Operations on a handle must be serialized by the caller. The handle
/// never deletes its directory; removal belongs to whoever created it.
pub struct RepositoryHandle {
    repo: Repository,
    path: PathBuf,
    remote_url: String,
    auth: Arc<dyn Authenticator>,
    timeout: Duration,
}

impl std::fmt::Debug for RepositoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryHandle")
            .field("path", &self.path)
            .field("remote_url", &self.remote_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RepositoryHandle {
    /// Open the working copy at `local_path`, or clone `remote_url` into it.
    ///
    /// Clones fetch every branch. The checkout lands on `branch_hint` when
    /// the remote has it and on the remote's default branch otherwise. A
    /// remote with no branches yields an empty repository whose unborn HEAD
    /// points at `branch_hint`.
    pub fn open_or_clone(
        local_path: impl AsRef<Path>,
        remote_url: &str,
        auth: Arc<dyn Authenticator>,
        branch_hint: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let path = local_path.as_ref().to_path_buf();

        if path.join(".git").exists() {
            return Self::open(path, remote_url, auth, timeout);
        }

        let deadline = Deadline::after(timeout);
        let clone_error = |err: git2::Error| {
            remote::transfer_error(err, &deadline, &format!("clone {remote_url}"), |e| {
                Error::Clone {
                    url: remote_url.to_string(),
                    message: e.message().to_string(),
                }
            })
        };

        let advertised =
            remote::list_url_refs(remote_url, auth.as_ref(), &deadline).map_err(clone_error)?;

        let repo = if advertised.is_empty() {
            tracing::info!(url = %remote_url, "remote has no branches, initializing empty working copy");
            init_empty(&path, remote_url, branch_hint)?
        } else {
            let branch = checkout_branch(&advertised, branch_hint)?;
            tracing::info!(
                url = %remote_url,
                path = %path.display(),
                branch = %branch,
                "cloning fixture repository"
            );

            let mut fetch_options = FetchOptions::new();
            fetch_options.remote_callbacks(remote::callbacks(auth.as_ref(), &deadline));
            fetch_options.download_tags(AutotagOption::All);

            RepoBuilder::new()
                .fetch_options(fetch_options)
                .branch(&branch)
                .clone(remote_url, &path)
                .map_err(clone_error)?
        };

        Ok(Self {
            repo,
            path,
            remote_url: remote_url.to_string(),
            auth,
            timeout,
        })
    }

    fn open(
        path: PathBuf,
        remote_url: &str,
        auth: Arc<dyn Authenticator>,
        timeout: Duration,
    ) -> Result<Self> {
        let repo = Repository::open(&path)?;
        {
            let origin = repo.find_remote(REMOTE_NAME).map_err(|e| Error::Clone {
                url: remote_url.to_string(),
                message: format!("existing working copy has no {REMOTE_NAME} remote: {}", e.message()),
            })?;
            if origin.url() != Some(remote_url) {
                return Err(Error::Clone {
                    url: remote_url.to_string(),
                    message: format!(
                        "{} already tracks {}",
                        path.display(),
                        origin.url().unwrap_or("<non-utf8 url>")
                    ),
                });
            }
        }

        tracing::debug!(path = %path.display(), "reusing existing working copy");
        let handle = Self {
            repo,
            path,
            remote_url: remote_url.to_string(),
            auth,
            timeout,
        };
        handle.fetch()?;
        Ok(handle)
    }

    /// Working-copy root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn auth(&self) -> &dyn Authenticator {
        self.auth.as_ref()
    }

    /// A fresh deadline for one network operation.
    pub(crate) fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    /// Commit HEAD points at, or `None` while HEAD is unborn.
    pub fn head_commit(&self) -> Result<Option<Oid>> {
        let head = absence::optional(self.repo.head()).map_err(|source| {
            Error::ReferenceResolution {
                name: "HEAD".into(),
                source,
            }
        })?;
        head.map(|h| h.peel_to_commit().map(|c| c.id()))
            .transpose()
            .map_err(Error::from)
    }

    /// Branch HEAD is attached to, even when that branch is still unborn.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = self.repo.find_reference("HEAD")?;
        Ok(head
            .symbolic_target()
            .and_then(|target| target.strip_prefix("refs/heads/"))
            .map(str::to_string))
    }

    /// Refresh remote-tracking branches and tags from the remote.
    ///
    /// Remote-tracking branches that vanished upstream are pruned so branch
    /// reconciliation never sees a stale remote. Local tags that differ from
    /// the remote's are overwritten with the remote's target.
    pub fn fetch(&self) -> Result<()> {
        let deadline = self.deadline();
        let mut remote = self.repo.find_remote(REMOTE_NAME)?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote::callbacks(self.auth(), &deadline));
        fetch_options.prune(FetchPrune::On);
        fetch_options.download_tags(AutotagOption::All);

        remote
            .fetch(&[BRANCH_FETCH_REFSPEC, TAG_FETCH_REFSPEC], Some(&mut fetch_options), None)
            .map_err(|err| {
                remote::transfer_error(err, &deadline, "fetch", |e| Error::Fetch {
                    url: self.remote_url.clone(),
                    message: e.message().to_string(),
                })
            })?;

        tracing::debug!(url = %self.remote_url, "fetched remote state");
        Ok(())
    }

    /// List the refs the remote currently advertises.
    pub fn list_remote_refs(&self) -> Result<RemoteRefs> {
        let deadline = self.deadline();
        let mut remote = self.repo.find_remote(REMOTE_NAME)?;
        remote::list_refs(&mut remote, self.auth(), &deadline).map_err(|err| {
            remote::transfer_error(err, &deadline, "ls-remote", |e| Error::Fetch {
                url: self.remote_url.clone(),
                message: e.message().to_string(),
            })
        })
    }
}

fn checkout_branch(advertised: &RemoteRefs, hint: &str) -> Result<String> {
    if advertised.contains(&format!("refs/heads/{hint}")) {
        return Ok(hint.to_string());
    }
    let default = advertised.default_branch().ok_or_else(|| Error::RefNotFound {
        name: hint.to_string(),
    })?;
    tracing::debug!(hint = %hint, default = %default, "branch hint absent on remote, using default branch");
    Ok(default.to_string())
}

fn init_empty(path: &Path, remote_url: &str, branch_hint: &str) -> Result<Repository> {
    let repo = Repository::init(path)?;
    repo.remote(REMOTE_NAME, remote_url)?;
    repo.set_head(&format!("refs/heads/{branch_hint}"))?;
    Ok(repo)
}
