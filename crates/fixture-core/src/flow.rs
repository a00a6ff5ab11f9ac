//! Fixture flows: commit-and-push and tag publishing
//!
//! Each flow is a fixed sequence of engine calls. A failure names the step
//! it happened in and nothing is retried; repeating a flow after fixing the
//! cause is safe because every step is idempotent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fixture_git::push::PushReport;
use fixture_git::tag::resolve_branch_tip;
use fixture_git::{
    Action, Authenticator, CommitOutcome, FileSet, Identity, RepositoryHandle, TagRef, push,
    reconcile, recreate_tag, stage_and_commit,
};
use git2::Oid;
use tempfile::TempDir;

use crate::bootstrap::BootstrapInvocation;
use crate::config::{BootstrapConfig, FixtureConfig};
use crate::error::StepContext;
use crate::naming::workdir_name;
use crate::{Error, FlowStep, Result};

/// Message of commits made by [`Fixture::sync`].
pub const COMMIT_MESSAGE: &str = "Update fixture files";

const DEFAULT_KUSTOMIZATION: &str = "resources:\n- gotk-components.yaml\n- gotk-sync.yaml";

/// What a commit-and-push run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    pub branch: String,
    pub action: Action,
    /// New commit, or `None` when the branch already held the files
    pub commit: Option<Oid>,
    /// Present whenever a commit was pushed
    pub push: Option<PushReport>,
}

impl FlowOutcome {
    pub fn committed(&self) -> bool {
        self.commit.is_some()
    }
}

/// Check out `branch`, commit `files` on it and push.
///
/// Nothing is pushed when the files are already what the branch holds.
pub fn commit_and_push_all(
    handle: &RepositoryHandle,
    branch: &str,
    files: FileSet,
    author: &Identity,
    message: &str,
) -> Result<FlowOutcome> {
    let reconciled = reconcile(handle, branch).step(FlowStep::Reconcile)?;
    tracing::debug!(branch = %branch, action = ?reconciled.action, "branch reconciled");

    let commit = match stage_and_commit(handle, branch, files, author, message)
        .step(FlowStep::Commit)?
    {
        CommitOutcome::Committed { id } => id,
        CommitOutcome::NothingToCommit => {
            tracing::info!(branch = %branch, "fixture files unchanged, skipping push");
            return Ok(FlowOutcome {
                branch: branch.to_string(),
                action: reconciled.action,
                commit: None,
                push: None,
            });
        }
    };

    let report = push(handle, &[], false).step(FlowStep::Push)?;
    tracing::info!(branch = %branch, commit = %commit, "fixture files pushed");

    Ok(FlowOutcome {
        branch: branch.to_string(),
        action: reconciled.action,
        commit: Some(commit),
        push: Some(report),
    })
}

/// Recreate `tag` at the tip of `branch` and publish it.
pub fn publish_tag(
    handle: &RepositoryHandle,
    branch: &str,
    tag: &str,
    tagger: &Identity,
) -> Result<TagRef> {
    let target = resolve_branch_tip(handle, branch).step(FlowStep::ResolveTip)?;
    let tag = recreate_tag(handle, tag, target, tagger).step(FlowStep::Tag)?;
    tracing::info!(tag = %tag.name, target = %tag.target, "tag published");
    Ok(tag)
}

/// Files a bootstrap expects under `<path>/flux-system` before it runs.
pub fn bootstrap_seed(config: &BootstrapConfig) -> Result<FileSet> {
    let dir = format!("{}/flux-system", config.path.trim_end_matches('/'));
    let kustomization = config
        .kustomization_yaml
        .as_deref()
        .unwrap_or(DEFAULT_KUSTOMIZATION);
    Ok(FileSet::new()
        .with(format!("{dir}/kustomization.yaml"), kustomization)?
        .with(format!("{dir}/gotk-components.yaml"), "")?
        .with(format!("{dir}/gotk-sync.yaml"), "")?)
}

enum Root {
    /// Removed on drop
    Temp(TempDir),
    Kept(PathBuf),
}

impl Root {
    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Kept(path) => path,
        }
    }
}

/// One fixture repository: configuration, resolved credentials and a
/// directory holding a working copy per branch.
pub struct Fixture {
    config: FixtureConfig,
    url: String,
    auth: Arc<dyn Authenticator>,
    root: Root,
}

impl Fixture {
    /// Fixture whose working copies live in a temporary directory removed
    /// on drop.
    pub fn new(config: FixtureConfig) -> Result<Self> {
        let root = tempfile::Builder::new()
            .suffix("-repository")
            .tempdir()
            .map_err(|e| Error::io("creating fixture directory", e))?;
        Self::build(config, Root::Temp(root))
    }

    /// Fixture whose working copies live under `root` and survive it, so a
    /// later run reuses them.
    pub fn with_root(config: FixtureConfig, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::io(format!("creating {}", root.display()), e))?;
        Self::build(config, Root::Kept(root))
    }

    fn build(config: FixtureConfig, root: Root) -> Result<Self> {
        let url = config.transport_url()?.to_string();
        let auth = config.resolve_auth()?;
        tracing::debug!(url = %url, root = %root.path().display(), "fixture created");
        Ok(Self {
            config,
            url,
            auth,
            root,
        })
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth(&self) -> &Arc<dyn Authenticator> {
        &self.auth
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Working copy for `branch`, cloned on first use.
    pub fn checkout(&self, branch: &str) -> Result<RepositoryHandle> {
        let path = self.root.path().join(workdir_name(branch));
        RepositoryHandle::open_or_clone(
            path,
            &self.url,
            Arc::clone(&self.auth),
            branch,
            self.config.timeout(),
        )
        .step(FlowStep::Open)
    }

    /// Commit `files` on `branch` as the configured identity and push.
    pub fn sync(&self, branch: &str, files: FileSet) -> Result<FlowOutcome> {
        let handle = self.checkout(branch)?;
        commit_and_push_all(&handle, branch, files, &self.config.identity, COMMIT_MESSAGE)
    }

    /// Recreate `tag` at the tip of `branch`.
    pub fn publish_tag(&self, branch: &str, tag: &str) -> Result<TagRef> {
        let handle = self.checkout(branch)?;
        publish_tag(&handle, branch, tag, &self.config.identity)
    }

    /// Bootstrap command for this fixture's remote and credentials.
    pub fn bootstrap_invocation(&self) -> Result<BootstrapInvocation> {
        let key_dir = self.root.path().join(".keys");
        std::fs::create_dir_all(&key_dir)
            .map_err(|e| Error::io(format!("creating {}", key_dir.display()), e))?;
        BootstrapInvocation::from_config(&self.config.bootstrap, &self.url, self.auth.as_ref(), &key_dir)
    }

    /// Seed the bootstrap path on `branch`, then run the bootstrap command.
    pub fn bootstrap(&self, branch: &str) -> Result<String> {
        self.sync(branch, bootstrap_seed(&self.config.bootstrap)?)?;
        let timeout = std::time::Duration::from_secs(self.config.bootstrap.timeout_secs);
        self.bootstrap_invocation()?.run(timeout)
    }
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("url", &self.url)
            .field("root", &self.root.path())
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn seed_uses_default_kustomization() {
        let files = bootstrap_seed(&BootstrapConfig::default()).unwrap();
        let paths: Vec<_> = files.paths().map(|p| p.as_str().to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "clusters/e2e/flux-system/gotk-components.yaml",
                "clusters/e2e/flux-system/gotk-sync.yaml",
                "clusters/e2e/flux-system/kustomization.yaml",
            ]
        );
    }

    #[test]
    fn seed_follows_configured_path() {
        let config = BootstrapConfig {
            path: "clusters/staging/".into(),
            kustomization_yaml: Some("resources: []".into()),
            ..BootstrapConfig::default()
        };
        let files = bootstrap_seed(&config).unwrap();
        assert!(
            files
                .paths()
                .all(|p| p.as_str().starts_with("clusters/staging/flux-system/"))
        );
    }

    #[test]
    fn fixture_requires_url_and_credentials() {
        let err = Fixture::new(FixtureConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "got: {err}");
    }
}
