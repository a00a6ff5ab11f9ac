//! Commit stager: write a file set into the working tree and commit it
//! only when the result differs from HEAD.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};

use fixture_fs::RelativePath;
use git2::{Oid, Signature};
use serde::{Deserialize, Serialize};

use crate::error::CommitStep;
use crate::repository::RepositoryHandle;
use crate::{Error, Result};

/// Files to place in the working tree, keyed by repository-relative path.
///
/// Contents are streamed once, so a set is consumed by the commit it feeds.
#[derive(Default)]
pub struct FileSet {
    entries: BTreeMap<RelativePath, Box<dyn Read + Send>>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add in-memory content at `path`, replacing any previous entry.
    pub fn insert(&mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Result<()> {
        self.insert_reader(path, Cursor::new(content.into()))
    }

    /// Add content read lazily from `reader` at commit time.
    pub fn insert_reader(
        &mut self,
        path: impl AsRef<str>,
        reader: impl Read + Send + 'static,
    ) -> Result<()> {
        let path = RelativePath::new(path).map_err(|e| Error::commit(CommitStep::Write, e))?;
        self.entries.insert(path, Box::new(reader));
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Result<Self> {
        self.insert(path, content)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.entries.keys()
    }
}

impl fmt::Debug for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Author and tagger identity. The timestamp is taken when it is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "git".to_string(),
            email: "test@example.com".to_string(),
        }
    }
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Signature stamped with the current time.
    pub fn signature(&self) -> Result<Signature<'static>> {
        Ok(Signature::now(&self.name, &self.email)?)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// What a commit attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { id: Oid },
    /// The working tree already matched the file set
    NothingToCommit,
}

impl CommitOutcome {
    pub fn commit_id(&self) -> Option<Oid> {
        match self {
            Self::Committed { id } => Some(*id),
            Self::NothingToCommit => None,
        }
    }
}

/// Write `files` into the working tree, stage them and commit on `branch`.
///
/// `branch` must already be checked out; reconcile it first. Running this
/// twice with the same files yields one commit and then
/// [`CommitOutcome::NothingToCommit`].
pub fn stage_and_commit(
    handle: &RepositoryHandle,
    branch: &str,
    files: FileSet,
    author: &Identity,
    message: &str,
) -> Result<CommitOutcome> {
    let repo = handle.repo();

    let current = handle
        .current_branch()
        .map_err(|e| Error::commit(CommitStep::Branch, e))?;
    if current.as_deref() != Some(branch) {
        return Err(Error::commit(
            CommitStep::Branch,
            format!(
                "expected '{branch}' to be checked out, found {}",
                current.as_deref().unwrap_or("a detached HEAD")
            ),
        ));
    }

    let paths: Vec<RelativePath> = files.entries.keys().cloned().collect();
    for (path, mut reader) in files.entries {
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .map_err(|e| Error::commit(CommitStep::Write, format!("{path}: {e}")))?;
        fixture_fs::io::write_atomic(&path.to_native_under(handle.path()), &content)
            .map_err(|e| Error::commit(CommitStep::Write, e))?;
    }

    let stage_error = |e: git2::Error| Error::commit(CommitStep::Stage, e.message());
    let mut index = repo.index().map_err(stage_error)?;
    for path in &paths {
        index.add_path(path.as_path()).map_err(stage_error)?;
    }
    index.write().map_err(stage_error)?;

    let commit_error = |e: git2::Error| Error::commit(CommitStep::Commit, e.message());
    let tree_id = index.write_tree().map_err(commit_error)?;
    let tree = repo.find_tree(tree_id).map_err(commit_error)?;

    let parent = handle
        .head_commit()
        .map_err(|e| Error::commit(CommitStep::Commit, e))?
        .map(|id| repo.find_commit(id))
        .transpose()
        .map_err(commit_error)?;

    let unchanged = match &parent {
        Some(parent) => parent.tree_id() == tree_id,
        None => tree.is_empty(),
    };
    if unchanged {
        tracing::info!(branch = %branch, files = paths.len(), "working tree matches HEAD, nothing to commit");
        return Ok(CommitOutcome::NothingToCommit);
    }

    let signature = author
        .signature()
        .map_err(|e| Error::commit(CommitStep::Commit, e))?;
    let parents: Vec<_> = parent.iter().collect();
    let id = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .map_err(commit_error)?;

    tracing::info!(branch = %branch, commit = %id, files = paths.len(), "committed file set");
    Ok(CommitOutcome::Committed { id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_set_validates_and_orders_paths() {
        let files = FileSet::new()
            .with("b/two.yaml", "2")
            .unwrap()
            .with("a.yaml", "1")
            .unwrap();
        let paths: Vec<_> = files.paths().map(|p| p.as_str().to_string()).collect();
        assert_eq!(paths, vec!["a.yaml", "b/two.yaml"]);
    }

    #[test]
    fn file_set_rejects_escaping_paths() {
        let mut files = FileSet::new();
        for bad in ["", "/etc/passwd", "../outside", ".git/config"] {
            let err = files.insert(bad, "x").unwrap_err();
            assert!(
                matches!(err, Error::Commit { step: CommitStep::Write, .. }),
                "{bad:?}: {err:?}"
            );
        }
        assert!(files.is_empty());
    }

    #[test]
    fn later_insert_replaces_earlier() {
        let mut files = FileSet::new();
        files.insert("same.txt", "old").unwrap();
        files.insert("./same.txt", "new").unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn default_identity() {
        assert_eq!(Identity::default().to_string(), "git <test@example.com>");
    }
}
