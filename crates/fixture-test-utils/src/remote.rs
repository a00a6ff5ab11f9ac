//! [`BareRemote`]: a local bare repository reached by file path.
//!
//! History is written straight into the object store, so seeding a remote
//! never needs a working copy or the `git` CLI.

use std::path::Path;

use git2::{Index, IndexEntry, IndexTime, Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

/// A bare repository in a temporary directory, HEAD on `main`.
///
/// Helpers panic on failure; this type is for tests only.
pub struct BareRemote {
    dir: TempDir,
    repo: Repository,
}

impl Default for BareRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl BareRemote {
    /// Create an empty bare remote. It advertises no refs until something
    /// is committed.
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("remote-")
            .tempdir()
            .unwrap_or_else(|e| panic!("BareRemote::new: failed to create temp dir: {e}"));
        let mut opts = RepositoryInitOptions::new();
        opts.bare(true).initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts)
            .unwrap_or_else(|e| panic!("BareRemote::new: failed to init bare repo: {e}"));
        Self { dir, repo }
    }

    /// Create a remote with one commit on `main`.
    pub fn with_main(files: &[(&str, &str)]) -> Self {
        let remote = Self::new();
        remote.commit("main", files, "initial commit");
        remote
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// URL a working copy clones from.
    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Commit `files` on top of `branch`, creating the branch if needed.
    ///
    /// Files not named keep their content from the previous tip.
    pub fn commit(&self, branch: &str, files: &[(&str, &str)], message: &str) -> Oid {
        let refname = format!("refs/heads/{branch}");
        let parent = self
            .repo
            .find_reference(&refname)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());

        let mut index = Index::new().unwrap_or_else(|e| panic!("commit: index: {e}"));
        if let Some(parent) = &parent {
            let tree = parent.tree().unwrap_or_else(|e| panic!("commit: tree: {e}"));
            index
                .read_tree(&tree)
                .unwrap_or_else(|e| panic!("commit: read_tree: {e}"));
        }
        for (path, content) in files {
            let blob = self
                .repo
                .blob(content.as_bytes())
                .unwrap_or_else(|e| panic!("commit: blob {path}: {e}"));
            index
                .add(&entry(path, blob, content.len()))
                .unwrap_or_else(|e| panic!("commit: add {path}: {e}"));
        }
        let tree_id = index
            .write_tree_to(&self.repo)
            .unwrap_or_else(|e| panic!("commit: write_tree: {e}"));
        let tree = self.repo.find_tree(tree_id).unwrap();

        let sig = signature();
        let parents: Vec<_> = parent.iter().collect();
        self.repo
            .commit(Some(&refname), &sig, &sig, message, &tree, &parents)
            .unwrap_or_else(|e| panic!("commit: {branch}: {e}"))
    }

    /// Create an annotated tag `name` at `target`.
    pub fn tag(&self, name: &str, target: Oid) -> Oid {
        let object = self.repo.find_object(target, None).unwrap();
        self.repo
            .tag(name, &object, &signature(), "seed tag", false)
            .unwrap_or_else(|e| panic!("tag {name}: {e}"))
    }

    /// Point the remote HEAD at `branch`.
    pub fn set_default_branch(&self, branch: &str) {
        self.repo
            .set_head(&format!("refs/heads/{branch}"))
            .unwrap_or_else(|e| panic!("set_default_branch {branch}: {e}"));
    }

    /// Tip of `branch`, if it exists.
    pub fn tip(&self, branch: &str) -> Option<Oid> {
        self.repo
            .find_reference(&format!("refs/heads/{branch}"))
            .ok()
            .and_then(|r| r.target())
    }

    /// Commit tag `name` resolves to, if the tag exists.
    pub fn tag_target(&self, name: &str) -> Option<Oid> {
        self.repo
            .find_reference(&format!("refs/tags/{name}"))
            .ok()
            .and_then(|r| r.peel_to_commit().ok())
            .map(|c| c.id())
    }

    /// Whether tag `name` is an annotated tag object.
    pub fn tag_is_annotated(&self, name: &str) -> bool {
        self.repo
            .find_reference(&format!("refs/tags/{name}"))
            .ok()
            .and_then(|r| r.peel_to_tag().ok())
            .is_some()
    }

    pub fn tag_names(&self) -> Vec<String> {
        let names = self.repo.tag_names(None).unwrap();
        let mut tags: Vec<String> = names.iter().flatten().map(str::to_string).collect();
        tags.sort();
        tags
    }

    pub fn branch_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .repo
            .branches(Some(git2::BranchType::Local))
            .unwrap()
            .filter_map(|b| b.ok())
            .filter_map(|(b, _)| b.name().ok().flatten().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    /// Content of `path` at the tip of `branch`.
    pub fn read_file(&self, branch: &str, path: &str) -> Option<String> {
        let commit = self
            .repo
            .find_reference(&format!("refs/heads/{branch}"))
            .ok()?
            .peel_to_commit()
            .ok()?;
        let entry = commit.tree().ok()?.get_path(Path::new(path)).ok()?;
        let blob = self.repo.find_blob(entry.id()).ok()?;
        Some(String::from_utf8_lossy(blob.content()).into_owned())
    }

    /// Number of commits reachable from `branch`.
    pub fn commit_count(&self, branch: &str) -> usize {
        let Some(tip) = self.tip(branch) else {
            return 0;
        };
        let mut walk = self.repo.revwalk().unwrap();
        walk.push(tip).unwrap();
        walk.count()
    }
}

fn entry(path: &str, id: Oid, len: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: len as u32,
        id,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

fn signature() -> Signature<'static> {
    Signature::now("seed", "seed@example.com").unwrap()
}
