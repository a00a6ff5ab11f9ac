//! Scratch directories for fixture working copies.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary parent directory; working copies go in named children so a
/// test can clone into a path that does not exist yet.
pub struct Workdir {
    dir: TempDir,
}

impl Default for Workdir {
    fn default() -> Self {
        Self::new()
    }
}

impl Workdir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::Builder::new()
                .suffix("-repository")
                .tempdir()
                .unwrap_or_else(|e| panic!("Workdir::new: {e}")),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a working copy named `name`; not created.
    pub fn checkout(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
