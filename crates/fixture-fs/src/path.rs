//! Repository-relative paths for fixture file sets

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A path relative to a working-copy root, normalized to forward slashes.
///
/// Construction rejects anything that could escape the working copy or
/// touch the object store: absolute paths, drive prefixes, `..` segments
/// and paths inside `.git`. Empty and `.` segments are dropped, so
/// `a/./b//c` and `a\b\c` both normalize to `a/b/c`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativePath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl RelativePath {
    /// Validate and normalize a repository-relative path.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let unified = raw.replace('\\', "/");

        if unified.starts_with('/') {
            return Err(Error::invalid_path(raw, "absolute paths are not allowed"));
        }
        if has_drive_prefix(&unified) {
            return Err(Error::invalid_path(raw, "drive prefixes are not allowed"));
        }

        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(Error::invalid_path(raw, "parent segments are not allowed"));
                }
                s => segments.push(s),
            }
        }

        let Some(first) = segments.first() else {
            return Err(Error::invalid_path(raw, "path is empty"));
        };
        if first.eq_ignore_ascii_case(".git") {
            return Err(Error::invalid_path(raw, "paths inside .git are not allowed"));
        }

        Ok(Self {
            inner: segments.join("/"),
        })
    }

    /// Get the normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Path as git expects it in the index.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.inner)
    }

    /// Resolve this path under `root` as a platform-native path.
    pub fn to_native_under(&self, root: &Path) -> PathBuf {
        self.inner
            .split('/')
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
    }

    /// Parent directory, if the path has more than one segment.
    pub fn parent(&self) -> Option<Self> {
        self.inner.rfind('/').map(|idx| Self {
            inner: self.inner[..idx].to_string(),
        })
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.inner.rsplit('/').next().unwrap_or(&self.inner)
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}
