//! Filesystem helpers for git fixture provisioning
//!
//! Provides validated repository-relative paths, atomic file writes and
//! format-agnostic configuration loading.

pub mod config;
pub mod error;
pub mod io;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use path::RelativePath;
