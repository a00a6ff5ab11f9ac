//! Shared test utilities for the fixture-sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`remote`] — [`BareRemote`](remote::BareRemote), a bare repository
//!   standing in for a hosted fixture remote
//! - [`workdir`] — scratch directories for working copies

pub mod remote;
pub mod workdir;

pub use remote::BareRemote;
pub use workdir::Workdir;
