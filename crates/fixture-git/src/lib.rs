//! Git fixture synchronization engine
//!
//! Reconciles a working copy's branch against local and remote refs,
//! commits in-memory file sets only when they change HEAD, pushes, and
//! recreates tags on a remote.

pub mod absence;
pub mod auth;
pub mod deadline;
pub mod error;
pub mod known_hosts;
pub mod push;
pub mod reconcile;
pub mod remote;
pub mod repository;
pub mod stage;
pub mod tag;

pub use auth::{Authenticator, BootstrapArgs, Credentials, TransportKind};
pub use error::{CommitStep, Error, Result, TagLocus};
pub use push::{PushReport, RefUpdate, Refspec, push};
pub use reconcile::{Action, BranchState, ReconcileOutcome, decide, reconcile};
pub use remote::RemoteRefs;
pub use repository::{DEFAULT_TIMEOUT, RepositoryHandle};
pub use stage::{CommitOutcome, FileSet, Identity, stage_and_commit};
pub use tag::{TAG_MESSAGE, TagRef, recreate_tag};
