//! Harness-facing layer for git fixtures
//!
//! Loads fixture configuration, runs the commit-and-push and tag flows on
//! top of `fixture-git`, polls readiness of reconciled resources and builds
//! the bootstrap command line for the chosen transport.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod flow;
pub mod naming;
pub mod readiness;

pub use bootstrap::BootstrapInvocation;
pub use config::FixtureConfig;
pub use error::{Error, FlowStep, Result};
pub use flow::{COMMIT_MESSAGE, Fixture, FlowOutcome, bootstrap_seed, commit_and_push_all, publish_tag};
pub use readiness::{
    Condition, ConditionStatus, FileStatusSource, PollPolicy, StatusObject, StatusSource, is_ready,
    wait_until_ready,
};
