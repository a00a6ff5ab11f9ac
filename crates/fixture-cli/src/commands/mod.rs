//! Command implementations for fixture-cli

pub mod bootstrap;
pub mod sync;
pub mod tag;
pub mod wait;

use std::path::Path;

use fixture_core::{Fixture, FixtureConfig};

use crate::error::Result;

pub use bootstrap::{run_bootstrap, run_bootstrap_args};
pub use sync::run_sync;
pub use tag::run_tag;
pub use wait::run_wait_ready;

/// Configuration from `path` when given, defaults otherwise; the
/// environment overrides either.
pub fn load_config(path: Option<&Path>) -> Result<FixtureConfig> {
    let config = match path {
        Some(path) => FixtureConfig::load(path)?,
        None => FixtureConfig::from_env()?,
    };
    Ok(config)
}

/// Fixture rooted at `workdir`, or at a temporary directory.
pub(crate) fn open_fixture(config: FixtureConfig, workdir: Option<&Path>) -> Result<Fixture> {
    let fixture = match workdir {
        Some(dir) => Fixture::with_root(config, dir)?,
        None => Fixture::new(config)?,
    };
    Ok(fixture)
}
