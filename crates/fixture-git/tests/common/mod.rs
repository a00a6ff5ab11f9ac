//! Helpers shared by the fixture-git integration tests

#![allow(dead_code)]

use std::sync::Arc;

use fixture_git::auth::{self, Authenticator, Credentials, TransportKind};
use fixture_git::{DEFAULT_TIMEOUT, FileSet, Identity, RepositoryHandle};
use fixture_test_utils::{BareRemote, Workdir};

/// Token authenticator; local remotes never ask for it.
pub fn token_auth() -> Arc<dyn Authenticator> {
    auth::resolve(
        TransportKind::Https,
        Credentials::Token {
            username: "git".into(),
            password: "unused-token".into(),
        },
    )
    .unwrap()
}

pub fn open(remote: &BareRemote, workdir: &Workdir, name: &str, hint: &str) -> RepositoryHandle {
    RepositoryHandle::open_or_clone(
        workdir.checkout(name),
        &remote.url(),
        token_auth(),
        hint,
        DEFAULT_TIMEOUT,
    )
    .unwrap()
}

pub fn author() -> Identity {
    Identity::default()
}

pub fn files(entries: &[(&str, &str)]) -> FileSet {
    let mut set = FileSet::new();
    for (path, content) in entries {
        set.insert(path, content.as_bytes()).unwrap();
    }
    set
}
