//! Tests for opening and cloning fixture working copies

mod common;

use common::{open, token_auth};
use fixture_git::{DEFAULT_TIMEOUT, Error, RepositoryHandle};
use fixture_test_utils::{BareRemote, Workdir};
use pretty_assertions::assert_eq;

#[test]
fn test_clone_checks_out_hint_when_remote_has_it() {
    let remote = BareRemote::with_main(&[("README.md", "main")]);
    let feature = remote.commit("feature", &[("f.txt", "feature")], "feature work");
    let workdir = Workdir::new();

    let handle = open(&remote, &workdir, "wc", "feature");

    assert_eq!(handle.current_branch().unwrap().as_deref(), Some("feature"));
    assert_eq!(handle.head_commit().unwrap(), Some(feature));
    assert!(handle.path().join("f.txt").exists());
}

#[test]
fn test_clone_fetches_all_branches() {
    let remote = BareRemote::with_main(&[("README.md", "main")]);
    let other = remote.commit("other", &[("o.txt", "o")], "other");
    let workdir = Workdir::new();

    let handle = open(&remote, &workdir, "wc", "main");

    let tracking = handle
        .repo()
        .find_reference("refs/remotes/origin/other")
        .unwrap();
    assert_eq!(tracking.target(), Some(other));
}

#[test]
fn test_clone_falls_back_to_default_branch() {
    let remote = BareRemote::with_main(&[("README.md", "main")]);
    let trunk = remote.commit("trunk", &[("t.txt", "t")], "trunk");
    remote.set_default_branch("trunk");
    let workdir = Workdir::new();

    let handle = open(&remote, &workdir, "wc", "missing-branch");

    assert_eq!(handle.current_branch().unwrap().as_deref(), Some("trunk"));
    assert_eq!(handle.head_commit().unwrap(), Some(trunk));
}

#[test]
fn test_empty_remote_yields_unborn_branch() {
    let remote = BareRemote::new();
    let workdir = Workdir::new();

    let handle = open(&remote, &workdir, "wc", "fixture");

    assert!(handle.path().join(".git").exists());
    assert_eq!(handle.current_branch().unwrap().as_deref(), Some("fixture"));
    assert_eq!(handle.head_commit().unwrap(), None);
    let origin = handle.repo().find_remote("origin").unwrap();
    assert_eq!(origin.url(), Some(remote.url().as_str()));
}

#[test]
fn test_reopen_existing_working_copy_fetches() {
    let remote = BareRemote::with_main(&[("README.md", "v1")]);
    let workdir = Workdir::new();
    drop(open(&remote, &workdir, "wc", "main"));

    let later = remote.commit("main", &[("README.md", "v2")], "update");
    let handle = open(&remote, &workdir, "wc", "main");

    let tracking = handle
        .repo()
        .find_reference("refs/remotes/origin/main")
        .unwrap();
    assert_eq!(tracking.target(), Some(later));
}

#[test]
fn test_reopen_with_different_remote_fails() {
    let first = BareRemote::with_main(&[("a", "a")]);
    let second = BareRemote::with_main(&[("b", "b")]);
    let workdir = Workdir::new();
    drop(open(&first, &workdir, "wc", "main"));

    let result = RepositoryHandle::open_or_clone(
        workdir.checkout("wc"),
        &second.url(),
        token_auth(),
        "main",
        DEFAULT_TIMEOUT,
    );

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Clone { .. }), "got: {err}");
}

#[test]
fn test_clone_of_missing_remote_is_clone_error() {
    let workdir = Workdir::new();
    let missing = workdir.root().join("no-such-remote.git");

    let result = RepositoryHandle::open_or_clone(
        workdir.checkout("wc"),
        &missing.to_string_lossy(),
        token_auth(),
        "main",
        DEFAULT_TIMEOUT,
    );

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Clone { .. }), "got: {err}");
    assert!(!err.is_timeout());
}

#[test]
fn test_list_remote_refs_sees_branches_and_tags() {
    let remote = BareRemote::with_main(&[("README.md", "x")]);
    let tip = remote.tip("main").unwrap();
    remote.tag("v1", tip);
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");

    let refs = handle.list_remote_refs().unwrap();

    assert!(refs.contains("refs/heads/main"));
    assert!(refs.contains("refs/tags/v1"));
    assert_eq!(refs.target("refs/heads/main"), Some(tip));
    assert_eq!(refs.branches().collect::<Vec<_>>(), vec!["main"]);
}

#[test]
fn test_local_transport_ignores_deadline() {
    // Only network transports drive the callbacks that check the deadline.
    let remote = BareRemote::with_main(&[("README.md", "main")]);
    let workdir = Workdir::new();

    let handle = RepositoryHandle::open_or_clone(
        workdir.checkout("wc"),
        &remote.url(),
        token_auth(),
        "main",
        std::time::Duration::ZERO,
    )
    .unwrap();

    assert_eq!(handle.head_commit().unwrap(), remote.tip("main"));
}

#[test]
fn test_fetch_overwrites_stale_local_tags() {
    let remote = BareRemote::with_main(&[("README.md", "main")]);
    let first = remote.tip("main").unwrap();
    remote.tag("v1", first);
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");

    let second = remote.commit("main", &[("b", "b")], "b");
    remote.repo().tag_delete("v1").unwrap();
    remote.tag("v1", second);
    handle.fetch().unwrap();

    let local = handle
        .repo()
        .find_reference("refs/tags/v1")
        .unwrap()
        .peel_to_commit()
        .unwrap()
        .id();
    assert_eq!(local, second);
}
