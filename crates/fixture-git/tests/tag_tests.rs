//! Tests for deleting, recreating and publishing tags

mod common;

use common::{author, files, open};
use fixture_git::tag::{list_tags, resolve_branch_tip};
use fixture_git::{Error, TAG_MESSAGE, recreate_tag, stage_and_commit};
use fixture_test_utils::{BareRemote, Workdir};
use pretty_assertions::assert_eq;

#[test]
fn test_recreate_moves_existing_tag_to_new_target() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let commit_a = remote.tip("main").unwrap();
    remote.tag("v1", commit_a);
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");
    let commit_b = stage_and_commit(&handle, "main", files(&[("b", "b")]), &author(), "b")
        .unwrap()
        .commit_id()
        .unwrap();
    fixture_git::push(&handle, &[], false).unwrap();

    let tag = recreate_tag(&handle, "v1", commit_b, &author()).unwrap();

    assert_eq!(tag.target, commit_b);
    assert_eq!(tag.message, TAG_MESSAGE);
    assert_eq!(remote.tag_names(), vec!["v1"]);
    assert_eq!(remote.tag_target("v1"), Some(commit_b));
    assert!(remote.tag_is_annotated("v1"));
}

#[test]
fn test_recreate_when_tag_absent_everywhere() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let tip = remote.tip("main").unwrap();
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");

    let tag = recreate_tag(&handle, "v1", tip, &author()).unwrap();

    assert_eq!(tag.name, "v1");
    assert_eq!(remote.tag_target("v1"), Some(tip));
}

#[test]
fn test_recreate_is_idempotent() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let tip = remote.tip("main").unwrap();
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");

    recreate_tag(&handle, "v1", tip, &author()).unwrap();
    recreate_tag(&handle, "v1", tip, &author()).unwrap();

    assert_eq!(remote.tag_names(), vec!["v1"]);
    assert_eq!(remote.tag_target("v1"), Some(tip));
    assert_eq!(list_tags(&handle).unwrap(), vec!["v1"]);
}

#[test]
fn test_tag_deleted_remotely_but_present_locally() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let tip = remote.tip("main").unwrap();
    remote.tag("v1", tip);
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");
    remote.repo().tag_delete("v1").unwrap();

    recreate_tag(&handle, "v1", tip, &author()).unwrap();

    assert_eq!(remote.tag_target("v1"), Some(tip));
}

#[test]
fn test_other_tags_are_left_alone() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let tip = remote.tip("main").unwrap();
    remote.tag("keep", tip);
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");

    recreate_tag(&handle, "v2", tip, &author()).unwrap();

    assert_eq!(remote.tag_names(), vec!["keep", "v2"]);
}

#[test]
fn test_resolve_branch_tip_prefers_local_then_remote() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let remote_only = remote.commit("remote-only", &[("r", "r")], "r");
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");
    let local = stage_and_commit(&handle, "main", files(&[("l", "l")]), &author(), "l")
        .unwrap()
        .commit_id()
        .unwrap();

    assert_eq!(resolve_branch_tip(&handle, "main").unwrap(), local);
    assert_eq!(resolve_branch_tip(&handle, "remote-only").unwrap(), remote_only);
    assert!(matches!(
        resolve_branch_tip(&handle, "nowhere"),
        Err(Error::RefNotFound { .. })
    ));
}

#[test]
fn test_invalid_tag_name_is_rejected() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let tip = remote.tip("main").unwrap();
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "wc", "main");

    let err = recreate_tag(&handle, "bad tag", tip, &author()).unwrap_err();

    assert!(matches!(err, Error::InvalidRefName { .. }), "got: {err}");
}

#[test]
fn test_stale_copy_of_another_tag_does_not_block_publish() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let commit_a = remote.tip("main").unwrap();
    remote.tag("v1", commit_a);
    let workdir = Workdir::new();
    let stale = open(&remote, &workdir, "stale", "main");
    let other = open(&remote, &workdir, "other", "main");
    let commit_b = stage_and_commit(&other, "main", files(&[("b", "b")]), &author(), "b")
        .unwrap()
        .commit_id()
        .unwrap();
    fixture_git::push(&other, &[], false).unwrap();
    recreate_tag(&other, "v1", commit_b, &author()).unwrap();

    recreate_tag(&stale, "v2", commit_a, &author()).unwrap();

    assert_eq!(remote.tag_names(), vec!["v1", "v2"]);
    assert_eq!(remote.tag_target("v1"), Some(commit_b));
    assert_eq!(remote.tag_target("v2"), Some(commit_a));
}
