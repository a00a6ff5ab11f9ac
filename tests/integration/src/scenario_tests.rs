//! End-to-end fixture scenarios
//!
//! Each scenario drives the engine against a local bare remote exactly as a
//! harness would: open a working copy, reconcile, commit, push, tag.

use std::sync::Arc;

use fixture_git::auth::{self, Authenticator, Credentials, TransportKind};
use fixture_git::{
    Action, CommitOutcome, DEFAULT_TIMEOUT, FileSet, Identity, RepositoryHandle, push, reconcile,
    recreate_tag, stage_and_commit,
};
use fixture_test_utils::{BareRemote, Workdir};
use pretty_assertions::assert_eq;

fn token_auth() -> Arc<dyn Authenticator> {
    auth::resolve(
        TransportKind::Https,
        Credentials::Token {
            username: "git".into(),
            password: "unused-token".into(),
        },
    )
    .unwrap()
}

fn open(remote: &BareRemote, workdir: &Workdir, hint: &str) -> RepositoryHandle {
    RepositoryHandle::open_or_clone(
        workdir.checkout("wc"),
        &remote.url(),
        token_auth(),
        hint,
        DEFAULT_TIMEOUT,
    )
    .unwrap()
}

#[test]
fn test_scenario_a_first_branch_in_empty_repository() {
    let remote = BareRemote::new();
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "feature");

    let reconciled = reconcile(&handle, "feature").unwrap();
    assert_eq!(reconciled.action, Action::CreateFromHead);
    assert_eq!(reconciled.tip, None);

    let files = FileSet::new().with("a.txt", "hello").unwrap();
    let outcome = stage_and_commit(&handle, "feature", files, &Identity::default(), "add a").unwrap();
    let commit = match outcome {
        CommitOutcome::Committed { id } => id,
        CommitOutcome::NothingToCommit => panic!("expected a commit"),
    };

    push(&handle, &[], false).unwrap();

    assert_eq!(remote.branch_names(), vec!["feature"]);
    assert_eq!(remote.tip("feature"), Some(commit));
    assert_eq!(remote.commit_count("feature"), 1);
    assert_eq!(remote.read_file("feature", "a.txt").as_deref(), Some("hello"));
}

#[test]
fn test_scenario_b_track_remote_only_branch() {
    let remote = BareRemote::with_main(&[("README.md", "fleet")]);
    let release_tip = remote.commit("release", &[("VERSION", "1.0.0")], "release");
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "main");
    let commits_before = remote.commit_count("release");

    let reconciled = reconcile(&handle, "release").unwrap();

    assert_eq!(reconciled.action, Action::TrackRemote);
    assert_eq!(reconciled.tip, Some(release_tip));
    assert_eq!(handle.head_commit().unwrap(), Some(release_tip));
    assert_eq!(handle.current_branch().unwrap().as_deref(), Some("release"));
    assert_eq!(remote.commit_count("release"), commits_before);
    let upstream = handle
        .repo()
        .find_branch("release", git2::BranchType::Local)
        .unwrap()
        .upstream()
        .unwrap();
    assert_eq!(upstream.name().unwrap(), Some("origin/release"));
}

#[test]
fn test_scenario_c_recreate_tag_at_new_commit() {
    let remote = BareRemote::with_main(&[("README.md", "a")]);
    let commit_a = remote.tip("main").unwrap();
    remote.tag("v1", commit_a);
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "main");

    // Absent locally: the clone only fetched it, then drop it.
    handle.repo().tag_delete("v1").unwrap();

    reconcile(&handle, "main").unwrap();
    let commit_b = stage_and_commit(
        &handle,
        "main",
        FileSet::new().with("b.txt", "b").unwrap(),
        &Identity::default(),
        "b",
    )
    .unwrap()
    .commit_id()
    .unwrap();
    push(&handle, &[], false).unwrap();

    let tag = recreate_tag(&handle, "v1", commit_b, &Identity::default()).unwrap();

    assert_eq!(tag.target, commit_b);
    assert_eq!(remote.tag_names(), vec!["v1"]);
    assert_eq!(remote.tag_target("v1"), Some(commit_b));
}

#[test]
fn test_four_cells_leave_expected_tips() {
    let remote = BareRemote::with_main(&[("README.md", "fleet")]);
    let main_tip = remote.tip("main").unwrap();
    let both_tip = remote.commit("both", &[("both", "1")], "both");
    let remote_only_tip = remote.commit("remote-only", &[("r", "1")], "remote only");
    let workdir = Workdir::new();
    let handle = open(&remote, &workdir, "both");

    // remote and local: the clone created local `both`
    let both = reconcile(&handle, "both").unwrap();
    assert_eq!((both.action, both.tip), (Action::CheckoutLocal, Some(both_tip)));

    // remote only
    let tracked = reconcile(&handle, "remote-only").unwrap();
    assert_eq!(
        (tracked.action, tracked.tip),
        (Action::TrackRemote, Some(remote_only_tip))
    );

    // local only
    let head = handle.repo().find_commit(main_tip).unwrap();
    handle.repo().branch("local-only", &head, false).unwrap();
    let local = reconcile(&handle, "local-only").unwrap();
    assert_eq!((local.action, local.tip), (Action::CheckoutLocal, Some(main_tip)));

    // neither: created at whatever HEAD is now
    let created = reconcile(&handle, "brand-new").unwrap();
    assert_eq!(
        (created.action, created.tip),
        (Action::CreateFromHead, Some(main_tip))
    );
}

#[test]
fn test_harness_flow_through_fixture() {
    let remote = BareRemote::with_main(&[("README.md", "fleet")]);
    let mut config = fixture_core::FixtureConfig::default();
    config.repository.http = Some(remote.url());
    config.credentials.password = Some("unused-token".into());
    let fixture = fixture_core::Fixture::new(config).unwrap();

    let seeded = fixture
        .sync(
            "main",
            fixture_core::bootstrap_seed(&fixture.config().bootstrap).unwrap(),
        )
        .unwrap();
    let app = fixture
        .sync(
            "main",
            FileSet::new()
                .with("clusters/e2e/app.yaml", "image: podinfo:6.0.0\n")
                .unwrap(),
        )
        .unwrap();
    fixture.publish_tag("main", "v1").unwrap();

    assert!(seeded.committed());
    assert_eq!(remote.tip("main"), app.commit);
    assert_eq!(remote.tag_target("v1"), app.commit);
    assert!(
        remote
            .read_file("main", "clusters/e2e/flux-system/kustomization.yaml")
            .is_some()
    );
}
