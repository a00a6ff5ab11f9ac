//! Independent fixtures on separate threads

use std::thread;

use fixture_core::{Fixture, FixtureConfig};
use fixture_git::FileSet;
use fixture_test_utils::BareRemote;
use pretty_assertions::assert_eq;

fn config_for(url: &str) -> FixtureConfig {
    let mut config = FixtureConfig::default();
    config.repository.http = Some(url.to_string());
    config.credentials.password = Some("unused-token".into());
    config
}

#[test]
fn test_fixtures_on_distinct_branches_run_in_parallel() {
    let remote = BareRemote::with_main(&[("README.md", "fleet")]);
    let url = remote.url();
    let branches: Vec<String> = (0..4).map(|i| format!("e2e/worker-{i}")).collect();

    let workers: Vec<_> = branches
        .iter()
        .cloned()
        .map(|branch| {
            let config = config_for(&url);
            thread::spawn(move || {
                let fixture = Fixture::new(config).unwrap();
                let files = FileSet::new()
                    .with("owner.txt", branch.as_bytes().to_vec())
                    .unwrap();
                let outcome = fixture.sync(&branch, files).unwrap();
                fixture.publish_tag(&branch, &format!("{}-done", branch.replace('/', "-"))).unwrap();
                (branch, outcome.commit)
            })
        })
        .collect();

    for worker in workers {
        let (branch, commit) = worker.join().unwrap();
        assert_eq!(remote.tip(&branch), commit);
        assert_eq!(remote.read_file(&branch, "owner.txt").as_deref(), Some(branch.as_str()));
    }

    let mut expected: Vec<String> = branches.clone();
    expected.push("main".into());
    expected.sort();
    assert_eq!(remote.branch_names(), expected);
    assert_eq!(remote.tag_names().len(), 4);
}
