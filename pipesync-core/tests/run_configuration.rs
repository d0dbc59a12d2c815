//! Assembly tests for `RunConfiguration` from raw argument text, plus the
//! JSON shape of the records handed to updaters.

use std::collections::BTreeSet;
use std::time::Duration;

use pipesync_core::{
    BranchSet, BuildRecord, BuildResult, Credentials, RunConfiguration, SecretValue, WaitPeriod,
};
use rstest::rstest;

fn credentials() -> Credentials {
    Credentials::new(
        SecretValue::new("tracking-pat"),
        SecretValue::new("project-pat"),
        SecretValue::new("Server=tcp:db;Database=dashboard"),
    )
    .expect("credentials")
}

#[rstest]
#[case("main", "00:01:00", &["main"], 60)]
#[case("main,release/1.0", "00:01:00", &["main", "release/1.0"], 60)]
#[case("release/1.0,main,release/1.0", "01:00:00", &["main", "release/1.0"], 3_600)]
#[case("a,b,c", "0", &["a", "b", "c"], 0)]
fn configuration_reflects_parsed_arguments(
    #[case] branches: &str,
    #[case] wait: &str,
    #[case] expected_branches: &[&str],
    #[case] expected_secs: u64,
) {
    let branches: BranchSet = branches.parse().expect("branches");
    let wait: WaitPeriod = wait.parse().expect("wait period");
    let config = RunConfiguration::new(branches, wait, credentials());

    let actual: BTreeSet<&str> = config.branches().iter().collect();
    let expected: BTreeSet<&str> = expected_branches.iter().copied().collect();
    assert_eq!(actual, expected);
    assert_eq!(
        config.wait_period().as_duration(),
        Duration::from_secs(expected_secs)
    );
    assert_eq!(config.credentials().project_pat().expose(), "project-pat");
}

#[test]
fn build_record_decodes_camel_case_results() {
    let json = r#"{
        "id": 42,
        "definition_id": 45137,
        "build_number": "20240101.3",
        "branch": "main",
        "result": "partiallySucceeded",
        "finish_time": "2024-01-01T10:00:00Z",
        "web_url": null
    }"#;
    let record: BuildRecord = serde_json::from_str(json).expect("decode");
    assert_eq!(record.result, BuildResult::PartiallySucceeded);
    assert!(record.finish_time.is_some());
}
