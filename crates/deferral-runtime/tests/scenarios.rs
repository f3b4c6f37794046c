//! scenarios.rs - pinned transcripts of the built-in scenarios

use deferral_runtime::{FailureOrigin, Runtime, Scenario, Value};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn run(scenario: Scenario) -> deferral_runtime::ScenarioReport {
    scenario.run(&Runtime::new())
}

#[test]
fn test_capture() {
    let report = run(Scenario::Capture);
    assert_eq!(report.transcript, vec!["3: a = 2", "2: a = 1", "1: a = 1"]);
    assert_eq!(report.returned, None);
    assert_eq!(report.failure, None);
}

#[test]
fn test_unnamed() {
    let report = run(Scenario::Unnamed);
    assert_eq!(report.transcript, vec!["defer2: 1", "defer1: 2"]);
    assert_eq!(report.returned, Some(Value::Int(0)));
}

#[test]
fn test_named() {
    let report = run(Scenario::Named);
    assert_eq!(report.transcript, vec!["defer2: 1", "defer1: 2"]);
    assert_eq!(report.returned, Some(Value::Int(2)));
}

#[test]
fn test_reference() {
    let report = run(Scenario::Reference);
    assert_eq!(report.transcript, vec!["defer1: 1", "defer2: 2"]);
    assert_eq!(report.returned, Some(Value::Int(2)));
}

#[test]
fn test_shadowed() {
    let report = run(Scenario::Shadowed);
    assert_eq!(report.transcript, vec!["r = 0", "r = 5"]);
    assert_eq!(report.returned, Some(Value::Int(1)));
}

#[test]
fn test_loop() {
    let report = run(Scenario::Loop);
    assert_eq!(report.transcript, vec!["c", "b", "a"]);
}

#[test]
fn test_lookup() {
    let report = run(Scenario::Lookup);
    assert_eq!(
        report.transcript,
        vec!["worker-0 = 0", "worker-1 = 1", "worker-2 = 4", "worker-3 = 9"]
    );
    assert_eq!(report.returned, Some(Value::Int(4)));
}

#[test]
fn test_release() {
    let report = run(Scenario::Release);
    assert_eq!(
        report.transcript,
        vec![
            "acquire handle",
            "read from handle",
            "release handle while failing: read: connection reset"
        ]
    );
    let failure = report.failure.unwrap();
    assert_eq!(failure.origin, FailureOrigin::Body);
    assert_eq!(failure.message, "read: connection reset");
}

#[test]
fn test_masking() {
    let report = run(Scenario::Masking);
    assert_eq!(
        report.transcript,
        vec!["second cleanup fails", "first cleanup fails"]
    );
    assert_eq!(report.returned, None);
    assert_eq!(report.failure.unwrap().message, "first cleanup failed");
}

#[rstest]
#[case(Scenario::Capture)]
#[case(Scenario::Named)]
#[case(Scenario::Lookup)]
#[case(Scenario::Release)]
fn test_scenarios_are_repeatable(#[case] scenario: Scenario) {
    assert_eq!(run(scenario), run(scenario));
}

#[test]
fn test_all_names_are_unique() {
    let mut names: Vec<&str> = Scenario::ALL.iter().map(Scenario::name).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), Scenario::ALL.len());
}
