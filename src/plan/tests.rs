use serde_json::json;

use super::*;
use crate::telemetry::LifecycleEvent;

const BASIC: &str = r#"{
    "version": 1,
    "fixtures": [
        { "name": "a", "scope": "worker", "value": 1 },
        { "name": "b", "scope": "test", "deps": ["a"], "value": 2 },
        { "name": "env", "scope": "test", "deps": ["a", "b"] }
    ],
    "tests": [
        { "name": "reads_b", "uses": ["a", "b"], "expect": { "a": 1, "b": 2 } },
        { "name": "reads_env", "uses": ["env"] }
    ]
}"#;

fn harness_for(plan: &FixturePlan) -> FixtureHarness {
    let pool = FixturePool::new();
    plan.install(&pool).expect("plan installs");
    FixtureHarness::new(pool)
}

#[test]
fn basic_plan_parses() {
    let plan = FixturePlan::from_json(BASIC).unwrap();
    assert_eq!(plan.fixtures.len(), 3);
    assert_eq!(plan.fixture("b").unwrap().deps, vec!["a".to_string()]);
    assert_eq!(plan.tests[0].expect.as_ref().unwrap()["b"], json!(2));
}

#[test]
fn duplicate_fixture_names_are_rejected() {
    let result = FixturePlan::from_json(
        r#"{"version":1,"fixtures":[
            {"name":"a","scope":"test"},
            {"name":"a","scope":"worker"}
        ]}"#,
    );
    assert!(matches!(
        result,
        Err(FixtureError::InvalidPlan { ref reason }) if reason.contains("duplicate fixture")
    ));
}

#[test]
fn undeclared_dependency_is_rejected() {
    let result = FixturePlan::from_json(
        r#"{"version":1,"fixtures":[{"name":"a","scope":"test","deps":["nope"]}]}"#,
    );
    assert!(matches!(result, Err(FixtureError::InvalidPlan { .. })));
}

#[test]
fn unsupported_version_is_rejected() {
    let result = FixturePlan::from_json(r#"{"version":0,"fixtures":[]}"#);
    assert!(matches!(result, Err(FixtureError::InvalidPlan { .. })));
}

#[tokio::test]
async fn basic_plan_runs_and_passes() {
    let plan = FixturePlan::from_json(BASIC).unwrap();
    let harness = harness_for(&plan);

    let report = plan.run(&harness).await;

    assert!(report.passed, "report failed: {report:?}");
    assert_eq!(report.tests.len(), 2);
    assert_eq!(report.tests[0].params["b"], json!(2));
    assert_eq!(report.tests[1].params["env"], json!({ "a": 1, "b": 2 }));
    assert!(report.worker_teardown.is_none());
    assert!(harness.pool().live_fixtures().is_empty());

    // `a` is a worker fixture: set up once across both tests.
    let setups = report
        .events
        .iter()
        .filter(|recorded| {
            matches!(&recorded.event, LifecycleEvent::SetupCompleted { fixture, .. } if fixture == "a")
        })
        .count();
    assert_eq!(setups, 1);
}

#[tokio::test]
async fn expectation_mismatch_fails_the_test() {
    let plan = FixturePlan::from_json(
        r#"{"version":1,
            "fixtures":[{"name":"a","scope":"test","value":"actual"}],
            "tests":[{"name":"t","uses":["a"],"expect":{"a":"wanted"}}]}"#,
    )
    .unwrap();
    let harness = harness_for(&plan);

    let report = plan.run(&harness).await;

    assert!(!report.passed);
    assert_eq!(report.tests[0].mismatches.len(), 1);
    assert!(report.tests[0].mismatches[0].contains("wanted"));
}

#[tokio::test]
async fn injected_failures_are_reported() {
    let plan = FixturePlan::from_json(
        r#"{"version":1,
            "fixtures":[
                {"name":"flaky","scope":"test","fail":"setup"},
                {"name":"sticky","scope":"worker","value":true,"fail":"teardown"}
            ],
            "tests":[
                {"name":"uses_flaky","uses":["flaky"]},
                {"name":"uses_sticky","uses":["sticky"]}
            ]}"#,
    )
    .unwrap();
    let harness = harness_for(&plan);

    let report = plan.run(&harness).await;

    assert!(!report.passed);
    let flaky = report.tests[0].error.as_ref().unwrap();
    assert_eq!(flaky.code, 3002);
    assert!(flaky.message.contains("injected setup failure in flaky"));
    assert!(report.tests[1].passed);

    let teardown = report.worker_teardown.as_ref().unwrap();
    assert_eq!(teardown.code, 3003);
}

#[tokio::test]
async fn cyclic_plan_reports_cycle() {
    let plan = FixturePlan::from_json(
        r#"{"version":1,
            "fixtures":[
                {"name":"x","scope":"test","deps":["y"]},
                {"name":"y","scope":"test","deps":["x"]}
            ],
            "tests":[{"name":"loops","uses":["x"]}]}"#,
    )
    .unwrap();
    let harness = harness_for(&plan);

    let report = plan.run(&harness).await;

    assert_eq!(report.tests[0].error.as_ref().unwrap().code, 3004);
}
