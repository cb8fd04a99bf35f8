use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fixture_plan"))
}

fn repo_file(dir: &str, name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join(dir)
        .join(name)
        .to_string_lossy()
        .into_owned()
}

#[test]
fn run_basic_plan_succeeds() {
    let output = cli()
        .args([
            "--config",
            &repo_file("config", "engine.json"),
            "run",
            "--plan",
            &repo_file("plans", "basic.json"),
        ])
        .output()
        .expect("failed to run fixture_plan run");
    assert!(
        output.status.success(),
        "CLI exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let report: Value = serde_json::from_str(stdout.trim()).expect("plan report JSON payload");
    assert_eq!(report["passed"], true);
    assert_eq!(report["tests"].as_array().map(Vec::len), Some(3));
    assert_eq!(report["tests"][1]["params"]["env"]["b"], 2);

    let worker_setups = report["events"]
        .as_array()
        .expect("events array")
        .iter()
        .filter(|event| event["type"] == "setup_completed" && event["fixture"] == "a")
        .count();
    assert_eq!(worker_setups, 1);
}

#[test]
fn failing_plan_exits_with_two() {
    let output = cli()
        .args(["run", "--plan", &repo_file("plans", "failures.json")])
        .output()
        .expect("failed to run failing plan");
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let report: Value = serde_json::from_str(stdout.trim()).expect("plan report JSON payload");
    assert_eq!(report["passed"], false);
    assert_eq!(report["tests"][0]["error"]["code"], 3002);
    assert_eq!(report["tests"][1]["passed"], true);
    assert_eq!(report["worker_teardown"]["code"], 3003);
}

#[test]
fn check_validates_without_running() {
    let output = cli()
        .args(["check", "--plan", &repo_file("plans", "basic.json")])
        .output()
        .expect("failed to run fixture_plan check");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let summary: Value = serde_json::from_str(stdout.trim()).expect("check summary JSON");
    assert_eq!(summary["fixtures"], 3);
    assert_eq!(summary["tests"], 3);
}

#[test]
fn missing_plan_is_a_usage_error() {
    let output = cli()
        .args(["run", "--plan", &repo_file("plans", "does_not_exist.json")])
        .output()
        .expect("failed to run fixture_plan with missing plan");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("3009"), "expected plan error code, got {stderr}");
}
