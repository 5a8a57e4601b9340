use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const OVERRIDES: [&str; 8] = [
    "MQTT_BROKER",
    "MQTT_PORT",
    "MQTT_TOPIC",
    "MQTT_CLIENT_ID",
    "PORT",
    "MAX_WEIGHT",
    "OVERLOAD_THRESHOLD",
    "ALERT_ENABLED",
];

const ORDERS: &str = r#"{
  "MO-7": {"data": {"t_mo_id": 7, "nomor_mo": "MO-7", "qty_plan": 1, "lot": 0,
           "produk_rm": [{"item": "Sugar", "qty": 4}, {"item": "Salt", "qty": 1}]}}
}"#;

const SCENARIO: &str = r#"
# connect, weigh one lot of two RMs
{"kind":"link","event":{"state":"connected"}}
{"kind":"transport","topic":"amanerve/loadcell/telemetry","payload":{"weight":0.5,"stable":true}}
{"kind":"operator","action":{"type":"mo-confirmed","mo":"MO-7"}}
{"kind":"operator","action":{"type":"confirm-plan"}}
{"kind":"delay","ms":1000}
{"kind":"transport","topic":"amanerve/loadcell/telemetry","payload":{"weight":4.0,"stable":true}}
{"kind":"operator","action":{"type":"print-confirm","lot":0,"rm_index":0,"weight":4.0}}
{"kind":"operator","action":{"type":"print-confirm","lot":0,"rm_index":1,"weight":1.0}}
"#;

fn loadcell() -> Command {
    let mut cmd = Command::cargo_bin("loadcell").unwrap();
    for key in OVERRIDES {
        cmd.env_remove(key);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["health"], 0, "ok", "stdout")]
#[case(&["check-config"], 0, "Config OK", "stdout")]
#[case(&["replay"], 2, "required", "stderr")]
#[case(&["query", "/api/weight/latest"], 4, "No weight data available", "stdout")]
#[case(&["query", "/api/nope"], 4, "Not found", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let assert = loadcell().args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn replay_runs_an_order_end_to_end() {
    let dir = tempdir().unwrap();
    let scenario = write(&dir, "scenario.jsonl", SCENARIO);
    let orders = write(&dir, "orders.json", ORDERS);
    let records = dir.path().join("records.jsonl");
    let cfg = write(
        &dir,
        "cfg.toml",
        &format!("[persistence]\nfile = {:?}\n", records.display().to_string()),
    );

    let out = loadcell()
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg(&scenario)
        .arg("--orders")
        .arg(&orders)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let events: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let names: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
    assert_eq!(names[0], "mqtt-status");
    assert!(names.contains(&"mo-entry-requested"));
    assert!(names.contains(&"mo-data-confirm"));
    assert_eq!(names.last(), Some(&"order-complete"));

    // replay time starts at a fixed epoch and moves only with delay steps
    let weights: Vec<&serde_json::Value> =
        events.iter().filter(|e| e["event"] == "weightData").collect();
    assert_eq!(weights[0]["payload"]["timestamp"], "2026-01-01T00:00:00.000Z");
    assert_eq!(weights[1]["payload"]["timestamp"], "2026-01-01T00:00:01.000Z");

    let complete = &events.last().unwrap()["payload"];
    assert_eq!(complete["mo_identifier"], "MO-7");
    assert_eq!(complete["total_items_weighed"], 2);

    let lines = fs::read_to_string(&records).unwrap();
    assert_eq!(lines.lines().count(), 5);
}

#[rstest]
fn replay_json_mode_prints_a_summary() {
    let dir = tempdir().unwrap();
    let scenario = write(&dir, "scenario.jsonl", SCENARIO);
    let orders = write(&dir, "orders.json", ORDERS);

    let out = loadcell()
        .args(["--json", "replay"])
        .arg(&scenario)
        .arg("--orders")
        .arg(&orders)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let last: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["summary"]["steps"], 8);
    assert_eq!(last["summary"]["interrupted"], false);
    assert_eq!(last["status"]["phase"], "all_lots_complete");
    assert_eq!(last["status"]["mqtt_connected"], true);
}

#[rstest]
fn replay_without_orders_reports_lookup_failure() {
    let dir = tempdir().unwrap();
    let scenario = write(
        &dir,
        "scenario.jsonl",
        r#"{"kind":"operator","action":{"type":"mo-confirmed","mo":"MO-7"}}"#,
    );
    loadcell()
        .arg("replay")
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""success":false"#))
        .stdout(predicate::str::contains("no order lookup configured"));
}

#[rstest]
fn bad_scenario_line_is_reported() {
    let dir = tempdir().unwrap();
    let scenario = write(
        &dir,
        "scenario.jsonl",
        "{\"kind\":\"viewer\"}\n{\"kind\":\"teleport\"}\n",
    );
    loadcell()
        .arg("replay")
        .arg(&scenario)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Scenario line 2"));
}

#[rstest]
fn bad_scenario_line_as_json() {
    let dir = tempdir().unwrap();
    let scenario = write(&dir, "scenario.jsonl", "not json\n");
    let out = loadcell()
        .arg("--json")
        .arg("replay")
        .arg(&scenario)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let err: serde_json::Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(err["reason"], "Scenario");
    assert_eq!(err["details"]["line"], 1);
}

#[rstest]
fn query_after_scenario_answers_from_history() {
    let dir = tempdir().unwrap();
    let scenario = write(&dir, "scenario.jsonl", SCENARIO);
    let orders = write(&dir, "orders.json", ORDERS);

    let out = loadcell()
        .args(["query", "/api/weight/stats", "--scenario"])
        .arg(&scenario)
        .arg("--orders")
        .arg(&orders)
        .output()
        .unwrap();
    assert!(out.status.success());
    let body: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["max"], 4.0);
    assert_eq!(body["data"]["latest"], 4.0);
}

#[rstest]
#[case::sent(true, r#"{"command":"HIGH_GREEN"}"#, 0, "LED command sent: HIGH_GREEN")]
#[case::unknown_command(true, r#"{"command":"PURPLE"}"#, 0, "Failed to send LED command")]
#[case::broker_down(false, r#"{"command":"HIGH_GREEN"}"#, 0, "Failed to send LED command")]
#[case::missing(true, r#"{}"#, 4, "Command is required")]
fn query_led_control(
    #[case] connect: bool,
    #[case] body: &str,
    #[case] code: i32,
    #[case] needle: &str,
) {
    let dir = tempdir().unwrap();
    let mut cmd = loadcell();
    cmd.args(["query", "/api/led/control", "--method", "POST", "--body", body]);
    if connect {
        let scenario = write(
            &dir,
            "link.jsonl",
            r#"{"kind":"link","event":{"state":"connected"}}"#,
        );
        cmd.arg("--scenario").arg(&scenario);
    }
    cmd.assert()
        .code(code)
        .stdout(predicate::str::contains(needle));
}

#[rstest]
fn invalid_config_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let cfg = write(
        &dir,
        "cfg.toml",
        "[loadcell]\nmax_weight = 50.0\noverload_threshold = 60.0\n",
    );
    loadcell()
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "overload_threshold must be <= loadcell.max_weight",
        ));
}

#[rstest]
fn env_override_is_validated() {
    loadcell()
        .env("OVERLOAD_THRESHOLD", "heavy")
        .arg("check-config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("OVERLOAD_THRESHOLD"));
}

#[rstest]
fn check_config_json_reflects_overrides() {
    let out = loadcell()
        .env("OVERLOAD_THRESHOLD", "75")
        .env("ALERT_ENABLED", "false")
        .args(["--json", "check-config"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["overload_threshold"], 75.0);
    assert_eq!(v["alert_enabled"], false);
}

#[rstest]
fn missing_config_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    loadcell()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("health")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("could not be read"));
}
