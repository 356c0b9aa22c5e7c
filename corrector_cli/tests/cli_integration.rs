use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config for the simulated server: fast ticks, linear model on speed.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[server]
url = "opc.tcp://sim:4840"
reconnect_delay_ms = 5

[orchestration]
trigger_step = 2

[correction]
gain = 1.0
inference_timeout_ms = 500

[model]
# one coefficient per entry of features.inputs (all seven by default)
coef_x = [0.0, 0.0, 0.0, 0.0, 0.0, 0.01, 0.0]
coef_y = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -0.01]

[sim]
cycles = 3
tick_ms = 0
connect_failures = 2
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["health"], 0, "ok", "stdout")]
#[case(&["check-config"], 0, "config ok", "stdout")]
#[case(&["run"], 0, "corrections=3", "stdout")]
#[case(&["run", "--cycles", "2"], 0, "cycles=2", "stdout")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("corrector").unwrap();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
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
fn run_json_summary_has_counters() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("run")
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let line = stdout.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["cycles"], 3);
    assert_eq!(v["corrections"], 3);
    assert_eq!(v["skipped"], 0);
    assert_eq!(v["interrupted"], false);
}

#[rstest]
fn rejected_cycle_tag_is_counted_not_fatal() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .env("CORRECTOR_TEST_SIM_FAIL_WRITE", "correction_cycle")
        .assert()
        .success()
        .stdout(predicate::str::contains("corrections=0").and(predicate::str::contains("write_failures=3")));
}

#[rstest]
fn missing_model_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, "[sim]\ncycles = 1\n").unwrap();

    Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("[model]"));
}

#[rstest]
#[case("[correction]\ngain = 0.0\n", "correction.gain")]
#[case("[features]\ninputs = [\"humidity\"]\n", "unknown feature")]
#[case("[orchestration]\ncycle = \"speed\"\n", "shadow an input feature")]
fn invalid_config_is_rejected(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();

    Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn invalid_config_json_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, "[correction]\nqueue_capacity = 0\n").unwrap();

    let out = Command::cargo_bin("corrector")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let v: serde_json::Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(v["reason"], "Config");
    assert!(v["message"].as_str().unwrap().contains("queue_capacity"));
}

#[rstest]
fn cli_reports_bad_binding_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad_csv = dir.path().join("nodes.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "node,display_name").unwrap();
    writeln!(f, "ns=2;i=1,cycle").unwrap();

    Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--binding")
        .arg(&bad_csv)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("node_id,name"));
}

#[rstest]
fn binding_without_step_node_is_rejected() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let csv = dir.path().join("nodes.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "node_id,name").unwrap();
    writeln!(f, "ns=2;i=1,cycle").unwrap();

    Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--binding")
        .arg(&csv)
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("process_step"));
}

#[rstest]
fn renamed_outputs_are_written_and_checked_against_binding() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let mut text = fs::read_to_string(&cfg).unwrap();
    text.push_str("\n[outputs]\ncorrection_x = \"plc_corr_x\"\n");
    fs::write(&cfg, text).unwrap();

    Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("corrections=3"));

    // The shipped-style table still names the default output.
    let csv = dir.path().join("nodes.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "node_id,name").unwrap();
    for (i, name) in [
        "cycle",
        "process_step",
        "air_temperature",
        "attached_weight",
        "position_x",
        "position_y",
        "process_temperature",
        "speed",
        "speed_next",
        "correction_x",
        "correction_y",
        "correction_cycle",
    ]
    .iter()
    .enumerate()
    {
        writeln!(f, "ns=2;i={},{name}", i + 1).unwrap();
    }
    drop(f);

    Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--binding")
        .arg(&csv)
        .arg("check-config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("plc_corr_x"));
}

#[rstest]
fn trace_flag_prints_notifications_at_default_level() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    Command::cargo_bin("corrector")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--cycles")
        .arg("1")
        .arg("--trace-notifications")
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("data change"));
}
