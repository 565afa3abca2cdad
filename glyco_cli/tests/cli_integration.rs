use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const NOW: &str = "2024-03-01T12:00:00Z";

// Minimal valid config with limits so recommendations are produced
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[algorithm]
history_hours = 6

[limits]
max_bolus = 5.0
max_basal_rate = 3.0
suspend_threshold = 70.0
bolus_increment = 0.05

[schedules]
basal = [{ start = "00:00", value = 0.8 }, { start = "06:00", value = 1.0 }]
sensitivity = [{ start = "00:00", value = 45.0 }]
carb_ratio = [{ start = "00:00", value = 10.0 }]
target = [{ start = "00:00", min = 100.0, max = 110.0 }]
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

// Flat 120 mg/dL every 5 minutes from 09:00 to 12:00 UTC, no treatments
fn write_flat_history(dir: &tempfile::TempDir) -> PathBuf {
    let glucose: Vec<_> = (0..=36)
        .map(|k| {
            json!({
                "time": format!("2024-03-01T{:02}:{:02}:00Z", 9 + k * 5 / 60, (k * 5) % 60),
                "value": 120.0,
            })
        })
        .collect();
    let path = dir.path().join("history.json");
    fs::write(&path, json!({ "glucose": glucose }).to_string()).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "Config OK", "stdout")]
#[case(&["forecast", "--history", "{history}", "--now", NOW], 0, "Eventual glucose: 120", "stdout")]
#[case(&["forecast", "--history", "{history}", "--now", "2024-03-01T08:00:00Z"], 3, "No glucose sample", "stderr")]
#[case(&["forecast"], 2, "required", "stderr")]
#[case(&["forecast", "--history", "{history}", "--now", "yesterday"], 2, "invalid value", "stderr")]
#[case(&["timeline", "--history", "{history}", "--start", NOW, "--end", NOW, "--stride-minutes", "0"], 1, "stride", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let history = write_flat_history(&dir);

    let mut cmd = Command::cargo_bin("glyco").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);

    for a in args {
        if *a == "{history}" {
            cmd.arg(&history);
        } else {
            cmd.arg(a);
        }
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        _ => {
            assert.stderr(predicate::str::contains(needle));
        }
    }
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not read the config file"));
}

#[test]
fn invalid_config_values_are_humanized() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let text = fs::read_to_string(&cfg)
        .unwrap()
        .replace("history_hours = 6", "history_hours = 0");
    fs::write(&cfg, text).unwrap();

    Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("history_hours"));
}

#[test]
fn basal_csv_replaces_configured_basal() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("basal.csv");
    fs::write(&csv, "start,value\n00:00,0.5\n12:00,0.7\n").unwrap();

    Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--basal-csv")
        .arg(&csv)
        .arg("self-check")
        .assert()
        .success();
}

#[test]
fn basal_csv_with_wrong_headers_is_rejected() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("basal.csv");
    fs::write(&csv, "time,rate\n00:00,0.5\n").unwrap();

    Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--basal-csv")
        .arg(&csv)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Expected 'start,value'"));
}

#[test]
fn fixture_then_replay_reproduces_forecast() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let history = write_flat_history(&dir);
    let fixture = dir.path().join("case.json");

    Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["fixture", "--history"])
        .arg(&history)
        .args(["--now", NOW, "--out"])
        .arg(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Fixture written"));
    assert!(fixture.exists());

    let forecast = Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["forecast", "--history"])
        .arg(&history)
        .args(["--now", NOW])
        .output()
        .unwrap();
    assert!(forecast.status.success());

    // Replay defaults `now` to the latest glucose sample (12:00).
    let replay = Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["replay", "--fixture"])
        .arg(&fixture)
        .output()
        .unwrap();
    assert!(replay.status.success());

    let a: serde_json::Value = serde_json::from_slice(&forecast.stdout).unwrap();
    let b: serde_json::Value = serde_json::from_slice(&replay.stdout).unwrap();
    assert_eq!(a, b);
}

#[test]
fn fixture_without_basal_exits_with_coverage_code() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let history = write_flat_history(&dir);
    let fixture = dir.path().join("case.json");

    Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["fixture", "--history"])
        .arg(&history)
        .args(["--now", NOW, "--out"])
        .arg(&fixture)
        .assert()
        .success();

    let mut v: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&fixture).unwrap()).unwrap();
    v["basal"] = json!([]);
    fs::write(&fixture, v.to_string()).unwrap();

    Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["replay", "--fixture"])
        .arg(&fixture)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("basal schedule does not cover"));
}

#[test]
fn evaluate_scores_against_later_samples() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let history = write_flat_history(&dir);

    // Forecast from 11:00; the 12:05 point still pairs with the 12:00 sample.
    Command::cargo_bin("glyco")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["evaluate", "--history"])
        .arg(&history)
        .args(["--now", "2024-03-01T11:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Paired points: 13"))
        .stdout(predicate::str::contains("MAE:  0.00"));
}
