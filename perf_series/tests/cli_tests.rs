use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// The binary, isolated from any user or repository configuration.
fn perf_series(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("perf-series").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .arg("--store")
        .arg(home.join("store"));
    cmd
}

fn add_run(home: &Path, commit: &str, timestamp: i64, measurement: &str) {
    perf_series(home)
        .args(["add", "-s", "suite", "-c", commit, "--timestamp"])
        .arg(timestamp.to_string())
        .args(["-m", measurement])
        .assert()
        .success();
}

fn fill(home: &Path, values: &[&str]) {
    for (i, value) in values.iter().enumerate() {
        add_run(home, &format!("c{i}"), i as i64, &format!("startup={value}ms"));
    }
}

#[test]
fn test_evaluate_fails_on_regression() {
    let home = TempDir::new().unwrap();
    fill(home.path(), &["10", "10.2", "9.8", "10.1", "15"]);

    let output = perf_series(home.path())
        .args(["evaluate", "-s", "suite"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("❌ 'startup'"), "{stdout}");
}

#[test]
fn test_evaluate_passes_within_threshold() {
    let home = TempDir::new().unwrap();
    fill(home.path(), &["10", "10.2", "9.8", "10.1", "10.5"]);

    let output = perf_series(home.path())
        .args(["evaluate", "-s", "suite", "-m", "startup"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8(output).unwrap().contains("✅ 'startup'"));
}

#[test]
fn test_threshold_from_command_line_and_config() {
    let home = TempDir::new().unwrap();
    fill(home.path(), &["10", "10.2", "9.8", "10.1", "15"]);

    perf_series(home.path())
        .args(["evaluate", "-s", "suite", "--threshold", "0.6"])
        .assert()
        .success();

    fs::write(
        home.path().join(".perfseriesconfig"),
        "[evaluate.measurement.\"startup\"]\nthreshold_ratio = 1.0\n",
    )
    .unwrap();
    perf_series(home.path())
        .args(["evaluate", "-s", "suite"])
        .assert()
        .success();

    // Command line beats configuration
    perf_series(home.path())
        .args(["evaluate", "-s", "suite", "-t", "0.1"])
        .assert()
        .failure();
}

#[test]
fn test_single_run_is_inconclusive_and_succeeds() {
    let home = TempDir::new().unwrap();
    fill(home.path(), &["10"]);

    let output = perf_series(home.path())
        .args(["evaluate", "-s", "suite"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8(output).unwrap().contains("Inconclusive"));
}

#[test]
fn test_duplicate_commit_is_rejected() {
    let home = TempDir::new().unwrap();
    add_run(home.path(), "abc", 1, "startup=1ms");

    perf_series(home.path())
        .args(["add", "-s", "suite", "-c", "abc", "-m", "startup=2ms"])
        .assert()
        .failure();

    perf_series(home.path())
        .args(["add", "-s", "suite", "-c", "abc", "--rerun", "-m", "startup=2ms"])
        .assert()
        .success();

    let lines = fs::read_to_string(home.path().join("store").join("suite.jsonl")).unwrap();
    assert_eq!(lines.lines().count(), 2);
}

#[test]
fn test_show_window_and_list() {
    let home = TempDir::new().unwrap();
    fill(home.path(), &["4", "1", "2", "3"]);

    let show = perf_series(home.path())
        .args(["show", "-s", "suite"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8(show).unwrap().starts_with("commit:    c3"));

    let window = perf_series(home.path())
        .args(["window", "-s", "suite", "-m", "startup", "-n", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8(window).unwrap().contains("n: 2"));

    let list = perf_series(home.path())
        .arg("list")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8(list).unwrap().contains("suite\t4 runs\tlatest: c3"));
}

#[test]
fn test_import_criterion_json() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("criterion.json");
    fs::write(
        &input,
        r#"{"reason":"benchmark-complete","id":"parse/small","unit":"us","mean":{"estimate":1.5},"median":{"estimate":1.4}}"#,
    )
    .unwrap();

    perf_series(home.path())
        .args(["import", "-f", "criterion-json", "-s", "bench", "-c", "abc", "-i"])
        .arg(&input)
        .arg("--dry-run")
        .assert()
        .success();
    assert!(!home.path().join("store").join("bench.jsonl").exists());

    perf_series(home.path())
        .args(["import", "-f", "criterion-json", "-s", "bench", "-c", "abc", "-i"])
        .arg(&input)
        .assert()
        .success();

    let show = perf_series(home.path())
        .args(["show", "-s", "bench"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let show = String::from_utf8(show).unwrap();
    assert!(show.contains("parse/small::mean"));
    assert!(show.contains("parse/small::median (p50)"));
}

#[test]
fn test_config_command() {
    let home = TempDir::new().unwrap();
    let output = perf_series(home.path())
        .arg("config")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("threshold_ratio: 0.1"));
    assert!(stdout.contains("window_size: 10"));
}
