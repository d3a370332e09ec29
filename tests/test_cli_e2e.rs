mod common;

use common::{sample_series, spawn_command, temp_file};
use serde_json::Value;

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ============================================================================
// version / completions
// ============================================================================

#[test]
fn version_human() {
    let output = spawn_command(&["version"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.starts_with("biocalm "), "{out}");
    assert!(out.contains('.'), "version output should carry a number: {out}");
}

#[test]
fn version_json() {
    let output = spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
    assert_eq!(parsed["name"], "biocalm");
    assert!(parsed["version"].is_string());
}

#[test]
fn completions_bash() {
    let output = spawn_command(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("biocalm"));
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = spawn_command(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn validate_accepts_good_config() {
    let file = temp_file(
        "baseline:\n  default_duration_secs: 30\ngames:\n  duration_secs: 45\n",
        ".yaml",
    );
    let output = spawn_command(&["--quiet", "validate", file.path().to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains(": ok"));
}

#[test]
fn validate_rejects_bad_config_with_config_exit_code() {
    let file = temp_file("games:\n  duration_secs: 0\n", ".yaml");
    let output = spawn_command(&[
        "--quiet",
        "validate",
        "--format",
        "json",
        file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
    let reports: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(reports[0]["valid"], false);
    assert!(
        reports[0]["errors"][0]
            .as_str()
            .unwrap()
            .contains("games.duration_secs")
    );
}

#[test]
fn validate_counts_every_failed_file() {
    let good = temp_file("games:\n  duration_secs: 60\n", ".yaml");
    let bad = temp_file("games: [not, a, map]\n", ".yaml");
    let output = spawn_command(&[
        "--quiet",
        "validate",
        good.path().to_str().unwrap(),
        bad.path().to_str().unwrap(),
        "/nonexistent/session.yaml",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2 file(s) failed validation"), "{stderr}");
}

#[test]
fn validate_strict_fails_on_warnings() {
    let file = temp_file("stop:\n  max_retries: 0\n", ".yaml");
    let path = file.path().to_str().unwrap();
    assert!(spawn_command(&["--quiet", "validate", path]).status.success());
    assert!(
        !spawn_command(&["--quiet", "validate", "--strict", path])
            .status
            .success()
    );
}

// ============================================================================
// chart
// ============================================================================

#[test]
fn chart_summarises_a_saved_series() {
    let file = temp_file(&sample_series(20).to_string(), ".json");
    let output = spawn_command(&["--quiet", "chart", file.path().to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let out = stdout(&output);
    assert!(out.contains("20 points"), "{out}");
    assert!(out.contains("split at 10"), "{out}");
    assert!(out.contains("samples: 20"), "{out}");
}

#[test]
fn chart_json_and_out_file() {
    let file = temp_file(
        &serde_json::json!({ "success": true, "chart_data": sample_series(8) }).to_string(),
        ".json",
    );
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("charts.json");
    let output = spawn_command(&[
        "--quiet",
        "chart",
        "--format",
        "json",
        "--out",
        out_path.to_str().unwrap(),
        file.path().to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let doc: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(doc["charts"]["bpm"]["values"].as_array().unwrap().len(), 8);
    assert!(doc["results"]["comparison"].is_object());

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written, doc["charts"]);
}

#[test]
fn chart_of_empty_series_fails() {
    let file = temp_file("[]", ".json");
    let output = spawn_command(&["--quiet", "chart", file.path().to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no samples"));
}
