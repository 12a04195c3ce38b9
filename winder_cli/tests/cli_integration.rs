use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;
use winder_core::mocks::{ProfilePlant, excitation_profile};

const HEADER: &str =
    "t,torque,omega,alpha,web_tension,radius,linear_velocity,thickness,v_upstream,v_downstream";

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[inertia]
dt = 0.01
min_samples = 100
max_samples = 500

[radius]
r0 = 0.05

[tension]
omega_min = 1.0
omega_max = 5.0
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

/// 200 cycles of the multi-phase excitation profile on a 0.15 kg·m² plant.
fn write_profile_trace(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("trace.csv");
    let mut f = fs::File::create(&path).unwrap();
    writeln!(f, "{HEADER}").unwrap();
    for (i, (tau, w, a, t, r)) in excitation_profile(200, 0.01, ProfilePlant::default())
        .into_iter()
        .enumerate()
    {
        let v = w * r * 60.0;
        writeln!(
            f,
            "{},{tau},{w},{a},{t},{r},{v},5e-5,0.0,0.0",
            i as f64 * 0.01
        )
        .unwrap();
    }
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check-config"], 0, "config OK", "stdout")]
#[case(&["replay"], 2, "required", "stderr")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("winder").unwrap();

    // Always include a valid config to avoid relying on defaults
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

#[test]
fn check_config_prints_effective_values() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("winder")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["inertia"]["min_samples"], 100);
    // untouched keys keep their defaults
    assert_eq!(v["tension"]["ema_alpha"], 0.15);
    assert_eq!(v["radius"]["r0"], 0.05);
}

#[rstest]
#[case("[inertia]\nforgetting_factor = 1.5\n", "forgetting_factor")]
#[case("[tension]\nomega_min = 5.0\nomega_max = 1.0\n", "omega_max")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation")]
fn check_config_rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();

    Command::cargo_bin("winder")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("winder")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("check-config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config file could not be read"));
}

#[test]
fn replay_summary_reports_identified_inertia() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let trace = write_profile_trace(&dir);

    let out = Command::cargo_bin("winder")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .arg("--summary")
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(v["cycles"], 200);
    assert!(v["identified_at"].is_number());
    let state = v["inertia"]["state"].as_str().unwrap();
    assert!(matches!(state, "confirmed" | "tracking"), "state {state}");
    let j = v["inertia"]["j_total"].as_f64().unwrap();
    assert!((j - 0.15).abs() / 0.15 < 0.05, "J = {j}");
    assert!(v["radius"]["radius"].as_f64().unwrap() >= 0.05);
}

#[test]
fn replay_emits_one_json_line_per_cycle() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let trace = write_profile_trace(&dir);

    let out = Command::cargo_bin("winder")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .output()
        .unwrap();
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 200);
    for line in lines {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        for key in ["t", "inertia", "radius", "tension"] {
            assert!(v.get(key).is_some(), "missing {key} in {line}");
        }
        let tension = v["tension"]["tension"].as_f64().unwrap();
        assert!((0.0..=2000.0).contains(&tension));
    }
}

#[test]
fn replay_pretty_output_without_config() {
    let dir = tempdir().unwrap();
    let trace = write_profile_trace(&dir);

    Command::cargo_bin("winder")
        .unwrap()
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .arg("--every")
        .arg("50")
        .assert()
        .success()
        .stdout(predicate::str::contains("t=   0.000s"))
        .stdout(predicate::str::contains("[collecting]"));
}

#[test]
fn cli_reports_bad_trace_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad_csv = dir.path().join("trace.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "t,torque,omega").unwrap();
    writeln!(f, "0.0,1.0,2.0").unwrap();

    Command::cargo_bin("winder")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(&bad_csv)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("winder")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(dir.path().join("missing.csv"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "Trace");
    assert!(v["message"].as_str().unwrap().contains("Could not open the trace file"));
}
