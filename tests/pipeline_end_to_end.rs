//! End-to-end runs against shell stand-ins for the stage programs.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use tempfile::TempDir;

fn relumen() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("relumen"))
}

/// Workspace with a `photos/` input directory and a config whose stage
/// commands create empty artifacts. Decomposition of `bad` exits 1.
struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new(inputs: &[&str], launch_mode: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let photos = temp.path().join("photos");
        fs::create_dir(&photos).unwrap();
        for name in inputs {
            fs::write(photos.join(name), b"img").unwrap();
        }

        let config_dir = temp.path().join(".relumen");
        fs::create_dir(&config_dir).unwrap();
        let config = format!(
            r#"
[run]
max_parallel = 2
launch_mode = "{launch_mode}"

[commands.decompose]
program = "sh"
args = ["-c", 'if [ "$2" = bad ]; then echo "no layers" >&2; exit 1; fi; touch "$1/$2-r.png" "$1/$2-s.png"', "decompose", "{{input_dir}}", "{{base}}"]
timeout_secs = 30

[commands.process]
program = "sh"
args = ["-c", 'test -f "$3" && test -f "$4" && touch "$1/$2-brightened.png" "$1/$2-enhanced.png" "$1/$2-reconstructed.png"', "process", "{{output_dir}}", "{{base}}", "{{reflectance}}", "{{shading}}"]
timeout_secs = 30
"#
        );
        fs::write(config_dir.join("config.toml"), config).unwrap();

        Self { temp }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    fn run(&self, extra: &[&str]) -> Command {
        let mut cmd = relumen();
        cmd.current_dir(self.root())
            .args(["run", "photos", "results", "intermediate"])
            .args(extra);
        cmd
    }
}

#[test]
fn test_successful_run_organizes_every_output() {
    let fixture = Fixture::new(&["a.png", "b.jpg", "c.png"], "in_process");

    fixture
        .run(&[])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 succeeded, 0 failed"));

    for base in ["a", "b", "c"] {
        assert!(fixture.path(&format!("intermediate/{base}-r.png")).is_file());
        assert!(fixture.path(&format!("intermediate/{base}-s.png")).is_file());
        assert!(!fixture.path(&format!("photos/{base}-r.png")).exists());
        for role in ["brightened", "enhanced", "reconstructed"] {
            assert!(
                fixture
                    .path(&format!("results/{role}/{base}-{role}.png"))
                    .is_file(),
                "missing {role} output for {base}"
            );
            assert!(!fixture.path(&format!("results/{base}-{role}.png")).exists());
        }
    }
}

#[test]
fn test_failed_job_is_reported_and_run_continues() {
    let fixture = Fixture::new(&["a.png", "bad.png", "c.png"], "in_process");

    fixture
        .run(&[])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("2 succeeded, 1 failed"))
        .stdout(predicate::str::contains("bad.png: Decomposition failed"));

    assert!(fixture.path("results/enhanced/a-enhanced.png").is_file());
    assert!(fixture.path("results/enhanced/c-enhanced.png").is_file());
    assert!(!fixture.path("results/enhanced/bad-enhanced.png").exists());
}

#[test]
fn test_json_summary_counts_failures_by_stage() {
    let fixture = Fixture::new(&["bad.png", "good.png"], "in_process");

    let output = fixture.run(&["--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["total_jobs"], 2);
    assert_eq!(summary["succeeded"], 1);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["failures_by_stage"]["decompose"], 1);
    assert_eq!(summary["failed_jobs"][0]["job"], "bad");
    assert_eq!(summary["failed_jobs"][0]["reason"]["kind"], "command_failed");
}

#[test]
fn test_subprocess_launch_mode_matches_in_process_results() {
    let fixture = Fixture::new(&["a.png", "bad.png", "c.png"], "subprocess");

    fixture
        .run(&[])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("2 succeeded, 1 failed"));

    assert!(fixture.path("results/brightened/a-brightened.png").is_file());
    assert!(fixture.path("results/reconstructed/c-reconstructed.png").is_file());
}

#[test]
fn test_launch_mode_flag_overrides_config_file() {
    let fixture = Fixture::new(&["a.png"], "in_process");

    let output = fixture
        .run(&["--launch-mode", "subprocess", "--dry-run", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["launch_mode"], "subprocess");
    assert_eq!(plan["max_parallel"], 2);
}

#[test]
fn test_empty_input_directory_succeeds() {
    let fixture = Fixture::new(&[], "in_process");

    fixture
        .run(&[])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 job(s)"));
    assert!(fixture.path("results/brightened").is_dir());
    assert!(fixture.path("intermediate").is_dir());
}

#[test]
fn test_unresolvable_stage_program_fails_preflight() {
    let fixture = Fixture::new(&["a.png"], "in_process");
    let config = fixture.path(".relumen/config.toml");
    let text = fs::read_to_string(&config)
        .unwrap()
        .replacen(r#"program = "sh""#, r#"program = "relumen-no-such-decomposer""#, 1);
    fs::write(&config, text).unwrap();

    fixture
        .run(&[])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("relumen-no-such-decomposer"));
    // No job was launched
    assert!(!fixture.path("results/brightened").exists());
    assert!(!fixture.path("intermediate/a-r.png").exists());
}

#[test]
fn test_worker_subcommand_prints_outcome_line() {
    let fixture = Fixture::new(&["a.png"], "in_process");
    fs::create_dir(fixture.path("results")).unwrap();
    fs::create_dir(fixture.path("intermediate")).unwrap();

    let output = relumen()
        .current_dir(fixture.root())
        .args(["worker", "photos/a.png", "results", "intermediate"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let line = stdout.lines().last().unwrap();
    let outcome: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(outcome["job"], "a");
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["stage"], "organize");
}
