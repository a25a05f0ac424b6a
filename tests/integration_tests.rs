//! Integration tests for the phaserun CLI.
//!
//! These exercise the binary surface: flag parsing, phase-plan listing and
//! loading, and report emission. No real test suites or npm scripts are
//! invoked; runs that would dispatch processes are covered by unit tests
//! with stub dispatchers.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a phaserun Command
fn phaserun() -> Command {
    cargo_bin_cmd!("phaserun")
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        phaserun()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--fail-fast"))
            .stdout(predicate::str::contains("--phases-file"));
    }

    #[test]
    fn test_version() {
        phaserun().arg("--version").assert().success();
    }

    #[test]
    fn test_conflicting_mode_flags_rejected() {
        phaserun()
            .args(["--fast", "--serial"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be used with"));
    }

    #[test]
    fn test_unknown_project_rejected() {
        let dir = create_temp_project();
        phaserun()
            .current_dir(dir.path())
            .args(["--projects", "mobile"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown project 'mobile'"));
    }
}

mod phase_plan {
    use super::*;

    #[test]
    fn test_list_prints_default_plan() {
        phaserun()
            .arg("--list")
            .assert()
            .success()
            .stdout(predicate::str::contains("prep"))
            .stdout(predicate::str::contains("foundation"))
            .stdout(predicate::str::contains("cleanup"));
    }

    #[test]
    fn test_list_with_custom_phases_file() {
        let dir = create_temp_project();
        let path = dir.path().join("phases.json");
        fs::write(
            &path,
            r#"{
                "generated_at": "2026-08-31T12:00:00Z",
                "phases": [
                    {
                        "id": "smoke",
                        "name": "Smoke tests",
                        "order": 1,
                        "source": "discovery"
                    }
                ]
            }"#,
        )
        .unwrap();

        phaserun()
            .arg("--list")
            .arg("--phases-file")
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("smoke"))
            .stdout(predicate::str::contains("Smoke tests"));
    }

    #[test]
    fn test_missing_phases_file_fails() {
        phaserun()
            .args(["--list", "--phases-file", "/nonexistent/phases.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read phases file"));
    }

    #[test]
    fn test_invalid_phases_file_fails() {
        let dir = create_temp_project();
        let path = dir.path().join("phases.json");
        fs::write(&path, "{ not json").unwrap();

        phaserun()
            .arg("--list")
            .arg("--phases-file")
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse phases JSON"));
    }

    #[test]
    fn test_invalid_dependency_in_phases_file_fails() {
        let dir = create_temp_project();
        let path = dir.path().join("phases.json");
        fs::write(
            &path,
            r#"{
                "generated_at": "2026-08-31T12:00:00Z",
                "phases": [
                    {
                        "id": "a",
                        "name": "A",
                        "order": 1,
                        "source": "discovery",
                        "depends_on": ["ghost"]
                    }
                ]
            }"#,
        )
        .unwrap();

        phaserun()
            .arg("--list")
            .arg("--phases-file")
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("ghost"));
    }
}

mod run_behavior {
    use super::*;

    /// A phase plan containing only discovery phases, so a run in an empty
    /// project directory dispatches no processes.
    fn discovery_only_plan(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("phases.json");
        fs::write(
            &path,
            r#"{
                "generated_at": "2026-08-31T12:00:00Z",
                "phases": [
                    {
                        "id": "smoke",
                        "name": "Smoke tests",
                        "order": 1,
                        "source": "discovery",
                        "success_criteria": "best_effort"
                    }
                ]
            }"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_failed_phase_still_exits_zero() {
        let dir = create_temp_project();
        let path = dir.path().join("phases.json");
        // install-dependencies fails fast in an empty directory (no
        // package-lock.json), failing the phase without any test suites.
        fs::write(
            &path,
            r#"{
                "generated_at": "2026-08-31T12:00:00Z",
                "phases": [
                    {
                        "id": "prep",
                        "name": "Prep",
                        "order": 1,
                        "source": { "system": ["install-dependencies"] },
                        "success_criteria": "all_tasks_pass"
                    }
                ]
            }"#,
        )
        .unwrap();

        phaserun()
            .current_dir(dir.path())
            .arg("--phases-file")
            .arg(&path)
            .args(["--report-dir", "out"])
            .assert()
            .success();

        let json = fs::read_to_string(dir.path().join("out/phased-report.json")).unwrap();
        assert!(json.contains("\"success\": false"));
        assert!(json.contains("\"failedPhases\": 1"));
    }

    #[test]
    fn test_empty_run_succeeds_and_writes_reports() {
        let dir = create_temp_project();
        let plan = discovery_only_plan(&dir);

        phaserun()
            .current_dir(dir.path())
            .arg("--phases-file")
            .arg(&plan)
            .args(["--report-dir", "out"])
            .assert()
            .success();

        let json = fs::read_to_string(dir.path().join("out/phased-report.json")).unwrap();
        assert!(json.contains("\"totalPhases\": 1"));
        assert!(json.contains("\"success\": true"));
        assert!(dir.path().join("out/phased-report.html").exists());
    }
}
