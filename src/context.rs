//! Run-level configuration and the per-run result accumulator.
//!
//! `RunConfig` is assembled once from the CLI and never mutated.
//! `ExecutionContext` is owned by the orchestrator for the duration of a
//! single run; phase results are only appended after a phase terminates.

use crate::task::PhaseResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How aggressively the run fans out to parallel workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One task at a time, everywhere. The safe default.
    #[default]
    Serial,
    /// Moderate parallelism for quick feedback loops.
    Balanced,
    /// Low parallelism with the full suite; trades speed for stability.
    Thorough,
}

impl RunMode {
    /// Default parallelism ceiling for this mode.
    pub fn default_max_parallel(&self) -> usize {
        match self {
            Self::Serial => 1,
            Self::Balanced => 4,
            Self::Thorough => 2,
        }
    }

    /// Playwright worker count passed to the test runner.
    pub fn workers(&self) -> usize {
        match self {
            Self::Serial => 1,
            Self::Balanced => 4,
            Self::Thorough => 2,
        }
    }
}

/// A test project targeted by the run.
///
/// Each project owns its base URL, dev-server port, and the directory its
/// spec files live under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Project {
    /// The admin console.
    Admin,
    /// The customer-facing front end.
    Front,
}

impl Project {
    /// Stable identifier used in task ids and CLI `--projects` values.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Front => "front",
        }
    }

    /// Dev-server port for this project.
    pub fn port(&self) -> u16 {
        match self {
            Self::Admin => 8080,
            Self::Front => 8081,
        }
    }

    /// Base URL handed to the test runner.
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port())
    }

    /// Directory (relative to the repo root) holding this project's specs.
    pub fn test_root(&self) -> &'static str {
        match self {
            Self::Admin => "tests/admin",
            Self::Front => "tests/front",
        }
    }

    /// Environment block injected into test-runner processes.
    pub fn runner_env(&self, mode: RunMode) -> Vec<(String, String)> {
        vec![
            ("PW_BASE_URL".into(), self.base_url()),
            ("PW_PORT".into(), self.port().to_string()),
            ("PW_WORKERS".into(), mode.workers().to_string()),
            ("CI".into(), "true".into()),
        ]
    }

    /// Parse a `--projects` value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "front" => Some(Self::Front),
            _ => None,
        }
    }

    /// All known projects, in run order.
    pub fn all() -> Vec<Self> {
        vec![Self::Admin, Self::Front]
    }
}

/// Immutable configuration for one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Projects whose tests are in scope.
    pub projects: Vec<Project>,
    /// Fan-out mode.
    pub mode: RunMode,
    /// Global parallelism ceiling; phase-level resolution never exceeds it.
    pub max_parallel: usize,
    /// Stop dispatching new work after the first failure.
    pub fail_fast: bool,
    /// Pass process output through instead of capturing it.
    pub verbose: bool,
    /// Repository root the suites and package scripts live in.
    pub project_dir: PathBuf,
    /// Where the final JSON/HTML report artifacts are written.
    pub report_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            projects: Project::all(),
            mode: RunMode::Serial,
            max_parallel: 1,
            fail_fast: false,
            verbose: false,
            project_dir: PathBuf::from("."),
            report_dir: PathBuf::from("test-results"),
        }
    }
}

impl RunConfig {
    /// Set the mode and its default parallelism ceiling in one step.
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self.max_parallel = mode.default_max_parallel();
        self
    }

    /// Override the parallelism ceiling.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    /// Enable or disable fail-fast.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Accumulator for one run: start time plus the ordered phase results.
///
/// Only the orchestrator appends to this, and only after a phase has fully
/// terminated. Dropped once the final report is produced.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Phase results in execution order.
    pub phase_results: Vec<PhaseResult>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            phase_results: Vec::new(),
        }
    }

    /// Record a terminated phase.
    pub fn push(&mut self, result: PhaseResult) {
        self.phase_results.push(result);
    }

    /// Results recorded so far, for dependency gating.
    pub fn results(&self) -> &[PhaseResult] {
        &self.phase_results
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
