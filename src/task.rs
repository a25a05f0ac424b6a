//! Task descriptors and result types.
//!
//! A `Task` is one dispatchable unit of work: either a named system
//! operation (environment checks, service lifecycle) or the execution of a
//! set of test files against one project. Tasks are created fresh for each
//! run and carry no cross-run state; results are immutable once produced.

use crate::context::Project;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Task priority, echoed into results for criteria evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
}

/// The closed set of system operations the orchestrator can dispatch.
///
/// Keeping this a tagged enum (rather than string-keyed dispatch) makes the
/// executor's match exhaustive: an unknown operation cannot exist at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemTask {
    CheckEnvironment,
    InstallDependencies,
    ResetDatabase,
    StartServices,
    CleanupTestData,
    StopServices,
    GenerateFinalReport,
}

impl SystemTask {
    /// Stable identifier used in task ids and logs.
    pub fn id(&self) -> &'static str {
        match self {
            Self::CheckEnvironment => "check-environment",
            Self::InstallDependencies => "install-dependencies",
            Self::ResetDatabase => "reset-database",
            Self::StartServices => "start-services",
            Self::CleanupTestData => "cleanup-test-data",
            Self::StopServices => "stop-services",
            Self::GenerateFinalReport => "generate-final-report",
        }
    }

    /// Execution budget for this operation.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::CheckEnvironment => Duration::from_secs(30),
            Self::InstallDependencies => Duration::from_secs(600),
            Self::ResetDatabase => Duration::from_secs(120),
            Self::StartServices => Duration::from_secs(180),
            Self::CleanupTestData => Duration::from_secs(120),
            Self::StopServices => Duration::from_secs(60),
            Self::GenerateFinalReport => Duration::from_secs(120),
        }
    }
}

/// What a task actually does when dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    /// A named setup/teardown operation.
    System(SystemTask),
    /// Run a set of spec files against one project.
    Test { project: Project, files: Vec<PathBuf> },
}

/// One dispatchable unit of work. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique within the run, derived from phase id plus name or batch index.
    pub id: String,
    pub kind: TaskKind,
    pub priority: Priority,
    /// Estimated-duration budget, enforced as the execution timeout.
    pub timeout: Duration,
}

impl Task {
    /// Create a system task for a phase.
    pub fn system(phase_id: &str, op: SystemTask) -> Self {
        Self {
            id: format!("{}:{}", phase_id, op.id()),
            kind: TaskKind::System(op),
            priority: Priority::High,
            timeout: op.timeout(),
        }
    }

    /// Create a test task for one spec file.
    pub fn test_file(
        phase_id: &str,
        project: Project,
        file: PathBuf,
        priority: Priority,
        timeout: Duration,
    ) -> Self {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "spec".to_string());
        Self {
            id: format!("{}:{}:{}", phase_id, project.id(), stem),
            kind: TaskKind::Test {
                project,
                files: vec![file],
            },
            priority,
            timeout,
        }
    }

    /// Files carried by a test task; empty for system tasks.
    pub fn files(&self) -> &[PathBuf] {
        match &self.kind {
            TaskKind::Test { files, .. } => files,
            TaskKind::System(_) => &[],
        }
    }
}

/// Terminal status of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failed,
}

/// Outcome of one task. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration, serialized as milliseconds.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub priority: Priority,
}

impl TaskResult {
    pub fn success(task: &Task, started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            task_id: task.id.clone(),
            status: TaskStatus::Success,
            started_at,
            finished_at: started_at + chrono::Duration::from_std(duration).unwrap_or_default(),
            duration,
            error: None,
            priority: task.priority,
        }
    }

    pub fn failure(
        task: &Task,
        started_at: DateTime<Utc>,
        duration: Duration,
        error: &str,
    ) -> Self {
        Self {
            task_id: task.id.clone(),
            status: TaskStatus::Failed,
            started_at,
            finished_at: started_at + chrono::Duration::from_std(duration).unwrap_or_default(),
            duration,
            error: Some(error.to_string()),
            priority: task.priority,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

/// Status of a phase. `Running` is transient and never appears in a
/// `PhaseResult` returned by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Running,
    Success,
    Failed,
}

impl PhaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Aggregated metrics over a phase's task results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseMetrics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// `100 * passed / total`; 0 when the phase had no tasks.
    pub pass_rate: f64,
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    #[serde(with = "duration_serde")]
    pub avg_duration: Duration,
    #[serde(with = "duration_serde")]
    pub min_duration: Duration,
    #[serde(with = "duration_serde")]
    pub max_duration: Duration,
}

impl PhaseMetrics {
    /// Compute metrics over an unordered result set.
    pub fn compute(results: &[TaskResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let total = results.len();
        let passed = results.iter().filter(|r| r.is_success()).count();
        let total_duration: Duration = results.iter().map(|r| r.duration).sum();
        let min_duration = results
            .iter()
            .map(|r| r.duration)
            .min()
            .unwrap_or_default();
        let max_duration = results
            .iter()
            .map(|r| r.duration)
            .max()
            .unwrap_or_default();
        Self {
            total,
            passed,
            failed: total - passed,
            pass_rate: 100.0 * passed as f64 / total as f64,
            total_duration,
            avg_duration: total_duration / total as u32,
            min_duration,
            max_duration,
        }
    }
}

/// Outcome of one phase: terminal status, the ordered task results, and
/// aggregated metrics. Task lists are never mutated after the phase ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_id: String,
    pub status: PhaseStatus,
    pub tasks: Vec<TaskResult>,
    pub metrics: PhaseMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl PhaseResult {
    pub fn success(phase_id: &str, tasks: Vec<TaskResult>, duration: Duration) -> Self {
        let metrics = PhaseMetrics::compute(&tasks);
        Self {
            phase_id: phase_id.to_string(),
            status: PhaseStatus::Success,
            tasks,
            metrics,
            error: None,
            duration,
        }
    }

    pub fn failure(
        phase_id: &str,
        tasks: Vec<TaskResult>,
        duration: Duration,
        error: &str,
    ) -> Self {
        let metrics = PhaseMetrics::compute(&tasks);
        Self {
            phase_id: phase_id.to_string(),
            status: PhaseStatus::Failed,
            tasks,
            metrics,
            error: Some(error.to_string()),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PhaseStatus::Success
    }
}

/// Serde helpers for Duration serialization as milliseconds.
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
