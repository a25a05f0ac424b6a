//! Typed error hierarchy for the orchestrator.
//!
//! Two top-level enums cover the two failure boundaries:
//! - `TaskError` — failures of a single task's dispatch; always recovered
//!   locally into a failed `TaskResult` so sibling tasks are unaffected
//! - `OrchestratorError` — run-level failures that are allowed to alter
//!   control flow

use thiserror::Error;

/// Errors from spawning and supervising a single external process.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("I/O error while waiting for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Exited with code {code}: {message}")]
    NonZeroExit { code: i32, message: String },
}

/// Failure of one task's dispatch. Converted to a failed `TaskResult` at
/// the single-task boundary, never propagated past it.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("{0}")]
    Failed(String),
}

/// Run-level failures. These are the only errors that skip phases or fail
/// the process exit code.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Phase '{phase}' has unmet dependencies: {missing}")]
    DependencyUnmet { phase: String, missing: String },

    #[error("Test discovery failed for phase '{phase}': {source}")]
    Discovery {
        phase: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write report at {path}: {source}")]
    ReportWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_carries_budget() {
        let err = RunnerError::Timeout { timeout_ms: 90_000 };
        assert!(err.to_string().contains("90000"));
    }

    #[test]
    fn non_zero_exit_carries_code_and_message() {
        let err = RunnerError::NonZeroExit {
            code: 3,
            message: "2 tests failed".into(),
        };
        let text = err.to_string();
        assert!(text.contains('3'));
        assert!(text.contains("2 tests failed"));
    }

    #[test]
    fn task_error_converts_from_runner_error() {
        let inner = RunnerError::Timeout { timeout_ms: 10 };
        let task_err: TaskError = inner.into();
        assert!(matches!(task_err, TaskError::Runner(RunnerError::Timeout { .. })));
    }

    #[test]
    fn dependency_unmet_names_the_missing_phase() {
        let err = OrchestratorError::DependencyUnmet {
            phase: "business".into(),
            missing: "foundation".into(),
        };
        let text = err.to_string();
        assert!(text.contains("business"));
        assert!(text.contains("foundation"));
    }

    #[test]
    fn all_error_types_implement_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&RunnerError::Timeout { timeout_ms: 1 });
        assert_std_error(&TaskError::Failed("x".into()));
        assert_std_error(&OrchestratorError::DependencyUnmet {
            phase: "a".into(),
            missing: "b".into(),
        });
    }
}
