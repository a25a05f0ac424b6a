//! External-process execution.
//!
//! `ProcessRunner` supervises exactly one spawned process: it captures
//! stdout/stderr (or passes them through in verbose mode), enforces a hard
//! wall-clock timeout, and sends a kill on expiry. It does not escalate
//! beyond that single signal; lingering process groups are the OS's
//! problem.
//!
//! `CommandRunner` is the lower-level shell runner used for setup and
//! teardown steps; its `ignore_errors` flag turns a non-zero exit into a
//! successful pass-through of the captured output.

use crate::errors::RunnerError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Captured outcome of one finished process.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Error description for a failed run: stderr if present, then stdout,
    /// then the bare exit code.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exit code {}", self.exit_code)
    }
}

/// Spawns one external command and supervises it to completion.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Pass child output through to the parent's streams instead of
    /// capturing it.
    verbose: bool,
}

impl ProcessRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run `program` with `args`, returning the captured result.
    ///
    /// Fails with `RunnerError::Spawn` when the process cannot start and
    /// `RunnerError::Timeout` when it outlives `budget`; a non-zero exit is
    /// reported in the `RunResult`, not as an error.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
        budget: Duration,
    ) -> Result<RunResult, RunnerError> {
        let command_line = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        debug!(command = %command_line, dir = %working_dir.display(), "spawning");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(working_dir)
            .envs(env.iter().cloned())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if self.verbose {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        // Drain pipes concurrently so a chatty child can't fill its buffers
        // and deadlock against our wait.
        let stdout_task = child.stdout.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });
        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });

        let status = match timeout(budget, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(RunnerError::Wait {
                    command: command_line,
                    source,
                });
            }
            Err(_) => {
                warn!(command = %command_line, budget_ms = budget.as_millis() as u64, "timed out, killing");
                child.start_kill().ok();
                return Err(RunnerError::Timeout {
                    timeout_ms: budget.as_millis() as u64,
                });
            }
        };

        let stdout = match stdout_task {
            Some(task) => String::from_utf8_lossy(&task.await.unwrap_or_default()).into_owned(),
            None => String::new(),
        };
        let stderr = match stderr_task {
            Some(task) => String::from_utf8_lossy(&task.await.unwrap_or_default()).into_owned(),
            None => String::new(),
        };

        Ok(RunResult {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

/// Shell runner for operational setup/teardown steps.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    runner: ProcessRunner,
    working_dir: PathBuf,
}

impl CommandRunner {
    pub fn new(working_dir: impl AsRef<Path>, verbose: bool) -> Self {
        Self {
            runner: ProcessRunner::new(verbose),
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    /// Run a shell command line.
    ///
    /// With `ignore_errors`, a non-zero exit is logged and passed through
    /// as a successful result; without it, the exit becomes
    /// `RunnerError::NonZeroExit`.
    pub async fn run_shell(
        &self,
        command: &str,
        budget: Duration,
        ignore_errors: bool,
    ) -> Result<RunResult, RunnerError> {
        let result = self
            .runner
            .run(
                "sh",
                &["-c".to_string(), command.to_string()],
                &self.working_dir,
                &[],
                budget,
            )
            .await?;

        if !result.success() {
            if ignore_errors {
                warn!(
                    command,
                    exit_code = result.exit_code,
                    "ignoring non-zero exit"
                );
                return Ok(result);
            }
            return Err(RunnerError::NonZeroExit {
                code: result.exit_code,
                message: result.failure_message(),
            });
        }
        Ok(result)
    }
}
