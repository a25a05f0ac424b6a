//! System-task operations.
//!
//! Maps each `SystemTask` variant to its concrete shell invocations via an
//! exhaustive match; the string-keyed "unknown task name" failure mode of
//! ad hoc dispatch tables cannot occur here. Best-effort teardown steps run
//! with `ignore_errors` so a half-stopped stack does not fail the cleanup
//! phase.

use crate::errors::TaskError;
use crate::runner::CommandRunner;
use crate::task::SystemTask;
use std::path::Path;
use tracing::info;

/// Executes the fixed set of setup/teardown operations for a run.
pub struct SystemTaskRunner {
    runner: CommandRunner,
}

impl SystemTaskRunner {
    pub fn new(project_dir: impl AsRef<Path>, verbose: bool) -> Self {
        Self {
            runner: CommandRunner::new(project_dir, verbose),
        }
    }

    /// Run one system operation to completion.
    pub async fn run(&self, op: SystemTask) -> Result<(), TaskError> {
        info!(op = op.id(), "running system task");
        let budget = op.timeout();
        match op {
            SystemTask::CheckEnvironment => {
                self.runner.run_shell("node --version", budget, false).await?;
                self.runner
                    .run_shell("npx playwright --version", budget, false)
                    .await?;
            }
            SystemTask::InstallDependencies => {
                self.runner.run_shell("npm ci", budget, false).await?;
            }
            SystemTask::ResetDatabase => {
                self.runner.run_shell("npm run db:reset", budget, false).await?;
            }
            SystemTask::StartServices => {
                self.runner
                    .run_shell("npm run services:start", budget, false)
                    .await?;
            }
            SystemTask::CleanupTestData => {
                self.runner
                    .run_shell("npm run test:cleanup", budget, true)
                    .await?;
            }
            SystemTask::StopServices => {
                self.runner
                    .run_shell("npm run services:stop", budget, true)
                    .await?;
            }
            SystemTask::GenerateFinalReport => {
                self.runner
                    .run_shell("npm run report:merge", budget, true)
                    .await?;
            }
        }
        Ok(())
    }
}
