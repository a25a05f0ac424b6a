//! Phase execution.
//!
//! Runs all tasks of one phase under the phase's concurrency policy:
//! strictly sequential, or chunked into fixed-size groups that run fully in
//! parallel with a barrier between groups. Task failures are always
//! converted to failed `TaskResult`s at the single-task boundary so sibling
//! tasks are unaffected; retry (where configured) happens here and is
//! invisible to the orchestrator.

use crate::context::RunConfig;
use crate::errors::TaskError;
use crate::phase::{Concurrency, Phase, TaskSource};
use crate::resources::ResourceManager;
use crate::runner::ProcessRunner;
use crate::systask::SystemTaskRunner;
use crate::task::{PhaseResult, Task, TaskKind, TaskResult};
use crate::ui::StatusUi;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Dispatches one task to its execution backend.
///
/// The production implementation routes system operations to the shell and
/// test tasks to the Playwright runner; tests substitute stubs.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(&self, task: &Task) -> Result<(), TaskError>;
}

/// Production dispatcher: system tasks via `SystemTaskRunner`, test tasks
/// via one `npx playwright test` process per task.
pub struct ProcessDispatcher {
    config: RunConfig,
    system: SystemTaskRunner,
    runner: ProcessRunner,
}

impl ProcessDispatcher {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            config: config.clone(),
            system: SystemTaskRunner::new(&config.project_dir, config.verbose),
            runner: ProcessRunner::new(config.verbose),
        }
    }
}

#[async_trait]
impl TaskDispatcher for ProcessDispatcher {
    async fn dispatch(&self, task: &Task) -> Result<(), TaskError> {
        match &task.kind {
            TaskKind::System(op) => self.system.run(*op).await,
            TaskKind::Test { project, files } => {
                let env = project.runner_env(self.config.mode);
                let (program, args) = if files.is_empty() {
                    // No explicit file set: fall back to the package-level
                    // e2e script.
                    ("npm", vec!["run".to_string(), "test:e2e".to_string()])
                } else {
                    let mut args = vec!["playwright".to_string(), "test".to_string()];
                    args.extend(files.iter().map(|f| f.to_string_lossy().into_owned()));
                    args.push(format!("--workers={}", self.config.mode.workers()));
                    ("npx", args)
                };
                let result = self
                    .runner
                    .run(program, &args, &self.config.project_dir, &env, task.timeout)
                    .await?;
                if result.success() {
                    Ok(())
                } else {
                    Err(TaskError::Failed(result.failure_message()))
                }
            }
        }
    }
}

/// Runs one phase's tasks and aggregates the outcome.
pub struct PhaseExecutor {
    config: RunConfig,
    dispatcher: Arc<dyn TaskDispatcher>,
    ui: StatusUi,
}

impl PhaseExecutor {
    pub fn new(config: RunConfig, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            ui: StatusUi::silent(),
        }
    }

    pub fn with_ui(mut self, ui: StatusUi) -> Self {
        self.ui = ui;
        self
    }

    /// Resolve the phase's concurrency policy to a slot count.
    pub fn resolve_concurrency(&self, phase: &Phase, resources: &ResourceManager) -> usize {
        let slots = match phase.concurrency {
            Concurrency::Fixed(n) => n as usize,
            Concurrency::FromResources => phase
                .max_concurrency
                .min(resources.available())
                .min(self.config.max_parallel),
        };
        slots.max(1)
    }

    /// Execute all tasks of one phase and evaluate its success criteria.
    ///
    /// The returned `PhaseResult` is always terminal. Abandoned tasks
    /// (fail-fast) are reflected as a shorter result list, never as
    /// synthesized failures.
    pub async fn execute(
        &self,
        phase: &Phase,
        tasks: Vec<Task>,
        resources: &ResourceManager,
    ) -> PhaseResult {
        let start = Instant::now();

        if tasks.is_empty() {
            // A discovery phase with nothing to run is vacuously
            // successful; failing it under a percentage criteria would
            // punish an empty suite.
            if matches!(phase.source, TaskSource::Discovery) {
                info!(phase = %phase.id, "no tasks discovered, marking phase successful");
            }
            return PhaseResult::success(&phase.id, Vec::new(), start.elapsed());
        }

        let concurrency = self.resolve_concurrency(phase, resources);
        let sequential = concurrency <= 1 || phase.sequential_groups;
        debug!(
            phase = %phase.id,
            tasks = tasks.len(),
            concurrency,
            sequential,
            "executing phase"
        );

        let mut results: Vec<TaskResult> = Vec::with_capacity(tasks.len());
        if sequential {
            for task in &tasks {
                let result = self.run_task(phase, task).await;
                let failed = !result.is_success();
                results.push(result);
                if failed && self.config.fail_fast {
                    warn!(phase = %phase.id, "fail-fast: abandoning remaining tasks");
                    break;
                }
            }
        } else {
            for group in tasks.chunks(concurrency) {
                // The whole group runs in parallel; nothing new is
                // dispatched until every member has completed.
                let group_results =
                    futures::future::join_all(group.iter().map(|t| self.run_task(phase, t)))
                        .await;
                let any_failed = group_results.iter().any(|r| !r.is_success());
                results.extend(group_results);
                if any_failed && self.config.fail_fast {
                    warn!(phase = %phase.id, "fail-fast: abandoning remaining groups");
                    break;
                }
            }
        }

        let duration = start.elapsed();
        if phase.success_criteria.evaluate(&results) {
            PhaseResult::success(&phase.id, results, duration)
        } else {
            let rate = crate::criteria::pass_rate(&results);
            let error = format!(
                "success criteria {:?} not met ({:.1}% pass rate)",
                phase.success_criteria, rate
            );
            PhaseResult::failure(&phase.id, results, duration, &error)
        }
    }

    /// Run one task, applying the phase's retry policy, and convert the
    /// outcome to a `TaskResult`. Errors never escape this boundary.
    async fn run_task(&self, phase: &Phase, task: &Task) -> TaskResult {
        let started_at = Utc::now();
        let timer = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match self.dispatcher.dispatch(task).await {
                Ok(()) => {
                    debug!(task = %task.id, attempt, "task succeeded");
                    let result = TaskResult::success(task, started_at, timer.elapsed());
                    self.ui.task_finished(&result);
                    return result;
                }
                Err(err) => {
                    if let Some(retry) = phase.retry
                        && attempt < retry.max_retries
                    {
                        attempt += 1;
                        let delay = retry.delay(attempt);
                        warn!(
                            task = %task.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "task failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    warn!(task = %task.id, error = %err, "task failed");
                    let result =
                        TaskResult::failure(task, started_at, timer.elapsed(), &err.to_string());
                    self.ui.task_finished(&result);
                    return result;
                }
            }
        }
    }
}
