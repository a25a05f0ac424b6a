//! The run loop.
//!
//! The orchestrator owns one run end to end: it validates and orders the
//! phase plan, initializes the resource budget, iterates phases through the
//! dependency gate and the phase executor, and decides after each phase
//! whether the run keeps going. It never retries a phase; retries are a
//! phase-level policy applied inside the executor. Report writing and
//! resource cleanup always happen, even when the loop exits early.

use crate::context::{ExecutionContext, RunConfig};
use crate::discovery::discover_specs;
use crate::errors::OrchestratorError;
use crate::executor::{PhaseExecutor, ProcessDispatcher, TaskDispatcher};
use crate::gate::DependencyGate;
use crate::phase::{FailureAction, Phase, TaskSource, validate_phases};
use crate::planner::{plan_system_tasks, plan_test_tasks};
use crate::report;
use crate::resources::ResourceManager;
use crate::task::{PhaseResult, Task, duration_serde};
use crate::ui::StatusUi;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Aggregate outcome of one run, persisted by the report sink.
///
/// `total_phases` counts phases that actually produced a result; phases
/// skipped by an early exit are not represented.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub total_phases: usize,
    pub completed_phases: usize,
    pub failed_phases: usize,
    pub total_tasks: usize,
    pub passed_tasks: usize,
    pub failed_tasks: usize,
    /// Aggregate task pass rate across all recorded phases, in percent.
    pub pass_rate: f64,
    /// True when every recorded phase terminated successfully.
    pub success: bool,
    pub phases: Vec<PhaseResult>,
}

impl ExecutionSummary {
    fn from_context(ctx: ExecutionContext) -> Self {
        let finished_at = Utc::now();
        let duration = (finished_at - ctx.started_at)
            .to_std()
            .unwrap_or_default();
        let phases = ctx.phase_results;
        let completed_phases = phases.iter().filter(|p| p.is_success()).count();
        let total_tasks: usize = phases.iter().map(|p| p.metrics.total).sum();
        let passed_tasks: usize = phases.iter().map(|p| p.metrics.passed).sum();
        let pass_rate = if total_tasks == 0 {
            0.0
        } else {
            100.0 * passed_tasks as f64 / total_tasks as f64
        };
        Self {
            started_at: ctx.started_at,
            finished_at,
            duration,
            total_phases: phases.len(),
            completed_phases,
            failed_phases: phases.len() - completed_phases,
            total_tasks,
            passed_tasks,
            failed_tasks: total_tasks - passed_tasks,
            pass_rate,
            success: completed_phases == phases.len(),
            phases,
        }
    }
}

/// Drives one run through its phase plan.
pub struct Orchestrator {
    config: RunConfig,
    phases: Vec<Phase>,
    dispatcher: Arc<dyn TaskDispatcher>,
    ui: StatusUi,
}

impl Orchestrator {
    /// Build an orchestrator over a validated, order-sorted phase plan.
    pub fn new(config: RunConfig, mut phases: Vec<Phase>) -> Result<Self> {
        phases.sort_by_key(|p| p.order);
        validate_phases(&phases)?;
        let dispatcher = Arc::new(ProcessDispatcher::new(&config));
        let ui = StatusUi::new(phases.len() as u64);
        Ok(Self {
            config,
            phases,
            dispatcher,
            ui,
        })
    }

    /// Substitute the task dispatcher. Tests use this to avoid spawning
    /// real processes.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_ui(mut self, ui: StatusUi) -> Self {
        self.ui = ui;
        self
    }

    /// Execute the run. The summary is produced and persisted regardless of
    /// how the phase loop ends; resource cleanup runs before any report
    /// error is propagated.
    pub async fn run(&self) -> Result<ExecutionSummary, OrchestratorError> {
        let mut resources = ResourceManager::new(self.config.max_parallel);
        resources.init();
        let executor = PhaseExecutor::new(self.config.clone(), self.dispatcher.clone())
            .with_ui(self.ui.clone());
        let mut ctx = ExecutionContext::new();

        info!(
            phases = self.phases.len(),
            mode = ?self.config.mode,
            max_parallel = self.config.max_parallel,
            "starting run"
        );

        for phase in &self.phases {
            // A gate or discovery failure is the phase's own failure and
            // goes through the same failure-action handling as an executed
            // phase.
            let missing = DependencyGate::unmet(phase, ctx.results());
            let result = if !missing.is_empty() {
                let err = OrchestratorError::DependencyUnmet {
                    phase: phase.id.clone(),
                    missing: missing.join(", "),
                };
                warn!(phase = %phase.id, "{err}");
                PhaseResult::failure(&phase.id, Vec::new(), Duration::ZERO, &err.to_string())
            } else {
                match self.assemble_tasks(phase) {
                    Ok(tasks) => {
                        self.ui.phase_started(phase, tasks.len());
                        executor.execute(phase, tasks, &resources).await
                    }
                    Err(err) => {
                        warn!(phase = %phase.id, "{err}");
                        PhaseResult::failure(&phase.id, Vec::new(), Duration::ZERO, &err.to_string())
                    }
                }
            };
            self.ui.phase_finished(&result);

            let failed = !result.is_success();
            ctx.push(result);
            if failed {
                match phase.failure_action {
                    FailureAction::StopAll => {
                        error!(phase = %phase.id, "phase failed, stopping run");
                        break;
                    }
                    FailureAction::ContinueWithWarning => {
                        warn!(phase = %phase.id, "phase failed, continuing with remaining phases");
                    }
                    FailureAction::LogWarning | FailureAction::FailPhase => {
                        warn!(phase = %phase.id, "phase failed");
                    }
                }
                if self.config.fail_fast {
                    warn!("fail-fast: stopping run");
                    break;
                }
            }
        }

        // Finally-style tail: the summary is always produced and resources
        // always released, even when the loop exited early.
        let summary = ExecutionSummary::from_context(ctx);
        self.ui.run_finished(&summary);
        let report_outcome = report::write_reports(&summary, &self.config.report_dir);
        resources.cleanup();
        report_outcome?;
        Ok(summary)
    }

    /// Materialize a phase's task list from its source.
    fn assemble_tasks(&self, phase: &Phase) -> Result<Vec<Task>, OrchestratorError> {
        match &phase.source {
            TaskSource::System(_) => Ok(plan_system_tasks(phase)),
            TaskSource::Discovery => {
                let mut tasks = Vec::new();
                for project in &self.config.projects {
                    let discovered = discover_specs(&self.config.project_dir, *project)
                        .map_err(|source| OrchestratorError::Discovery {
                            phase: phase.id.clone(),
                            source,
                        })?;
                    tasks.extend(plan_test_tasks(phase, *project, &discovered));
                }
                Ok(tasks)
            }
        }
    }
}
