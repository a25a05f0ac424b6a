//! Phase definitions and JSON loading.
//!
//! This module provides:
//! - `Phase` — static configuration for one ordered stage of the run
//! - `PhasesFile` — the on-disk phases.json format
//! - `default_phases()` — the built-in five-phase pipeline used when no
//!   phases file is given
//!
//! Phases are defined once at startup and never mutated.

use crate::criteria::SuccessCriteria;
use crate::task::SystemTask;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Intra-phase concurrency policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    /// Use exactly this many parallel slots.
    Fixed(u32),
    /// Derive the slot count from the resource manager at execution time.
    FromResources,
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

/// What the orchestrator does when a phase fails its success criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    /// Halt the whole run; remaining phases are skipped, not marked failed.
    StopAll,
    /// Record the failure and keep going.
    #[default]
    FailPhase,
    /// Record the failure, warn loudly, keep going.
    ContinueWithWarning,
    /// Record the failure at warn level only.
    LogWarning,
}

/// Task-level retry strategy, applied inside the phase executor.
///
/// A failed task is redispatched up to `max_retries` times with a
/// multiplicatively increasing delay before being recorded as terminally
/// failed. Invisible to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub backoff_ms: u64,
    /// Factor applied to the delay after each attempt.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.backoff_ms as f64 * factor) as u64)
    }
}

/// Where a phase's tasks come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// A fixed, ordered list of system operations.
    System(Vec<SystemTask>),
    /// Discover spec files per project and filter them by the phase's
    /// categorization keywords.
    Discovery,
}

/// Static configuration for one phase. Defined once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Stable identifier (e.g. "foundation").
    pub id: String,
    /// Human-readable name shown in status lines.
    pub name: String,
    /// Execution order; strictly increasing across the phase set.
    pub order: u32,
    #[serde(default)]
    pub concurrency: Concurrency,
    /// Ceiling applied when concurrency is derived from resources.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    pub source: TaskSource,
    /// Phase identifiers that must have succeeded before this phase runs.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub success_criteria: SuccessCriteria,
    #[serde(default)]
    pub failure_action: FailureAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    /// When > 1, discovered files are merged into combined batch tasks of
    /// this size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Force strictly sequential execution regardless of the resolved
    /// concurrency.
    #[serde(default)]
    pub sequential_groups: bool,
    /// Per-spec-file duration estimate, used as the task timeout.
    #[serde(default = "default_task_secs")]
    pub estimated_task_secs: u64,
    /// Whether this phase's test tasks are considered critical
    /// (high priority).
    #[serde(default)]
    pub critical: bool,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_task_secs() -> u64 {
    120
}

impl Phase {
    /// Create a system phase with a fixed operation list.
    pub fn system(id: &str, name: &str, order: u32, ops: Vec<SystemTask>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            order,
            concurrency: Concurrency::Fixed(1),
            max_concurrency: default_max_concurrency(),
            source: TaskSource::System(ops),
            depends_on: Vec::new(),
            success_criteria: SuccessCriteria::AllTasksPass,
            failure_action: FailureAction::default(),
            retry: None,
            batch_size: None,
            sequential_groups: false,
            estimated_task_secs: default_task_secs(),
            critical: false,
        }
    }

    /// Create a test-discovery phase.
    pub fn discovery(id: &str, name: &str, order: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            order,
            concurrency: Concurrency::Fixed(1),
            max_concurrency: default_max_concurrency(),
            source: TaskSource::Discovery,
            depends_on: Vec::new(),
            success_criteria: SuccessCriteria::default(),
            failure_action: FailureAction::default(),
            retry: None,
            batch_size: None,
            sequential_groups: false,
            estimated_task_secs: default_task_secs(),
            critical: false,
        }
    }

    pub fn with_depends_on(mut self, deps: Vec<&str>) -> Self {
        self.depends_on = deps.into_iter().map(String::from).collect();
        self
    }

    pub fn with_criteria(mut self, criteria: SuccessCriteria) -> Self {
        self.success_criteria = criteria;
        self
    }

    pub fn with_failure_action(mut self, action: FailureAction) -> Self {
        self.failure_action = action;
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Per-task execution budget.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.estimated_task_secs)
    }
}

/// The on-disk phases.json format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasesFile {
    /// Timestamp the phase plan was written.
    pub generated_at: String,
    pub phases: Vec<Phase>,
}

impl PhasesFile {
    /// Load a phase plan from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read phases file: {}", path.display()))?;
        let file: PhasesFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse phases JSON: {}", path.display()))?;
        Ok(file)
    }

    /// Save the phase plan to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize phases to JSON")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write phases file: {}", path.display()))?;
        Ok(())
    }
}

/// Validate a phase plan: orders strictly increasing, ids unique, and every
/// dependency naming a phase that runs earlier.
pub fn validate_phases(phases: &[Phase]) -> Result<()> {
    let mut last_order: Option<u32> = None;
    for phase in phases {
        if let Some(prev) = last_order
            && phase.order <= prev
        {
            bail!(
                "Phase '{}' has order {} which does not increase on the previous phase",
                phase.id,
                phase.order
            );
        }
        last_order = Some(phase.order);
    }
    for (i, phase) in phases.iter().enumerate() {
        if phases.iter().skip(i + 1).any(|p| p.id == phase.id) {
            bail!("Duplicate phase id '{}'", phase.id);
        }
        for dep in &phase.depends_on {
            let Some(target) = phases.iter().find(|p| &p.id == dep) else {
                bail!("Phase '{}' depends on unknown phase '{}'", phase.id, dep);
            };
            if target.order >= phase.order {
                bail!(
                    "Phase '{}' depends on '{}' which does not run before it",
                    phase.id,
                    dep
                );
            }
        }
    }
    Ok(())
}

/// The built-in phase plan: environment prep, foundation specs, business
/// specs, cross-feature integration, and best-effort cleanup.
pub fn default_phases() -> Vec<Phase> {
    vec![
        Phase::system(
            "prep",
            "Environment preparation",
            1,
            vec![
                SystemTask::CheckEnvironment,
                SystemTask::InstallDependencies,
                SystemTask::ResetDatabase,
                SystemTask::StartServices,
            ],
        )
        .with_failure_action(FailureAction::StopAll),
        Phase::discovery("foundation", "Foundation tests", 2)
            .with_depends_on(vec!["prep"])
            .with_criteria(SuccessCriteria::PercentPass(80))
            .with_critical(true),
        Phase::discovery("business", "Business feature tests", 3)
            .with_depends_on(vec!["foundation"])
            .with_criteria(SuccessCriteria::PercentPass(75))
            .with_batch_size(3),
        Phase::discovery("integration", "Integration flows", 4)
            .with_depends_on(vec!["business"])
            .with_concurrency(Concurrency::Fixed(2))
            .with_criteria(SuccessCriteria::AllCriticalPass)
            .with_critical(true)
            .with_retry(RetryPolicy {
                max_retries: 1,
                backoff_ms: 2000,
                multiplier: 2.0,
            }),
        Phase::system(
            "cleanup",
            "Cleanup and reporting",
            5,
            vec![
                SystemTask::CleanupTestData,
                SystemTask::StopServices,
                SystemTask::GenerateFinalReport,
            ],
        )
        .with_criteria(SuccessCriteria::BestEffort)
        .with_failure_action(FailureAction::LogWarning),
    ]
}

/// Load a phase plan from a file if given, otherwise use the built-in plan.
/// The plan is validated either way.
pub fn load_phases_or_default(path: Option<&Path>) -> Result<Vec<Phase>> {
    let phases = match path {
        Some(p) => PhasesFile::load(p)?.phases,
        None => default_phases(),
    };
    validate_phases(&phases)?;
    Ok(phases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn default_plan_is_valid() {
        let phases = default_phases();
        assert_eq!(phases.len(), 5);
        validate_phases(&phases).unwrap();
        assert_eq!(phases[0].id, "prep");
        assert_eq!(phases[4].id, "cleanup");
    }

    #[test]
    fn default_plan_dependency_chain() {
        let phases = default_phases();
        let business = phases.iter().find(|p| p.id == "business").unwrap();
        assert_eq!(business.depends_on, vec!["foundation"]);
        let integration = phases.iter().find(|p| p.id == "integration").unwrap();
        assert_eq!(integration.concurrency, Concurrency::Fixed(2));
        assert_eq!(
            integration.success_criteria,
            SuccessCriteria::AllCriticalPass
        );
    }

    #[test]
    fn validate_rejects_non_increasing_order() {
        let mut phases = vec![
            Phase::discovery("a", "A", 2),
            Phase::discovery("b", "B", 2),
        ];
        assert!(validate_phases(&phases).is_err());
        phases[1].order = 1;
        assert!(validate_phases(&phases).is_err());
    }

    #[test]
    fn validate_rejects_unknown_dependency() {
        let phases = vec![Phase::discovery("a", "A", 1).with_depends_on(vec!["ghost"])];
        let err = validate_phases(&phases).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn validate_rejects_forward_dependency() {
        let phases = vec![
            Phase::discovery("a", "A", 1).with_depends_on(vec!["b"]),
            Phase::discovery("b", "B", 2),
        ];
        assert!(validate_phases(&phases).is_err());
    }

    #[test]
    fn retry_delay_grows_multiplicatively() {
        let retry = RetryPolicy {
            max_retries: 3,
            backoff_ms: 100,
            multiplier: 2.0,
        };
        assert_eq!(retry.delay(1), Duration::from_millis(100));
        assert_eq!(retry.delay(2), Duration::from_millis(200));
        assert_eq!(retry.delay(3), Duration::from_millis(400));
    }

    #[test]
    fn phases_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phases.json");

        let file = PhasesFile {
            generated_at: "2026-08-31T12:00:00Z".to_string(),
            phases: default_phases(),
        };
        file.save(&path).unwrap();

        let loaded = PhasesFile::load(&path).unwrap();
        assert_eq!(loaded.phases, default_phases());
    }

    #[test]
    fn phases_file_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phases.json");
        fs::write(&path, "{ not json").unwrap();

        let err = PhasesFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse phases JSON"));
    }

    #[test]
    fn load_phases_falls_back_to_default() {
        let phases = load_phases_or_default(None).unwrap();
        assert_eq!(phases.len(), 5);
    }

    #[test]
    fn phase_json_concurrency_variants() {
        let phase = Phase::discovery("integ", "Integration", 4)
            .with_concurrency(Concurrency::FromResources);
        let json = serde_json::to_string(&phase).unwrap();
        assert!(json.contains("from_resources"));

        let parsed: Phase = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.concurrency, Concurrency::FromResources);
    }
}
