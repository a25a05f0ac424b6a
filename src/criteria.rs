//! Success-criteria evaluation.
//!
//! A pure function of a phase's (unordered) task-result set. Intra-group
//! completion order is unspecified and must not matter here.

use crate::task::{Priority, TaskResult};
use serde::{Deserialize, Serialize};

/// Rule for deciding whether a phase, given its task outcomes, counts as
/// passed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessCriteria {
    /// Every task must pass.
    AllTasksPass,
    /// Pass rate must reach the given percentage.
    PercentPass(u8),
    /// Every high-priority task must pass; medium failures are tolerated.
    AllCriticalPass,
    /// Always passes. Used by cleanup-style phases so their own failures
    /// never abort the run.
    BestEffort,
}

impl Default for SuccessCriteria {
    // Permissive default when a phase leaves its criteria unspecified.
    fn default() -> Self {
        Self::PercentPass(50)
    }
}

/// `100 * passed / total`, 0 when total is 0. An empty result set is not
/// vacuously passing here; empty-phase handling is the executor's call.
pub fn pass_rate(results: &[TaskResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.is_success()).count();
    100.0 * passed as f64 / results.len() as f64
}

impl SuccessCriteria {
    /// Evaluate this criteria against a task-result set.
    pub fn evaluate(&self, results: &[TaskResult]) -> bool {
        match self {
            Self::AllTasksPass => pass_rate(results) >= 100.0,
            Self::PercentPass(threshold) => pass_rate(results) >= f64::from(*threshold),
            Self::AllCriticalPass => results
                .iter()
                .filter(|r| r.priority == Priority::High)
                .all(|r| r.is_success()),
            Self::BestEffort => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::Utc;
    use std::time::Duration;

    fn result(ok: bool, priority: Priority) -> TaskResult {
        TaskResult {
            task_id: "t".into(),
            status: if ok { TaskStatus::Success } else { TaskStatus::Failed },
            started_at: Utc::now(),
            finished_at: Utc::now(),
            duration: Duration::from_secs(1),
            error: None,
            priority,
        }
    }

    fn mixed(passed: usize, failed: usize) -> Vec<TaskResult> {
        let mut v: Vec<TaskResult> =
            (0..passed).map(|_| result(true, Priority::Medium)).collect();
        v.extend((0..failed).map(|_| result(false, Priority::Medium)));
        v
    }

    #[test]
    fn all_tasks_pass() {
        assert!(SuccessCriteria::AllTasksPass.evaluate(&mixed(3, 0)));
        assert!(!SuccessCriteria::AllTasksPass.evaluate(&mixed(3, 1)));
    }

    #[test]
    fn percent_pass_thresholds() {
        // 3/4 = 75%: meets a 75% threshold, misses 80%.
        assert!(SuccessCriteria::PercentPass(75).evaluate(&mixed(3, 1)));
        assert!(!SuccessCriteria::PercentPass(80).evaluate(&mixed(3, 1)));
        // 2/4 = 50% fails a 75% threshold.
        assert!(!SuccessCriteria::PercentPass(75).evaluate(&mixed(2, 2)));
    }

    #[test]
    fn eighty_percent_with_four_of_five() {
        assert!(SuccessCriteria::PercentPass(80).evaluate(&mixed(4, 1)));
    }

    #[test]
    fn best_effort_always_true() {
        assert!(SuccessCriteria::BestEffort.evaluate(&[]));
        assert!(SuccessCriteria::BestEffort.evaluate(&mixed(0, 5)));
    }

    #[test]
    fn all_critical_ignores_medium_failures() {
        let results = vec![
            result(true, Priority::High),
            result(true, Priority::High),
            result(false, Priority::Medium),
        ];
        assert!(SuccessCriteria::AllCriticalPass.evaluate(&results));
    }

    #[test]
    fn all_critical_fails_on_high_failure() {
        let results = vec![result(false, Priority::High), result(true, Priority::Medium)];
        assert!(!SuccessCriteria::AllCriticalPass.evaluate(&results));
    }

    #[test]
    fn empty_set_has_zero_pass_rate() {
        assert_eq!(pass_rate(&[]), 0.0);
        assert!(!SuccessCriteria::PercentPass(50).evaluate(&[]));
        assert!(!SuccessCriteria::AllTasksPass.evaluate(&[]));
    }

    #[test]
    fn default_is_permissive_fifty() {
        assert_eq!(SuccessCriteria::default(), SuccessCriteria::PercentPass(50));
        assert!(SuccessCriteria::default().evaluate(&mixed(2, 2)));
        assert!(!SuccessCriteria::default().evaluate(&mixed(1, 3)));
    }
}
