//! Batch planning: categorize discovered spec files per phase and shape
//! them into dispatchable tasks.
//!
//! System phases pass their fixed operation list through unchanged. Test
//! phases filter the discovered files by phase keywords and, when a batch
//! size is configured, merge runs of files into combined tasks. Batch
//! boundaries never split a single file's task.

use crate::context::Project;
use crate::phase::{Phase, TaskSource};
use crate::task::{Priority, Task, TaskKind};
use std::path::PathBuf;

/// Keyword table used to assign spec files to phases. An unknown phase id
/// matches everything.
fn phase_keywords(phase_id: &str) -> Option<&'static [&'static str]> {
    match phase_id {
        "foundation" => Some(&["auth", "login", "pages", "crud", "navigation"]),
        "business" => Some(&["booking", "payment", "profile", "member", "course", "order"]),
        "integration" => Some(&["integration", "flow", "complete", "end-to-end"]),
        _ => None,
    }
}

/// Filter discovered files down to the ones this phase covers.
pub fn categorize(phase_id: &str, files: &[PathBuf]) -> Vec<PathBuf> {
    let Some(keywords) = phase_keywords(phase_id) else {
        return files.to_vec();
    };
    files
        .iter()
        .filter(|file| {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            keywords.iter().any(|kw| name.contains(kw))
        })
        .cloned()
        .collect()
}

/// Merge a batch of single-file tasks into one combined task: concatenated
/// file list, summed duration budget, priority escalated to High if any
/// constituent is High.
pub fn merge_batch(phase_id: &str, project: Project, index: usize, batch: &[Task]) -> Task {
    let files: Vec<PathBuf> = batch.iter().flat_map(|t| t.files().to_vec()).collect();
    let timeout = batch.iter().map(|t| t.timeout).sum();
    let priority = if batch.iter().any(|t| t.priority == Priority::High) {
        Priority::High
    } else {
        Priority::Medium
    };
    Task {
        id: format!("{}:{}:batch-{}", phase_id, project.id(), index),
        kind: TaskKind::Test { project, files },
        priority,
        timeout,
    }
}

/// Build the task list for a test phase from this project's discovered
/// files: categorize, then batch when `batch_size > 1`.
pub fn plan_test_tasks(phase: &Phase, project: Project, discovered: &[PathBuf]) -> Vec<Task> {
    let files = categorize(&phase.id, discovered);
    if files.is_empty() {
        tracing::info!(
            phase = %phase.id,
            project = project.id(),
            "no matching spec files discovered"
        );
        return Vec::new();
    }

    let priority = if phase.critical {
        Priority::High
    } else {
        Priority::Medium
    };
    let per_file: Vec<Task> = files
        .into_iter()
        .map(|file| Task::test_file(&phase.id, project, file, priority, phase.task_timeout()))
        .collect();

    match phase.batch_size {
        Some(size) if size > 1 => per_file
            .chunks(size)
            .enumerate()
            .map(|(i, batch)| merge_batch(&phase.id, project, i, batch))
            .collect(),
        _ => per_file,
    }
}

/// Build the task list for a system phase: the fixed operation list passes
/// through unchanged, one task per operation.
pub fn plan_system_tasks(phase: &Phase) -> Vec<Task> {
    match &phase.source {
        TaskSource::System(ops) => ops.iter().map(|op| Task::system(&phase.id, *op)).collect(),
        TaskSource::Discovery => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn specs(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn categorize_foundation_keywords() {
        let files = specs(&[
            "auth/login.spec.ts",
            "booking/book-course.spec.ts",
            "pages/crud-products.spec.ts",
            "misc/smoke.spec.ts",
        ]);
        let picked = categorize("foundation", &files);
        let names: Vec<_> = picked
            .iter()
            .map(|f| f.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["auth/login.spec.ts", "pages/crud-products.spec.ts"]
        );
    }

    #[test]
    fn categorize_unknown_phase_matches_all() {
        let files = specs(&["a.spec.ts", "b.spec.ts"]);
        assert_eq!(categorize("smoke", &files).len(), 2);
    }

    #[test]
    fn batching_is_exhaustive_and_exclusive() {
        // ceil(n/k) groups whose concatenated file lists reconstruct the
        // input exactly once.
        let phase = Phase::discovery("smoke", "Smoke", 1).with_batch_size(3);
        let files: Vec<PathBuf> = (0..7).map(|i| PathBuf::from(format!("t{i}.spec.ts"))).collect();

        let tasks = plan_test_tasks(&phase, Project::Admin, &files);
        assert_eq!(tasks.len(), 3); // ceil(7/3)

        let rebuilt: Vec<PathBuf> = tasks.iter().flat_map(|t| t.files().to_vec()).collect();
        assert_eq!(rebuilt, files);
    }

    #[test]
    fn batch_size_one_yields_per_file_tasks() {
        let phase = Phase::discovery("smoke", "Smoke", 1).with_batch_size(1);
        let files = specs(&["a.spec.ts", "b.spec.ts"]);
        let tasks = plan_test_tasks(&phase, Project::Front, &files);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].files().len(), 1);
    }

    #[test]
    fn merged_batch_sums_budget_and_escalates_priority() {
        let low = Task::test_file(
            "p",
            Project::Admin,
            PathBuf::from("a.spec.ts"),
            Priority::Medium,
            Duration::from_secs(60),
        );
        let high = Task::test_file(
            "p",
            Project::Admin,
            PathBuf::from("b.spec.ts"),
            Priority::High,
            Duration::from_secs(90),
        );
        let merged = merge_batch("p", Project::Admin, 0, &[low, high]);
        assert_eq!(merged.priority, Priority::High);
        assert_eq!(merged.timeout, Duration::from_secs(150));
        assert_eq!(merged.files().len(), 2);
        assert_eq!(merged.id, "p:admin:batch-0");
    }

    #[test]
    fn empty_category_yields_empty_task_list() {
        let phase = Phase::discovery("foundation", "Foundation", 2);
        let files = specs(&["booking/book.spec.ts"]);
        assert!(plan_test_tasks(&phase, Project::Admin, &files).is_empty());
    }

    #[test]
    fn system_phase_passes_through_one_task_per_op() {
        let phases = crate::phase::default_phases();
        let prep = &phases[0];
        let tasks = plan_system_tasks(prep);
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].id, "prep:check-environment");
    }
}
