//! Terminal status UI, rendered via `indicatif` progress bars.
//!
//! One run-level bar tracks completed phases; per-task and per-phase status
//! lines are printed through the `MultiProgress` so they interleave cleanly
//! with the bar. A `silent()` constructor produces a fully hidden UI for
//! tests and machine-driven runs.

use crate::orchestrator::ExecutionSummary;
use crate::phase::Phase;
use crate::task::{PhaseResult, TaskResult};
use console::{Emoji, style};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

/// Terminal UI for one orchestrator run.
#[derive(Clone)]
pub struct StatusUi {
    multi: MultiProgress,
    run_bar: ProgressBar,
    enabled: bool,
}

impl StatusUi {
    /// Create the UI with a run-level bar sized to the phase count.
    pub fn new(total_phases: u64) -> Self {
        let multi = MultiProgress::new();

        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let run_bar = multi.add(ProgressBar::new(total_phases));
        run_bar.set_style(style);
        run_bar.set_prefix("Phases");

        Self {
            multi,
            run_bar,
            enabled: true,
        }
    }

    /// A UI that renders nothing. Used by tests and non-interactive callers.
    pub fn silent() -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let run_bar = multi.add(ProgressBar::hidden());
        Self {
            multi,
            run_bar,
            enabled: false,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the
    /// rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Announce the phase about to execute on the run bar.
    pub fn phase_started(&self, phase: &Phase, task_count: usize) {
        self.run_bar.set_message(format!(
            "{}: {}",
            style(&phase.id).yellow(),
            phase.name
        ));
        self.print_line(format!(
            "{}{} ({} task{})",
            RUNNING,
            style(&phase.name).bold(),
            task_count,
            if task_count == 1 { "" } else { "s" }
        ));
    }

    /// Print one task's outcome as an indented status line.
    pub fn task_finished(&self, result: &TaskResult) {
        let line = if result.is_success() {
            format!(
                "    {}{} {}",
                CHECK,
                result.task_id,
                style(format!("({:.1}s)", result.duration.as_secs_f64())).dim()
            )
        } else {
            format!(
                "    {}{} {}",
                CROSS,
                result.task_id,
                style(result.error.as_deref().unwrap_or("failed")).red()
            )
        };
        self.print_line(line);
    }

    /// Print the phase outcome and advance the run bar.
    pub fn phase_finished(&self, result: &PhaseResult) {
        let icon = if result.is_success() { CHECK } else { CROSS };
        let verdict = if result.is_success() {
            style("passed").green()
        } else {
            style("failed").red()
        };
        self.print_line(format!(
            "{}{} {} ({}/{} tasks, {:.1}%, {:.1}s)",
            icon,
            style(&result.phase_id).bold(),
            verdict,
            result.metrics.passed,
            result.metrics.total,
            result.metrics.pass_rate,
            result.duration.as_secs_f64()
        ));
        self.run_bar.inc(1);
    }

    /// Finish the run bar and print the aggregate verdict.
    pub fn run_finished(&self, summary: &ExecutionSummary) {
        self.run_bar.finish_and_clear();
        let icon = if summary.success { SPARKLE } else { CROSS };
        self.print_line(format!(
            "{}{} phases, {} tasks, {:.1}% pass rate in {:.1}s",
            icon,
            summary.total_phases,
            summary.total_tasks,
            summary.pass_rate,
            summary.duration.as_secs_f64()
        ));
    }
}
