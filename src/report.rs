//! Report persistence.
//!
//! Writes the final `ExecutionSummary` under the report directory as two
//! write-once artifacts: `phased-report.json` (machine-readable) and
//! `phased-report.html` (a self-contained summary table). Called exactly
//! once, after the phase loop has ended.

use crate::errors::OrchestratorError;
use crate::orchestrator::ExecutionSummary;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

pub const JSON_REPORT: &str = "phased-report.json";
pub const HTML_REPORT: &str = "phased-report.html";

/// Persist both report artifacts. The directory is created if needed.
pub fn write_reports(summary: &ExecutionSummary, dir: &Path) -> Result<(), OrchestratorError> {
    fs::create_dir_all(dir).map_err(|source| OrchestratorError::ReportWrite {
        path: dir.to_path_buf(),
        source,
    })?;

    let json_path = dir.join(JSON_REPORT);
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| OrchestratorError::Other(e.into()))?;
    fs::write(&json_path, json).map_err(|source| OrchestratorError::ReportWrite {
        path: json_path.clone(),
        source,
    })?;

    let html_path = dir.join(HTML_REPORT);
    fs::write(&html_path, render_html(summary)).map_err(|source| {
        OrchestratorError::ReportWrite {
            path: html_path.clone(),
            source,
        }
    })?;

    info!(dir = %dir.display(), "reports written");
    Ok(())
}

/// Render the summary as a self-contained HTML page with one row per phase.
fn render_html(summary: &ExecutionSummary) -> String {
    let verdict = if summary.success { "PASSED" } else { "FAILED" };
    let verdict_class = if summary.success { "pass" } else { "fail" };

    let mut rows = String::new();
    for phase in &summary.phases {
        let status = if phase.is_success() { "pass" } else { "fail" };
        let error = phase
            .error
            .as_deref()
            .map(escape)
            .unwrap_or_default();
        let _ = write!(
            rows,
            "<tr class=\"{status}\"><td>{}</td><td>{status}</td>\
             <td>{}/{}</td><td>{:.1}%</td><td>{:.1}s</td><td>{error}</td></tr>\n",
            escape(&phase.phase_id),
            phase.metrics.passed,
            phase.metrics.total,
            phase.metrics.pass_rate,
            phase.duration.as_secs_f64(),
        );
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Phased test report</title>\n<style>\n\
         body {{ font-family: sans-serif; margin: 2rem; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         th, td {{ border: 1px solid #ccc; padding: 0.4rem 0.8rem; text-align: left; }}\n\
         tr.pass td {{ background: #f0fff0; }}\n\
         tr.fail td {{ background: #fff0f0; }}\n\
         .pass {{ color: #060; }}\n\
         .fail {{ color: #900; }}\n\
         </style>\n</head>\n<body>\n\
         <h1>Phased test report <span class=\"{verdict_class}\">{verdict}</span></h1>\n\
         <p>{} phases ({} passed, {} failed), {} tasks, \
         {:.1}% pass rate, {:.1}s total. Started {}.</p>\n\
         <table>\n<tr><th>Phase</th><th>Status</th><th>Tasks</th>\
         <th>Pass rate</th><th>Duration</th><th>Error</th></tr>\n{rows}</table>\n\
         </body>\n</html>\n",
        summary.total_phases,
        summary.completed_phases,
        summary.failed_phases,
        summary.total_tasks,
        summary.pass_rate,
        summary.duration.as_secs_f64(),
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
