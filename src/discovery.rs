//! Spec-file discovery.
//!
//! Walks a project's test root for Playwright spec files. Discovery runs
//! fresh for each phase/project pair; results are sorted for deterministic
//! planning.

use crate::context::Project;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Discover `*.spec.ts` files under the project's test root.
///
/// A missing test root is not an error; it yields an empty list, the same
/// as a project with no specs.
pub fn discover_specs(project_dir: &Path, project: Project) -> Result<Vec<PathBuf>> {
    let root = project_dir.join(project.test_root());
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "test root does not exist");
        return Ok(Vec::new());
    }

    let pattern = format!("{}/**/*.spec.ts", root.display());
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Invalid discovery pattern: {pattern}"))?
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();
    Ok(files)
}
