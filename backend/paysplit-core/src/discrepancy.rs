// src/discrepancy.rs
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::directory::DirectoryIndex;
use crate::error::AppError;
use crate::model::{Assignment, ProjectId};
use crate::period::Period;

/// Distinct project ids used in `assignments` that have no directory entry at all.
///
/// Emails filled in later by manager name do not count. Sorted and deduplicated.
pub fn missing_projects(assignments: &[Assignment], directory: &DirectoryIndex) -> Vec<ProjectId> {
    assignments
        .iter()
        .map(|a| a.project_id.as_str())
        .filter(|p| !directory.contains(p))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn report_path(report_dir: &Path, period: Period) -> PathBuf {
    report_dir.join(format!("missing_projects_{period}.log"))
}

fn write_lines(path: &Path, period: Period, missing: &[ProjectId]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "Missing project IDs for {period} (not found in directory):")?;
    for project_id in missing {
        writeln!(file, "{project_id}")?;
    }
    Ok(())
}

/// Writes the list for operator review, replacing any earlier file for the period.
pub fn write_report(report_dir: &Path, period: Period, missing: &[ProjectId]) -> Result<PathBuf, AppError> {
    let path = report_path(report_dir, period);
    fs::create_dir_all(report_dir)
        .and_then(|_| write_lines(&path, period, missing))
        .map_err(|source| AppError::ReportWrite { period, source })?;
    info!(
        "Wrote {} missing project id(s) for {} to {}",
        missing.len(),
        period,
        path.display()
    );
    Ok(path)
}
