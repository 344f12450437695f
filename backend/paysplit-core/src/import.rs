// src/import.rs
use serde::de::DeserializeOwned;
use std::fmt;
use std::io;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{AppError, RunWarning, SourceKind};
use crate::model::{RawAssignment, RawDirectoryEntry, RawPayroll, RawProfile};
use crate::normalizer::{
    normalize_assignments, normalize_directory, normalize_payroll, normalize_profiles, Normalized,
};
use crate::store::Store;

/// Upper-cases, trims, turns underscores into spaces and collapses runs of whitespace,
/// so `er_nic_sum`, ` ER NIC  SUM` and `ER_NIC_SUM` all read as `ER NIC SUM`.
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Reads every row of a CSV source into `T`, matching columns by normalized header.
pub fn read_rows<T: DeserializeOwned, R: io::Read>(reader: R) -> Result<Vec<T>, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: csv::StringRecord = rdr.headers()?.iter().map(normalize_header).collect();
    rdr.set_headers(headers);

    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AppError> {
    let file = std::fs::File::open(path)?;
    read_rows(io::BufReader::new(file))
}

// --- Import reports ---

#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub kind: SourceKind,
    pub rows_read: usize,
    pub records_stored: usize,
    pub warnings: Vec<RunWarning>,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} import: {} rows read, {} records stored, {} warning(s)",
            self.kind,
            self.rows_read,
            self.records_stored,
            self.warnings.len()
        )?;
        for warning in &self.warnings {
            write!(f, "\n  - {warning}")?;
        }
        Ok(())
    }
}

fn report<T>(kind: SourceKind, rows_read: usize, normalized: &Normalized<T>, records_stored: usize) -> ImportReport {
    let report = ImportReport {
        kind,
        rows_read,
        records_stored,
        warnings: normalized.warnings.clone(),
    };
    if report.warnings.is_empty() {
        info!("{}", report);
    } else {
        warn!(
            "{} import finished with {} warning(s)",
            kind,
            report.warnings.len()
        );
    }
    report
}

// --- Import entry points ---

/// Replaces the stored assignments of every period the file mentions.
pub fn import_assignments(store: &mut Store, path: &Path) -> Result<ImportReport, AppError> {
    let rows: Vec<RawAssignment> = read_csv(path)?;
    let normalized = normalize_assignments(&rows);
    let stored = store.replace_assignments(&normalized.records)?;
    Ok(report(SourceKind::Assignment, rows.len(), &normalized, stored))
}

/// Replaces the stored payroll of every period the file mentions.
pub fn import_payroll(store: &mut Store, path: &Path) -> Result<ImportReport, AppError> {
    let rows: Vec<RawPayroll> = read_csv(path)?;
    let normalized = normalize_payroll(&rows);
    let stored = store.replace_payroll(&normalized.records)?;
    Ok(report(SourceKind::Payroll, rows.len(), &normalized, stored))
}

/// Adds unseen projects to the directory. `records_stored` counts only new entries.
pub fn import_directory(store: &mut Store, path: &Path, rebuild: bool) -> Result<ImportReport, AppError> {
    let rows: Vec<RawDirectoryEntry> = read_csv(path)?;
    let normalized = normalize_directory(&rows);
    let added = store.load_directory(&normalized.records, rebuild)?;
    Ok(report(SourceKind::Directory, rows.len(), &normalized, added))
}

pub fn import_profiles(store: &mut Store, path: &Path) -> Result<ImportReport, AppError> {
    let rows: Vec<RawProfile> = read_csv(path)?;
    let normalized = normalize_profiles(&rows);
    let stored = store.append_profiles(&normalized.records)?;
    Ok(report(SourceKind::Profile, rows.len(), &normalized, stored))
}
