// src/normalizer.rs
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{NormalizeError, RunWarning, SourceKind};
use crate::model::*;
use crate::period::Period;

/// Output of a normalization pass: the records that survived plus everything that was dropped or merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub warnings: Vec<RunWarning>,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

// --- Key normalization ---

/// Trimmed, `None` when blank.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn normalize_employee_id(raw: Option<&str>) -> Option<EmployeeId> {
    clean_text(raw)
}

/// Trims, and strips leading zeros from all-digit ids. `"000"` becomes `"0"`, not empty.
pub fn normalize_project_id(raw: &str) -> ProjectId {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = trimmed.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        trimmed.to_string()
    }
}

pub fn normalize_optional_project_id(raw: Option<&str>) -> Option<ProjectId> {
    clean_text(raw).map(|p| normalize_project_id(&p))
}

/// Case-insensitive manager name key used by the email backfill.
pub fn normalize_manager_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parses a spreadsheet number. Blank is `None`; thousands separators are tolerated.
pub fn parse_decimal(field: &'static str, raw: Option<&str>) -> Result<Option<Decimal>, NormalizeError> {
    let Some(value) = clean_text(raw) else {
        return Ok(None);
    };
    let compact: String = value.chars().filter(|c| *c != ',' && *c != ' ').collect();
    Decimal::from_str(&compact)
        .or_else(|_| Decimal::from_scientific(&compact))
        .map(|d| Some(d.normalize()))
        .map_err(|_| NormalizeError::InvalidNumber { field, raw: value })
}

fn parse_period(raw: Option<&str>) -> Result<Period, NormalizeError> {
    let value = clean_text(raw).ok_or(NormalizeError::MissingPeriod)?;
    Period::parse(&value).ok_or(NormalizeError::UnparseablePeriod { raw: value })
}

fn dropped(kind: SourceKind, row: usize, reason: NormalizeError) -> RunWarning {
    let warning = RunWarning::RecordDropped { kind, row, reason };
    warn!("{}", warning);
    warning
}

// --- Assignments ---

fn normalize_assignment(raw: &RawAssignment) -> Result<Assignment, NormalizeError> {
    let employee_id =
        normalize_employee_id(raw.employee_id.as_deref()).ok_or(NormalizeError::MissingEmployeeId)?;
    let period = parse_period(raw.period.as_deref())?;
    let project_id = normalize_optional_project_id(raw.project_id.as_deref())
        .ok_or(NormalizeError::MissingProjectId)?;
    let hours = parse_decimal("hours", raw.hours.as_deref())?.unwrap_or(Decimal::ZERO);

    Ok(Assignment {
        employee_id,
        period,
        project_id,
        work_location: clean_text(raw.work_location.as_deref()),
        project_description: clean_text(raw.project_description.as_deref()),
        project_type: clean_text(raw.project_type.as_deref()),
        contract_type: clean_text(raw.contract_type.as_deref()),
        customer_name: clean_text(raw.customer_name.as_deref()),
        status: clean_text(raw.status.as_deref()),
        hours,
    })
}

fn merge_assignment(into: &mut Assignment, other: Assignment) {
    // A negative entry must survive the merge so the group is still rejected.
    into.hours = if into.hours.is_sign_negative() || other.hours.is_sign_negative() {
        into.hours.min(other.hours)
    } else {
        into.hours + other.hours
    };
    into.work_location = into.work_location.take().or(other.work_location);
    into.project_description = into.project_description.take().or(other.project_description);
    into.project_type = into.project_type.take().or(other.project_type);
    into.contract_type = into.contract_type.take().or(other.contract_type);
    into.customer_name = into.customer_name.take().or(other.customer_name);
    into.status = into.status.take().or(other.status);
}

/// Normalizes assignment rows, merging rows that share (employee, period, project):
/// hours are summed and descriptive fields keep the first non-empty value.
pub fn normalize_assignments(rows: &[RawAssignment]) -> Normalized<Assignment> {
    let mut merged: BTreeMap<(EmployeeId, Period, ProjectId), Assignment> = BTreeMap::new();
    let mut out = Normalized::default();

    for (idx, raw) in rows.iter().enumerate() {
        match normalize_assignment(raw) {
            Ok(assignment) => {
                let key = (
                    assignment.employee_id.clone(),
                    assignment.period,
                    assignment.project_id.clone(),
                );
                match merged.get_mut(&key) {
                    Some(existing) => {
                        debug!(
                            "Merging duplicate assignment row {} into {}/{}/{}",
                            idx + 1,
                            key.0,
                            key.1,
                            key.2
                        );
                        merge_assignment(existing, assignment);
                    }
                    None => {
                        merged.insert(key, assignment);
                    }
                }
            }
            Err(reason) => out
                .warnings
                .push(dropped(SourceKind::Assignment, idx + 1, reason)),
        }
    }

    out.records = merged.into_values().collect();
    out
}

// --- Payroll ---

fn normalize_payroll_row(raw: &RawPayroll) -> Result<PayrollRecord, NormalizeError> {
    let employee_id =
        normalize_employee_id(raw.employee_id.as_deref()).ok_or(NormalizeError::MissingEmployeeId)?;
    let period = parse_period(raw.period.as_deref())?;
    let gross_amount = parse_decimal("gross amount", raw.gross_amount.as_deref())?
        .ok_or(NormalizeError::MissingGrossAmount)?;
    let employer_contribution =
        parse_decimal("employer contribution", raw.employer_contribution.as_deref())?;

    Ok(PayrollRecord {
        employee_id,
        period,
        gross_amount,
        employer_contribution,
    })
}

/// Normalizes payroll rows. A later row for the same (employee, period) wins, with a warning.
pub fn normalize_payroll(rows: &[RawPayroll]) -> Normalized<PayrollRecord> {
    let mut by_key: BTreeMap<(EmployeeId, Period), PayrollRecord> = BTreeMap::new();
    let mut out = Normalized::default();

    for (idx, raw) in rows.iter().enumerate() {
        match normalize_payroll_row(raw) {
            Ok(record) => {
                let key = (record.employee_id.clone(), record.period);
                if by_key.insert(key, record.clone()).is_some() {
                    let warning = RunWarning::DuplicatePayroll {
                        row: idx + 1,
                        employee_id: record.employee_id,
                        period: record.period,
                    };
                    warn!("{}", warning);
                    out.warnings.push(warning);
                }
            }
            Err(reason) => out.warnings.push(dropped(SourceKind::Payroll, idx + 1, reason)),
        }
    }

    out.records = by_key.into_values().collect();
    out
}

// --- Directory ---

/// Normalizes directory rows. Within a batch the first row for a project id wins,
/// matching the store's insert-if-absent contract.
pub fn normalize_directory(rows: &[RawDirectoryEntry]) -> Normalized<DirectoryEntry> {
    let mut seen = HashSet::new();
    let mut out = Normalized::default();

    for (idx, raw) in rows.iter().enumerate() {
        let Some(project_id) = normalize_optional_project_id(raw.project_id.as_deref()) else {
            out.warnings.push(dropped(
                SourceKind::Directory,
                idx + 1,
                NormalizeError::MissingProjectId,
            ));
            continue;
        };
        if !seen.insert(project_id.clone()) {
            debug!("Ignoring repeated directory row for project {}", project_id);
            continue;
        }
        out.records.push(DirectoryEntry {
            project_id,
            manager_name: clean_text(raw.manager_name.as_deref()),
            manager_email: clean_text(raw.manager_email.as_deref()),
        });
    }

    out
}

// --- Profiles ---

fn normalize_profile(raw: &RawProfile) -> Result<ProfileRecord, NormalizeError> {
    let employee_id =
        normalize_employee_id(raw.employee_id.as_deref()).ok_or(NormalizeError::MissingEmployeeId)?;
    let period = match clean_text(raw.period.as_deref()) {
        Some(value) => Some(Period::parse(&value).ok_or(NormalizeError::UnparseablePeriod { raw: value })?),
        None => None,
    };

    Ok(ProfileRecord {
        employee_id,
        project_id: normalize_optional_project_id(raw.project_id.as_deref()),
        period,
        role: clean_text(raw.role.as_deref()),
        band: clean_text(raw.band.as_deref()),
        function: clean_text(raw.function.as_deref()),
        manager_name: clean_text(raw.manager_name.as_deref()),
    })
}

/// Normalizes profile rows, preserving source order (later rows win in latest-snapshot mode).
pub fn normalize_profiles(rows: &[RawProfile]) -> Normalized<ProfileRecord> {
    let mut out = Normalized::default();
    for (idx, raw) in rows.iter().enumerate() {
        match normalize_profile(raw) {
            Ok(record) => out.records.push(record),
            Err(reason) => out.warnings.push(dropped(SourceKind::Profile, idx + 1, reason)),
        }
    }
    out
}
