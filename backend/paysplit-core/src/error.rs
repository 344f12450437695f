// src/error.rs
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::period::{Period, PeriodFormat};

// --- Fatal errors ---

/// Errors that abort the current run. Anything record- or group-shaped is a [`RunWarning`] instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON serialization failed: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),
    #[error(transparent)]
    InvalidSetting(#[from] ParseSettingError),
    #[error("Store is keyed by {stored} periods but this run is configured for {configured}")]
    PeriodFormatMismatch {
        stored: PeriodFormat,
        configured: PeriodFormat,
    },
    #[error("Period {period} was committed but its discrepancy report could not be written: {source}")]
    ReportWrite {
        period: Period,
        #[source]
        source: std::io::Error,
    },
    #[error("Stored value '{value}' in column {column} could not be read back")]
    CorruptValue { column: &'static str, value: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {setting}: '{value}'")]
pub struct ParseSettingError {
    pub setting: &'static str,
    pub value: String,
}

impl ParseSettingError {
    pub fn new(setting: &'static str, value: &str) -> Self {
        Self {
            setting,
            value: value.to_string(),
        }
    }
}

// --- Per-record and per-group problems ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("employee id is missing")]
    MissingEmployeeId,
    #[error("project id is missing")]
    MissingProjectId,
    #[error("period '{raw}' could not be parsed")]
    UnparseablePeriod { raw: String },
    #[error("period is missing")]
    MissingPeriod,
    #[error("{field} value '{raw}' is not a number")]
    InvalidNumber { field: &'static str, raw: String },
    #[error("gross amount is missing")]
    MissingGrossAmount,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("gross amount {amount} is negative")]
    NegativeGrossAmount { amount: Decimal },
    #[error("employer contribution {amount} is negative")]
    NegativeContribution { amount: Decimal },
    #[error("hours {hours} on project {project_id} are negative")]
    NegativeHours { project_id: String, hours: Decimal },
    #[error("{operation} overflowed the decimal range")]
    Overflow { operation: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Assignment,
    Payroll,
    Directory,
    Profile,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Assignment => "assignment",
            SourceKind::Payroll => "payroll",
            SourceKind::Directory => "directory",
            SourceKind::Profile => "profile",
        })
    }
}

/// Non-fatal findings, collected over a run and reported at the end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    #[error("{kind} row {row} dropped: {reason}")]
    RecordDropped {
        kind: SourceKind,
        row: usize,
        reason: NormalizeError,
    },
    #[error("payroll row {row} replaces an earlier record for {employee_id} in {period}")]
    DuplicatePayroll {
        row: usize,
        employee_id: String,
        period: Period,
    },
    #[error("group {employee_id}/{period} skipped: {reason}")]
    GroupSkipped {
        employee_id: String,
        period: Period,
        reason: AllocationError,
    },
    #[error("no profile partition for {period}; profile fields left empty")]
    ProfilePartitionMissing { period: Period },
}
