// src/model.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::period::Period;

pub type EmployeeId = String;
pub type ProjectId = String;

// --- Normalized records ---

/// One employee's recorded work on one project in one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub employee_id: EmployeeId,
    pub period: Period,
    pub project_id: ProjectId,
    pub work_location: Option<String>,
    pub project_description: Option<String>,
    pub project_type: Option<String>,
    pub contract_type: Option<String>,
    pub customer_name: Option<String>,
    pub status: Option<String>,
    pub hours: Decimal,
}

/// Total compensation for an (employee, period), independent of the project split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayrollRecord {
    pub employee_id: EmployeeId,
    pub period: Period,
    pub gross_amount: Decimal,
    pub employer_contribution: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub project_id: ProjectId,
    pub manager_name: Option<String>,
    pub manager_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub employee_id: EmployeeId,
    pub project_id: Option<ProjectId>,
    pub period: Option<Period>,
    pub role: Option<String>,
    pub band: Option<String>,
    pub function: Option<String>,
    pub manager_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileAttributes {
    pub role: Option<String>,
    pub band: Option<String>,
    pub function: Option<String>,
    pub manager_name: Option<String>,
}

impl From<&ProfileRecord> for ProfileAttributes {
    fn from(record: &ProfileRecord) -> Self {
        Self {
            role: record.role.clone(),
            band: record.band.clone(),
            function: record.function.clone(),
            manager_name: record.manager_name.clone(),
        }
    }
}

/// Final joined, allocated and enriched row. `project_id` is `None` only for payroll with no assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub employee_id: EmployeeId,
    pub period: Period,
    pub project_id: Option<ProjectId>,
    pub allocated_amount: Option<Decimal>,
    pub allocated_contribution: Option<Decimal>,
    pub role: Option<String>,
    pub band: Option<String>,
    pub function: Option<String>,
    pub work_location: Option<String>,
    pub project_description: Option<String>,
    pub project_type: Option<String>,
    pub contract_type: Option<String>,
    pub customer_name: Option<String>,
    pub manager_name: Option<String>,
    pub manager_email: Option<String>,
}

impl ConsolidatedRecord {
    /// Sort key giving the stable row order used for storage, export and fingerprints.
    pub fn sort_key(&self) -> (&str, Option<&str>) {
        (self.employee_id.as_str(), self.project_id.as_deref())
    }
}

// --- Raw source rows ---
// Field names match the upper-cased, space-separated spreadsheet headers (see import::normalize_header).

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAssignment {
    #[serde(rename = "EMPLID", alias = "EMPLOYEE ID", default)]
    pub employee_id: Option<String>,
    #[serde(rename = "PROJECT ID", default)]
    pub project_id: Option<String>,
    #[serde(rename = "CURRENT WORK LOCATION", alias = "WORK LOCATION", default)]
    pub work_location: Option<String>,
    #[serde(rename = "PROJECT DESCRIPTION", default)]
    pub project_description: Option<String>,
    #[serde(rename = "PROJECT TYPE", default)]
    pub project_type: Option<String>,
    #[serde(rename = "CONTRACT TYPE", default)]
    pub contract_type: Option<String>,
    #[serde(rename = "CUST NAME", alias = "CUSTOMER NAME", default)]
    pub customer_name: Option<String>,
    #[serde(rename = "RUS STATUS", alias = "STATUS", default)]
    pub status: Option<String>,
    #[serde(rename = "TOTAL HOURS", alias = "HOURS", default)]
    pub hours: Option<String>,
    #[serde(rename = "UTILIZATION END DT", alias = "MONTH", alias = "PERIOD", default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPayroll {
    #[serde(rename = "EMPLID", alias = "EMPLOYEE ID", default)]
    pub employee_id: Option<String>,
    #[serde(rename = "MONTH", alias = "PERIOD", default)]
    pub period: Option<String>,
    #[serde(rename = "GROSS PAY", alias = "GROSS AMOUNT", default)]
    pub gross_amount: Option<String>,
    #[serde(rename = "ER NIC SUM", alias = "EMPLOYER CONTRIBUTION", default)]
    pub employer_contribution: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDirectoryEntry {
    #[serde(rename = "SAP PROJECT ID", alias = "PROJECT ID", default)]
    pub project_id: Option<String>,
    #[serde(rename = "PROGRAM MANAGER NAME", alias = "MANAGER NAME", default)]
    pub manager_name: Option<String>,
    #[serde(rename = "PROGRAM MANAGER EMAIL ID", alias = "MANAGER EMAIL", default)]
    pub manager_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProfile {
    #[serde(rename = "EMPLID", alias = "EMPLOYEE ID", default)]
    pub employee_id: Option<String>,
    #[serde(rename = "PROJECT ID", default)]
    pub project_id: Option<String>,
    #[serde(rename = "MONTH", alias = "PERIOD", default)]
    pub period: Option<String>,
    #[serde(rename = "DESIGNATION", alias = "ROLE", alias = "JOB CODE DESCRIPTION", default)]
    pub role: Option<String>,
    #[serde(rename = "BAND", default)]
    pub band: Option<String>,
    #[serde(rename = "FUNCTION", default)]
    pub function: Option<String>,
    #[serde(rename = "PROGRAM MANAGER NAME", alias = "MANAGER NAME", default)]
    pub manager_name: Option<String>,
}
