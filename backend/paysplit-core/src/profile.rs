// src/profile.rs
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{ParseSettingError, RunWarning};
use crate::model::{EmployeeId, ProfileAttributes, ProfileRecord, ProjectId};
use crate::period::Period;

/// Where organizational attributes come from. Selected per deployment, never mixed in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    /// One row per employee; the most recently loaded row wins.
    #[default]
    Latest,
    /// Exact match on (employee, project, period), one partition per month.
    PeriodPartitioned,
}

impl fmt::Display for ProfileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProfileMode::Latest => "latest",
            ProfileMode::PeriodPartitioned => "period_partitioned",
        })
    }
}

impl FromStr for ProfileMode {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "latest" | "latest_snapshot" => Ok(ProfileMode::Latest),
            "period_partitioned" | "partitioned" => Ok(ProfileMode::PeriodPartitioned),
            _ => Err(ParseSettingError::new("profile mode", s)),
        }
    }
}

type PartitionKey = (EmployeeId, ProjectId);

#[derive(Debug, Clone)]
pub enum ProfileResolver {
    Latest(HashMap<EmployeeId, ProfileAttributes>),
    Partitioned(BTreeMap<Period, HashMap<PartitionKey, ProfileAttributes>>),
}

impl ProfileResolver {
    /// Builds a resolver from records in load order.
    pub fn build(mode: ProfileMode, records: &[ProfileRecord]) -> Self {
        match mode {
            ProfileMode::Latest => Self::latest(records),
            ProfileMode::PeriodPartitioned => Self::partitioned(records),
        }
    }

    fn latest(records: &[ProfileRecord]) -> Self {
        let mut by_employee = HashMap::new();
        for record in records {
            // Later batches overwrite earlier ones.
            by_employee.insert(record.employee_id.clone(), ProfileAttributes::from(record));
        }
        debug!("Latest-snapshot profiles loaded for {} employees", by_employee.len());
        Self::Latest(by_employee)
    }

    fn partitioned(records: &[ProfileRecord]) -> Self {
        let mut partitions: BTreeMap<Period, HashMap<PartitionKey, ProfileAttributes>> =
            BTreeMap::new();
        let mut unkeyed = 0usize;
        for record in records {
            let (Some(period), Some(project_id)) = (record.period, record.project_id.clone()) else {
                unkeyed += 1;
                continue;
            };
            partitions
                .entry(period)
                .or_default()
                .insert((record.employee_id.clone(), project_id), ProfileAttributes::from(record));
        }
        if unkeyed > 0 {
            warn!(
                "{} profile rows lack a period or project id and cannot be used in partitioned mode",
                unkeyed
            );
        }
        Self::Partitioned(partitions)
    }

    /// A warning when `period` has no partition at all (partitioned mode only).
    pub fn check_partition(&self, period: Period) -> Option<RunWarning> {
        match self {
            Self::Partitioned(partitions) if !partitions.contains_key(&period) => {
                let warning = RunWarning::ProfilePartitionMissing { period };
                warn!("{}", warning);
                Some(warning)
            }
            _ => None,
        }
    }

    /// Resolves attributes; every miss resolves to all-empty rather than an error.
    pub fn resolve(
        &self,
        employee_id: &str,
        project_id: Option<&str>,
        period: Period,
    ) -> ProfileAttributes {
        match self {
            Self::Latest(by_employee) => by_employee.get(employee_id).cloned().unwrap_or_default(),
            Self::Partitioned(partitions) => {
                let Some(project_id) = project_id else {
                    return ProfileAttributes::default();
                };
                partitions
                    .get(&period)
                    .and_then(|p| p.get(&(employee_id.to_string(), project_id.to_string())))
                    .cloned()
                    .unwrap_or_default()
            }
        }
    }
}
