// src/config.rs
use serde::Deserialize;
use std::path::PathBuf;

use crate::allocation::AllocationMode;
use crate::period::PeriodFormat;
use crate::profile::ProfileMode;

pub const ENV_PREFIX: &str = "PAYSPLIT_";

fn default_database_path() -> PathBuf {
    PathBuf::from("paysplit.db")
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

/// Deployment settings, read from `PAYSPLIT_*` variables (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub allocation_mode: AllocationMode,
    #[serde(default)]
    pub profile_mode: ProfileMode,
    #[serde(default)]
    pub period_format: PeriodFormat,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            allocation_mode: AllocationMode::default(),
            profile_mode: ProfileMode::default(),
            period_format: PeriodFormat::default(),
            report_dir: default_report_dir(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env::<AppConfig>()
    }
}
