// src/lib.rs
pub mod allocation;
pub mod config;
pub mod consolidator;
pub mod directory;
pub mod discrepancy;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod normalizer;
pub mod period;
pub mod profile;
pub mod store;

#[cfg(test)]
mod consolidation_tests;

pub use allocation::AllocationMode;
pub use config::AppConfig;
pub use consolidator::{Consolidator, RunSummary};
pub use error::{AppError, RunWarning};
pub use model::ConsolidatedRecord;
pub use period::{Period, PeriodFormat};
pub use profile::ProfileMode;
pub use store::Store;
