// src/main.rs
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paysplit_core::{
    export, import, AllocationMode, AppConfig, Consolidator, Period, PeriodFormat, ProfileMode, Store,
};

#[derive(Parser)]
#[command(name = "paysplit")]
#[command(about = "Split monthly payroll across project assignments and enrich with manager data", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite store (env: PAYSPLIT_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    /// prorate_by_hours | equal_split | first_only
    #[arg(long, global = true)]
    allocation_mode: Option<AllocationMode>,
    /// latest | period_partitioned
    #[arg(long, global = true)]
    profile_mode: Option<ProfileMode>,
    /// anchor_date | month_token
    #[arg(long, global = true)]
    period_format: Option<PeriodFormat>,
    /// Directory for missing-project lists
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load an assignment CSV, replacing the periods it contains.
    ImportAssignments { csv: PathBuf },
    /// Load a payroll CSV, replacing the periods it contains.
    ImportPayroll { csv: PathBuf },
    /// Add unseen projects from a manager directory CSV.
    ImportDirectory {
        csv: PathBuf,
        /// Clear the directory before loading.
        #[arg(long)]
        rebuild: bool,
    },
    /// Append an organizational profile CSV.
    ImportProfiles { csv: PathBuf },
    /// Rebuild consolidated records for one or more periods.
    Consolidate {
        /// Period to consolidate (repeatable), e.g. 2024-01 or 2024-01-31.
        #[arg(long = "period")]
        periods: Vec<Period>,
        /// Every period that has assignments or payroll.
        #[arg(long, conflicts_with = "periods")]
        all: bool,
    },
    /// Re-run only the name-based manager email backfill.
    Backfill {
        #[arg(long)]
        period: Period,
    },
    /// Recompute and write the missing-project list.
    Discrepancies {
        #[arg(long)]
        period: Period,
    },
    /// Write a period's consolidated records to CSV.
    Export {
        #[arg(long)]
        period: Period,
        #[arg(long)]
        out: PathBuf,
    },
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("Failed to read PAYSPLIT_* configuration")?;
    if let Some(path) = &cli.database {
        config.database_path = path.clone();
    }
    if let Some(mode) = cli.allocation_mode {
        config.allocation_mode = mode;
    }
    if let Some(mode) = cli.profile_mode {
        config.profile_mode = mode;
    }
    if let Some(format) = cli.period_format {
        config.period_format = format;
    }
    if let Some(dir) = &cli.report_dir {
        config.report_dir = dir.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    info!(
        "Using store {} ({} periods)",
        config.database_path.display(),
        config.period_format
    );

    let mut store = Store::open(&config.database_path, config.period_format)
        .with_context(|| format!("Failed to open store {}", config.database_path.display()))?;
    let consolidator = Consolidator::new(config.allocation_mode, config.profile_mode)
        .with_report_dir(config.report_dir.clone());

    match cli.command {
        Command::ImportAssignments { csv } => {
            let report = import::import_assignments(&mut store, &csv)
                .with_context(|| format!("Assignment import from {} failed", csv.display()))?;
            println!("{report}");
        }
        Command::ImportPayroll { csv } => {
            let report = import::import_payroll(&mut store, &csv)
                .with_context(|| format!("Payroll import from {} failed", csv.display()))?;
            println!("{report}");
        }
        Command::ImportDirectory { csv, rebuild } => {
            let report = import::import_directory(&mut store, &csv, rebuild)
                .with_context(|| format!("Directory import from {} failed", csv.display()))?;
            println!("{report}");
        }
        Command::ImportProfiles { csv } => {
            let report = import::import_profiles(&mut store, &csv)
                .with_context(|| format!("Profile import from {} failed", csv.display()))?;
            println!("{report}");
        }
        Command::Consolidate { periods, all } => {
            let periods = if all {
                store.view().source_periods().context("Failed to list stored periods")?
            } else {
                periods
            };
            if periods.is_empty() {
                bail!("Nothing to consolidate: pass --period or --all");
            }
            let summaries = consolidator
                .run_periods(&mut store, &periods)
                .context("Consolidation aborted")?;
            for summary in &summaries {
                if !summary.reconciled {
                    warn!("{} did not reconcile", summary.period);
                }
                println!("{summary}");
            }
        }
        Command::Backfill { period } => {
            let filled = consolidator
                .backfill_period(&mut store, period)
                .with_context(|| format!("Backfill for {period} failed"))?;
            println!("Backfilled {filled} manager email(s) for {period}");
        }
        Command::Discrepancies { period } => {
            let (missing, path) = consolidator
                .discrepancies(&store, period)
                .with_context(|| format!("Discrepancy report for {period} failed"))?;
            println!("{} missing project id(s) for {period}", missing.len());
            for project_id in &missing {
                println!("  {project_id}");
            }
            if let Some(path) = path {
                println!("Written to {}", path.display());
            }
        }
        Command::Export { period, out } => {
            let records = store
                .view()
                .consolidated(period)
                .with_context(|| format!("Failed to read consolidated records for {period}"))?;
            let written = export::export_csv(&out, &records)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Exported {written} record(s) for {period} to {}", out.display());
        }
    }

    Ok(())
}
