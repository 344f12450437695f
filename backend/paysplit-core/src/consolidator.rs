// src/consolidator.rs
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::allocation::{allocate_group, group_by_employee_month, AllocatedRow, AllocationMode, EmployeeMonth};
use crate::directory::DirectoryIndex;
use crate::discrepancy;
use crate::error::{AppError, RunWarning};
use crate::model::{Assignment, ConsolidatedRecord, PayrollRecord, ProjectId};
use crate::period::Period;
use crate::profile::{ProfileMode, ProfileResolver};
use crate::store::Store;

/// Allowed gap between payroll in and money allocated before a period is flagged.
pub const RECONCILE_TOLERANCE: Decimal = dec!(0.01);

// --- Pure consolidation ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodOutcome {
    pub records: Vec<ConsolidatedRecord>,
    pub warnings: Vec<RunWarning>,
    pub groups_allocated: usize,
    pub groups_skipped: usize,
    pub unmatched_payroll: usize,
    pub payroll_absent_rows: usize,
    pub total_gross_in: Decimal,
    pub skipped_gross: Decimal,
    pub total_gross_allocated: Decimal,
}

impl PeriodOutcome {
    /// True when every non-skipped group's payroll was allocated to within tolerance.
    pub fn reconciled(&self) -> bool {
        self.total_gross_in
            .checked_sub(self.skipped_gross)
            .and_then(|expected| expected.checked_sub(self.total_gross_allocated))
            .is_some_and(|gap| gap.abs() <= RECONCILE_TOLERANCE)
    }
}

fn enrich(
    group: &EmployeeMonth,
    row: AllocatedRow,
    directory: &DirectoryIndex,
    profiles: &ProfileResolver,
) -> ConsolidatedRecord {
    let project_id = row.assignment.as_ref().map(|a| a.project_id.clone());
    let profile = profiles.resolve(&group.employee_id, project_id.as_deref(), group.period);
    let contact = project_id
        .as_deref()
        .map(|p| directory.resolve(p))
        .unwrap_or_default();
    let assignment = row.assignment.as_ref();
    let field = |get: fn(&Assignment) -> &Option<String>| assignment.and_then(|a| get(a).clone());

    ConsolidatedRecord {
        employee_id: group.employee_id.clone(),
        period: group.period,
        project_id,
        allocated_amount: row.amount,
        allocated_contribution: row.contribution,
        role: profile.role,
        band: profile.band,
        function: profile.function,
        work_location: field(|a| &a.work_location),
        project_description: field(|a| &a.project_description),
        project_type: field(|a| &a.project_type),
        contract_type: field(|a| &a.contract_type),
        customer_name: field(|a| &a.customer_name),
        // Directory name first, then whatever the profile knows.
        manager_name: contact.name.or(profile.manager_name),
        manager_email: contact.email,
    }
}

/// Groups, allocates and enriches one period's inputs. No I/O.
///
/// Rows outside `period` are ignored. Groups with negative or out-of-range inputs are skipped with a warning.
pub fn consolidate_period(
    period: Period,
    assignments: &[Assignment],
    payroll: &[PayrollRecord],
    directory: &DirectoryIndex,
    profiles: &ProfileResolver,
    mode: AllocationMode,
) -> PeriodOutcome {
    let assignments: Vec<Assignment> = assignments.iter().filter(|a| a.period == period).cloned().collect();
    let payroll: Vec<PayrollRecord> = payroll.iter().filter(|p| p.period == period).cloned().collect();

    let mut outcome = PeriodOutcome::default();
    outcome.warnings.extend(profiles.check_partition(period));

    for group in group_by_employee_month(&assignments, &payroll) {
        let gross = group.payroll.as_ref().map(|p| p.gross_amount);
        outcome.total_gross_in = outcome.total_gross_in.saturating_add(gross.unwrap_or_default());

        let rows = match allocate_group(&group, mode) {
            Ok(rows) => rows,
            Err(reason) => {
                let warning = RunWarning::GroupSkipped {
                    employee_id: group.employee_id.clone(),
                    period,
                    reason,
                };
                warn!("{}", warning);
                outcome.warnings.push(warning);
                outcome.groups_skipped += 1;
                outcome.skipped_gross = outcome.skipped_gross.saturating_add(gross.unwrap_or_default());
                continue;
            }
        };

        outcome.groups_allocated += 1;
        if group.assignments.is_empty() {
            outcome.unmatched_payroll += 1;
        }
        if group.payroll.is_none() {
            outcome.payroll_absent_rows += rows.len();
        }
        for row in rows {
            outcome.total_gross_allocated = outcome
                .total_gross_allocated
                .saturating_add(row.amount.unwrap_or_default());
            outcome.records.push(enrich(&group, row, directory, profiles));
        }
    }

    outcome
        .records
        .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    outcome
}

/// SHA-256 over the canonical JSON of the records in stored order.
pub fn fingerprint(records: &[ConsolidatedRecord]) -> Result<String, AppError> {
    let json = serde_json::to_vec(records)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hex::encode(hasher.finalize()))
}

// --- Run summary ---

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub period: Period,
    pub assignments_read: usize,
    pub payroll_read: usize,
    pub records_written: usize,
    pub groups_allocated: usize,
    pub groups_skipped: usize,
    pub unmatched_payroll: usize,
    pub payroll_absent_rows: usize,
    pub total_gross_in: Decimal,
    pub total_gross_allocated: Decimal,
    pub reconciled: bool,
    pub emails_backfilled: usize,
    pub discrepancies: Vec<ProjectId>,
    pub warnings: Vec<RunWarning>,
    pub fingerprint: String,
    pub report_path: Option<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Period {}", self.period)?;
        writeln!(
            f,
            "  read: {} assignments, {} payroll records",
            self.assignments_read, self.payroll_read
        )?;
        writeln!(
            f,
            "  written: {} records ({} groups allocated, {} skipped)",
            self.records_written, self.groups_allocated, self.groups_skipped
        )?;
        writeln!(
            f,
            "  payroll without assignments: {}; assignment rows without payroll: {}",
            self.unmatched_payroll, self.payroll_absent_rows
        )?;
        writeln!(
            f,
            "  gross in {} / allocated {} ({})",
            self.total_gross_in,
            self.total_gross_allocated,
            if self.reconciled { "reconciled" } else { "NOT reconciled" }
        )?;
        writeln!(f, "  emails backfilled: {}", self.emails_backfilled)?;
        if self.discrepancies.is_empty() {
            writeln!(f, "  missing projects: none")?;
        } else {
            writeln!(f, "  missing projects: {}", self.discrepancies.join(", "))?;
        }
        writeln!(f, "  warnings: {}", self.warnings.len())?;
        for warning in &self.warnings {
            writeln!(f, "    - {warning}")?;
        }
        write!(f, "  fingerprint: {}", self.fingerprint)
    }
}

// --- Orchestration ---

/// Runs whole periods against a [`Store`]. Periods never interleave.
#[derive(Debug, Clone)]
pub struct Consolidator {
    pub allocation_mode: AllocationMode,
    pub profile_mode: ProfileMode,
    /// Discrepancy lists go here; `None` skips the file.
    pub report_dir: Option<PathBuf>,
}

impl Consolidator {
    pub fn new(allocation_mode: AllocationMode, profile_mode: ProfileMode) -> Self {
        Self {
            allocation_mode,
            profile_mode,
            report_dir: None,
        }
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Replaces the period's consolidated rows in one transaction, then writes the discrepancy list.
    /// A store failure rolls the period back to its previous state. A report failure comes after
    /// the commit and surfaces as [`AppError::ReportWrite`].
    pub fn run_period(&self, store: &mut Store, period: Period) -> Result<RunSummary, AppError> {
        info!(
            "Consolidating {} ({} allocation, {} profiles)",
            period, self.allocation_mode, self.profile_mode
        );

        let mut summary = store.with_transaction(|session| {
            let assignments = session.assignments(period)?;
            let payroll = session.payroll(period)?;
            let directory = DirectoryIndex::new(session.directory()?);
            let profiles = ProfileResolver::build(self.profile_mode, &session.profiles(self.profile_mode, period)?);
            debug!(
                "{}: {} assignments, {} payroll records, {} directory entries",
                period,
                assignments.len(),
                payroll.len(),
                directory.len()
            );

            let outcome = consolidate_period(
                period,
                &assignments,
                &payroll,
                &directory,
                &profiles,
                self.allocation_mode,
            );
            let reconciled = outcome.reconciled();
            if !reconciled {
                warn!(
                    "{}: gross in {} does not reconcile with allocated {}",
                    period, outcome.total_gross_in, outcome.total_gross_allocated
                );
            }

            let written = session.replace_consolidated(period, &outcome.records)?;
            let emails_backfilled = session.fill_missing_emails(period, &directory)?;
            let stored = session.consolidated(period)?;
            let discrepancies = discrepancy::missing_projects(&assignments, &directory);
            let fingerprint = fingerprint(&stored)?;
            session.record_run(period, &fingerprint, stored.len())?;

            Ok(RunSummary {
                period,
                assignments_read: assignments.len(),
                payroll_read: payroll.len(),
                records_written: written,
                groups_allocated: outcome.groups_allocated,
                groups_skipped: outcome.groups_skipped,
                unmatched_payroll: outcome.unmatched_payroll,
                payroll_absent_rows: outcome.payroll_absent_rows,
                total_gross_in: outcome.total_gross_in,
                total_gross_allocated: outcome.total_gross_allocated,
                reconciled,
                emails_backfilled,
                discrepancies,
                warnings: outcome.warnings,
                fingerprint,
                report_path: None,
            })
        })?;

        if let Some(dir) = &self.report_dir {
            summary.report_path = Some(discrepancy::write_report(dir, period, &summary.discrepancies)?);
        }
        info!(
            "{}: {} records, {} skipped group(s), {} missing project(s)",
            period,
            summary.records_written,
            summary.groups_skipped,
            summary.discrepancies.len()
        );
        Ok(summary)
    }

    /// Runs each period in ascending order. Stops at the first store failure;
    /// periods already committed stay committed.
    pub fn run_periods(&self, store: &mut Store, periods: &[Period]) -> Result<Vec<RunSummary>, AppError> {
        let mut ordered = periods.to_vec();
        ordered.sort();
        ordered.dedup();
        ordered
            .into_iter()
            .map(|period| self.run_period(store, period))
            .collect()
    }

    /// Re-runs only the name-based email backfill for a period.
    pub fn backfill_period(&self, store: &mut Store, period: Period) -> Result<usize, AppError> {
        store.with_transaction(|session| {
            let directory = DirectoryIndex::new(session.directory()?);
            session.fill_missing_emails(period, &directory)
        })
    }

    /// Recomputes the discrepancy list from stored state and rewrites the report.
    pub fn discrepancies(&self, store: &Store, period: Period) -> Result<(Vec<ProjectId>, Option<PathBuf>), AppError> {
        let session = store.view();
        let directory = DirectoryIndex::new(session.directory()?);
        let missing = discrepancy::missing_projects(&session.assignments(period)?, &directory);
        let path = match &self.report_dir {
            Some(dir) => Some(discrepancy::write_report(dir, period, &missing)?),
            None => None,
        };
        Ok((missing, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AllocationError;
    use crate::model::{DirectoryEntry, ProfileRecord};

    fn jan() -> Period {
        Period::new(2024, 1).unwrap()
    }

    fn assignment(emp: &str, project: &str, hours: Decimal) -> Assignment {
        Assignment {
            employee_id: emp.to_string(),
            period: jan(),
            project_id: project.to_string(),
            work_location: None,
            project_description: None,
            project_type: None,
            contract_type: None,
            customer_name: Some("Acme".to_string()),
            status: None,
            hours,
        }
    }

    fn payroll(emp: &str, gross: Decimal) -> PayrollRecord {
        PayrollRecord {
            employee_id: emp.to_string(),
            period: jan(),
            gross_amount: gross,
            employer_contribution: None,
        }
    }

    fn no_profiles() -> ProfileResolver {
        ProfileResolver::build(ProfileMode::Latest, &[])
    }

    #[test]
    fn directory_contact_wins_and_profile_supplies_missing_manager() {
        let directory = DirectoryIndex::new(vec![DirectoryEntry {
            project_id: "P1".into(),
            manager_name: Some("Ann".into()),
            manager_email: Some("ann@example.com".into()),
        }]);
        let profiles = ProfileResolver::build(
            ProfileMode::Latest,
            &[ProfileRecord {
                employee_id: "A1".into(),
                project_id: None,
                period: None,
                role: Some("Engineer".into()),
                band: Some("B3".into()),
                function: Some("Delivery".into()),
                manager_name: Some("Profile Manager".into()),
            }],
        );
        let outcome = consolidate_period(
            jan(),
            &[assignment("A1", "P1", dec!(1)), assignment("A1", "P2", dec!(1))],
            &[payroll("A1", dec!(200))],
            &directory,
            &profiles,
            AllocationMode::ProrateByHours,
        );

        let p1 = &outcome.records[0];
        assert_eq!(p1.manager_name.as_deref(), Some("Ann"));
        assert_eq!(p1.manager_email.as_deref(), Some("ann@example.com"));
        assert_eq!(p1.role.as_deref(), Some("Engineer"));
        assert_eq!(p1.customer_name.as_deref(), Some("Acme"));

        let p2 = &outcome.records[1];
        assert_eq!(p2.manager_name.as_deref(), Some("Profile Manager"));
        assert_eq!(p2.manager_email, None);
    }

    #[test]
    fn skipped_groups_are_counted_and_excluded_from_reconciliation() {
        let outcome = consolidate_period(
            jan(),
            &[assignment("A1", "P1", dec!(-1)), assignment("B1", "P1", dec!(5))],
            &[payroll("A1", dec!(100)), payroll("B1", dec!(50))],
            &DirectoryIndex::default(),
            &no_profiles(),
            AllocationMode::ProrateByHours,
        );
        assert_eq!(outcome.groups_skipped, 1);
        assert_eq!(outcome.groups_allocated, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].employee_id, "B1");
        assert!(outcome.reconciled());
        assert!(matches!(outcome.warnings[0], RunWarning::GroupSkipped { .. }));
    }

    #[test]
    fn overflowing_hours_become_a_group_warning() {
        let huge = Decimal::from_scientific("1e28").unwrap();
        let outcome = consolidate_period(
            jan(),
            &[assignment("A1", "P1", huge), assignment("A1", "P2", dec!(1)), assignment("B1", "P1", dec!(5))],
            &[payroll("A1", dec!(1000)), payroll("B1", dec!(50))],
            &DirectoryIndex::default(),
            &no_profiles(),
            AllocationMode::ProrateByHours,
        );
        assert_eq!(outcome.groups_skipped, 1);
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.reconciled());
        assert!(matches!(
            &outcome.warnings[0],
            RunWarning::GroupSkipped { reason: AllocationError::Overflow { .. }, .. }
        ));
    }

    #[test]
    fn rows_from_other_periods_are_ignored() {
        let mut feb_row = assignment("A1", "P1", dec!(1));
        feb_row.period = Period::new(2024, 2).unwrap();
        let outcome = consolidate_period(
            jan(),
            &[feb_row],
            &[payroll("A1", dec!(10))],
            &DirectoryIndex::default(),
            &no_profiles(),
            AllocationMode::ProrateByHours,
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].project_id, None);
        assert_eq!(outcome.unmatched_payroll, 1);
    }

    #[test]
    fn fingerprint_depends_only_on_record_content() {
        let outcome = consolidate_period(
            jan(),
            &[assignment("A1", "P1", dec!(1))],
            &[payroll("A1", dec!(10))],
            &DirectoryIndex::default(),
            &no_profiles(),
            AllocationMode::ProrateByHours,
        );
        let a = fingerprint(&outcome.records).unwrap();
        let b = fingerprint(&outcome.records.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint(&[]).unwrap());
    }
}
