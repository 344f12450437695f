// src/consolidation_tests.rs
#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::fs;

    use crate::allocation::AllocationMode;
    use crate::consolidator::Consolidator;
    use crate::model::*;
    use crate::period::{Period, PeriodFormat};
    use crate::profile::ProfileMode;
    use crate::store::Store;

    // --- Helpers ---

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    fn jan() -> Period {
        period(2024, 1)
    }

    fn feb() -> Period {
        period(2024, 2)
    }

    fn build_assignment(emp: &str, project: &str, hours: Decimal, period: Period) -> Assignment {
        Assignment {
            employee_id: emp.to_string(),
            period,
            project_id: project.to_string(),
            work_location: Some("London".to_string()),
            project_description: Some(format!("{project} delivery")),
            project_type: Some("T&M".to_string()),
            contract_type: None,
            customer_name: Some("Acme".to_string()),
            status: Some("Active".to_string()),
            hours,
        }
    }

    fn build_payroll(emp: &str, gross: Decimal, period: Period) -> PayrollRecord {
        PayrollRecord {
            employee_id: emp.to_string(),
            period,
            gross_amount: gross,
            employer_contribution: None,
        }
    }

    fn directory_entry(project: &str, name: &str, email: Option<&str>) -> DirectoryEntry {
        DirectoryEntry {
            project_id: project.to_string(),
            manager_name: Some(name.to_string()),
            manager_email: email.map(str::to_string),
        }
    }

    fn create_test_store() -> Store {
        let mut store = Store::open_in_memory(PeriodFormat::AnchorDate).unwrap();
        store
            .replace_assignments(&[
                build_assignment("A1", "P1", dec!(40), jan()),
                build_assignment("A1", "P2", dec!(60), jan()),
                build_assignment("A4", "P9", dec!(10), jan()),
                build_assignment("A5", "P5", dec!(8), jan()),
                build_assignment("A3", "P3", dec!(0), feb()),
                build_assignment("A3", "P4", dec!(0), feb()),
            ])
            .unwrap();
        store
            .replace_payroll(&[
                build_payroll("A1", dec!(1000.00), jan()),
                build_payroll("A2", dec!(500.00), jan()),
                build_payroll("A3", dec!(1000.00), feb()),
            ])
            .unwrap();
        store
            .load_directory(
                &[
                    directory_entry("P1", "Ann Smith", Some("ann@example.com")),
                    directory_entry("P2", "Bob Jones", Some("bob@example.com")),
                    directory_entry("P3", "Ann Smith", Some("ann@example.com")),
                    directory_entry("P4", "Ann Smith", Some("ann@example.com")),
                    directory_entry("P5", "Jane Doe", None),
                    directory_entry("P6", "jane doe", Some("jane.doe@example.com")),
                ],
                false,
            )
            .unwrap();
        store
    }

    fn consolidator() -> Consolidator {
        Consolidator::new(AllocationMode::ProrateByHours, ProfileMode::Latest)
    }

    fn rows_for<'a>(records: &'a [ConsolidatedRecord], emp: &str) -> Vec<&'a ConsolidatedRecord> {
        records.iter().filter(|r| r.employee_id == emp).collect()
    }

    // --- Scenarios ---

    #[test]
    fn hours_split_payroll_forty_sixty() {
        let mut store = create_test_store();
        let summary = consolidator().run_period(&mut store, jan()).unwrap();
        assert!(summary.reconciled);

        let records = store.view().consolidated(jan()).unwrap();
        let a1 = rows_for(&records, "A1");
        assert_eq!(a1.len(), 2);
        assert_eq!(a1[0].project_id.as_deref(), Some("P1"));
        assert_eq!(a1[0].allocated_amount, Some(dec!(400.00)));
        assert_eq!(a1[1].allocated_amount, Some(dec!(600.00)));
        assert_eq!(a1[1].manager_email.as_deref(), Some("bob@example.com"));
        assert_eq!(a1[0].customer_name.as_deref(), Some("Acme"));
    }

    #[test]
    fn payroll_without_assignments_gets_one_null_project_row() {
        let mut store = create_test_store();
        let summary = consolidator().run_period(&mut store, jan()).unwrap();
        assert_eq!(summary.unmatched_payroll, 1);

        let records = store.view().consolidated(jan()).unwrap();
        let a2 = rows_for(&records, "A2");
        assert_eq!(a2.len(), 1);
        assert_eq!(a2[0].project_id, None);
        assert_eq!(a2[0].allocated_amount, Some(dec!(500.00)));
    }

    #[test]
    fn zero_hours_split_equally() {
        let mut store = create_test_store();
        consolidator().run_period(&mut store, feb()).unwrap();

        let records = store.view().consolidated(feb()).unwrap();
        let amounts: Vec<Option<Decimal>> = rows_for(&records, "A3")
            .iter()
            .map(|r| r.allocated_amount)
            .collect();
        assert_eq!(amounts, vec![Some(dec!(500.00)), Some(dec!(500.00))]);
    }

    #[test]
    fn unknown_project_is_reported_and_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = create_test_store();
        let summary = consolidator()
            .with_report_dir(dir.path())
            .run_period(&mut store, jan())
            .unwrap();

        assert_eq!(summary.discrepancies, vec!["P9".to_string()]);
        let body = fs::read_to_string(summary.report_path.unwrap()).unwrap();
        assert_eq!(
            body,
            "Missing project IDs for 2024-01 (not found in directory):\nP9\n"
        );

        let records = store.view().consolidated(jan()).unwrap();
        let a4 = rows_for(&records, "A4");
        assert_eq!(a4[0].allocated_amount, None);
        assert_eq!(a4[0].manager_name, None);
    }

    #[test]
    fn manager_email_backfilled_by_case_insensitive_name() {
        let mut store = create_test_store();
        let summary = consolidator().run_period(&mut store, jan()).unwrap();
        assert_eq!(summary.emails_backfilled, 1);

        let records = store.view().consolidated(jan()).unwrap();
        let a5 = rows_for(&records, "A5");
        assert_eq!(a5[0].project_id.as_deref(), Some("P5"));
        assert_eq!(a5[0].manager_name.as_deref(), Some("Jane Doe"));
        assert_eq!(a5[0].manager_email.as_deref(), Some("jane.doe@example.com"));
    }

    #[test]
    fn name_backfill_does_not_hide_a_project_missing_from_directory() {
        let mut store = create_test_store();
        store
            .replace_assignments(&[
                build_assignment("E1", "P9", dec!(8), jan()),
                build_assignment("E2", "P9", dec!(8), jan()),
            ])
            .unwrap();
        store
            .append_profiles(&[ProfileRecord {
                employee_id: "E1".into(),
                project_id: None,
                period: None,
                role: None,
                band: None,
                function: None,
                manager_name: Some("jane doe".into()),
            }])
            .unwrap();

        let summary = consolidator().run_period(&mut store, jan()).unwrap();
        assert_eq!(summary.emails_backfilled, 1);
        assert_eq!(summary.discrepancies, vec!["P9".to_string()]);

        let records = store.view().consolidated(jan()).unwrap();
        assert_eq!(
            rows_for(&records, "E1")[0].manager_email.as_deref(),
            Some("jane.doe@example.com")
        );
        assert_eq!(rows_for(&records, "E2")[0].manager_email, None);
    }

    #[test]
    fn report_failure_after_commit_keeps_the_period() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("reports");
        fs::write(&blocked, "").unwrap();
        let mut store = create_test_store();

        let err = consolidator()
            .with_report_dir(&blocked)
            .run_period(&mut store, jan())
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::ReportWrite { .. }));
        assert_eq!(store.view().consolidated(jan()).unwrap().len(), 5);
    }

    // --- Run-level properties ---

    #[test]
    fn rerunning_a_period_is_a_full_replace() {
        let mut store = create_test_store();
        let first = consolidator().run_period(&mut store, jan()).unwrap();
        let first_rows = store.view().consolidated(jan()).unwrap();
        let second = consolidator().run_period(&mut store, jan()).unwrap();
        let second_rows = store.view().consolidated(jan()).unwrap();

        assert_eq!(first_rows, second_rows);
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.records_written, second.records_written);
        assert_eq!(
            store.view().run_fingerprints(jan()).unwrap(),
            vec![first.fingerprint.clone(), first.fingerprint]
        );
    }

    #[test]
    fn standalone_backfill_is_non_destructive() {
        let mut store = create_test_store();
        let c = consolidator();
        c.run_period(&mut store, jan()).unwrap();
        let before = store.view().consolidated(jan()).unwrap();

        assert_eq!(c.backfill_period(&mut store, jan()).unwrap(), 0);
        assert_eq!(store.view().consolidated(jan()).unwrap(), before);
    }

    #[test]
    fn periods_are_consolidated_independently_in_order() {
        let mut store = create_test_store();
        let summaries = consolidator()
            .run_periods(&mut store, &[feb(), jan(), feb()])
            .unwrap();
        let order: Vec<Period> = summaries.iter().map(|s| s.period).collect();
        assert_eq!(order, vec![jan(), feb()]);

        consolidator().run_period(&mut store, feb()).unwrap();
        assert_eq!(store.view().consolidated(jan()).unwrap().len(), 5);
        assert_eq!(store.view().consolidated(feb()).unwrap().len(), 2);
    }

    #[test]
    fn negative_hours_skip_only_their_group() {
        let mut store = create_test_store();
        store
            .replace_assignments(&[
                build_assignment("A1", "P1", dec!(-5), jan()),
                build_assignment("B1", "P1", dec!(5), jan()),
            ])
            .unwrap();
        store
            .replace_payroll(&[build_payroll("A1", dec!(100), jan()), build_payroll("B1", dec!(80), jan())])
            .unwrap();

        let summary = consolidator().run_period(&mut store, jan()).unwrap();
        assert_eq!(summary.groups_skipped, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.reconciled);
        let records = store.view().consolidated(jan()).unwrap();
        assert!(rows_for(&records, "A1").is_empty());
        assert_eq!(rows_for(&records, "B1")[0].allocated_amount, Some(dec!(80)));
    }

    #[test]
    fn partitioned_profiles_fill_only_matching_period() {
        let mut store = create_test_store();
        store
            .append_profiles(&[ProfileRecord {
                employee_id: "A1".into(),
                project_id: Some("P1".into()),
                period: Some(jan()),
                role: Some("Consultant".into()),
                band: Some("B2".into()),
                function: Some("Delivery".into()),
                manager_name: None,
            }])
            .unwrap();

        let c = Consolidator::new(AllocationMode::ProrateByHours, ProfileMode::PeriodPartitioned);
        c.run_period(&mut store, jan()).unwrap();
        let records = store.view().consolidated(jan()).unwrap();
        let a1 = rows_for(&records, "A1");
        assert_eq!(a1[0].role.as_deref(), Some("Consultant"));
        assert_eq!(a1[1].role, None);

        let feb_summary = c.run_period(&mut store, feb()).unwrap();
        assert!(feb_summary
            .warnings
            .iter()
            .any(|w| matches!(w, crate::error::RunWarning::ProfilePartitionMissing { .. })));
    }

    #[test]
    fn month_token_store_consolidates_the_same_way() {
        let mut store = Store::open_in_memory(PeriodFormat::MonthToken).unwrap();
        store
            .replace_assignments(&[
                build_assignment("A1", "P1", dec!(1), jan()),
                build_assignment("A1", "P2", dec!(2), jan()),
            ])
            .unwrap();
        store.replace_payroll(&[build_payroll("A1", dec!(100), jan())]).unwrap();

        let c = Consolidator::new(AllocationMode::EqualSplit, ProfileMode::Latest);
        c.run_period(&mut store, jan()).unwrap();
        let amounts: Vec<Option<Decimal>> = store
            .view()
            .consolidated(jan())
            .unwrap()
            .iter()
            .map(|r| r.allocated_amount)
            .collect();
        assert_eq!(amounts, vec![Some(dec!(50)), Some(dec!(50))]);
        assert_eq!(summary_sum(&store, jan()), dec!(100));
    }

    fn summary_sum(store: &Store, period: Period) -> Decimal {
        store
            .view()
            .consolidated(period)
            .unwrap()
            .iter()
            .filter_map(|r| r.allocated_amount)
            .sum()
    }
}
