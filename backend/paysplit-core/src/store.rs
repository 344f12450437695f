// src/store.rs
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::directory::{self, backfill_emails, DirectoryIndex, DirectoryStore};
use crate::error::AppError;
use crate::model::*;
use crate::period::{Period, PeriodFormat};
use crate::profile::ProfileMode;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS assignments (
    employee_id         TEXT NOT NULL,
    period              TEXT NOT NULL,
    project_id          TEXT NOT NULL,
    work_location       TEXT,
    project_description TEXT,
    project_type        TEXT,
    contract_type       TEXT,
    customer_name       TEXT,
    status              TEXT,
    hours               TEXT NOT NULL,
    PRIMARY KEY (employee_id, period, project_id)
);
CREATE TABLE IF NOT EXISTS payroll (
    employee_id           TEXT NOT NULL,
    period                TEXT NOT NULL,
    gross_amount          TEXT NOT NULL,
    employer_contribution TEXT,
    PRIMARY KEY (employee_id, period)
);
CREATE TABLE IF NOT EXISTS directory (
    project_id    TEXT PRIMARY KEY,
    manager_name  TEXT,
    manager_email TEXT
);
CREATE TABLE IF NOT EXISTS profiles (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_id  TEXT NOT NULL,
    project_id   TEXT,
    period       TEXT,
    role         TEXT,
    band         TEXT,
    function     TEXT,
    manager_name TEXT
);
CREATE INDEX IF NOT EXISTS profiles_by_period ON profiles (period);
CREATE TABLE IF NOT EXISTS consolidated (
    employee_id            TEXT NOT NULL,
    period                 TEXT NOT NULL,
    project_id             TEXT,
    allocated_amount       TEXT,
    allocated_contribution TEXT,
    role                   TEXT,
    band                   TEXT,
    function               TEXT,
    work_location          TEXT,
    project_description    TEXT,
    project_type           TEXT,
    contract_type          TEXT,
    customer_name          TEXT,
    manager_name           TEXT,
    manager_email          TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS consolidated_key ON consolidated (period, employee_id, project_id);
CREATE TABLE IF NOT EXISTS consolidation_runs (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    period       TEXT NOT NULL,
    fingerprint  TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    completed_at TEXT NOT NULL
);
";

const PERIOD_FORMAT_KEY: &str = "period_format";

// --- Value conversion ---

fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

fn read_decimal(column: &'static str, raw: String) -> Result<Decimal, AppError> {
    Decimal::from_str(&raw).map_err(|_| AppError::CorruptValue { column, value: raw })
}

fn read_optional_decimal(column: &'static str, raw: Option<String>) -> Result<Option<Decimal>, AppError> {
    raw.map(|r| read_decimal(column, r)).transpose()
}

fn read_period(raw: String, format: PeriodFormat) -> Result<Period, AppError> {
    Period::from_key(&raw, format).ok_or(AppError::CorruptValue {
        column: "period",
        value: raw,
    })
}

fn text_columns<const N: usize>(row: &Row<'_>, start: usize) -> rusqlite::Result<[Option<String>; N]> {
    let mut out: [Option<String>; N] = std::array::from_fn(|_| None);
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = row.get(start + i)?;
    }
    Ok(out)
}

// --- Store ---

/// SQLite-backed home of the source tables and the consolidated output.
pub struct Store {
    conn: Connection,
    format: PeriodFormat,
}

impl Store {
    pub fn open(path: impl AsRef<Path>, format: PeriodFormat) -> Result<Self, AppError> {
        let path = path.as_ref();
        info!("Opening store at {}", path.display());
        Self::bootstrap(Connection::open(path)?, format)
    }

    pub fn open_in_memory(format: PeriodFormat) -> Result<Self, AppError> {
        Self::bootstrap(Connection::open_in_memory()?, format)
    }

    fn bootstrap(conn: Connection, format: PeriodFormat) -> Result<Self, AppError> {
        conn.execute_batch(SCHEMA)?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![PERIOD_FORMAT_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                    params![PERIOD_FORMAT_KEY, format.to_string()],
                )?;
                debug!("New store keyed by {} periods", format);
            }
            Some(value) => {
                let stored = PeriodFormat::from_str(&value)?;
                if stored != format {
                    return Err(AppError::PeriodFormatMismatch {
                        stored,
                        configured: format,
                    });
                }
            }
        }

        Ok(Self { conn, format })
    }

    /// Read-only access outside a transaction.
    pub fn view(&self) -> Session<'_> {
        Session {
            conn: &self.conn,
            format: self.format,
        }
    }

    /// Runs `work` in one transaction. `Ok` commits; `Err` rolls everything back.
    pub fn with_transaction<T>(
        &mut self,
        work: impl FnOnce(&Session<'_>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let tx = self.conn.transaction()?;
        let out = {
            let session = Session {
                conn: &tx,
                format: self.format,
            };
            work(&session)?
        };
        tx.commit()?;
        Ok(out)
    }

    /// Replaces the stored assignments of every period present in `assignments`.
    pub fn replace_assignments(&mut self, assignments: &[Assignment]) -> Result<usize, AppError> {
        let periods: BTreeSet<Period> = assignments.iter().map(|a| a.period).collect();
        self.with_transaction(|s| {
            for period in &periods {
                s.conn.execute(
                    "DELETE FROM assignments WHERE period = ?1",
                    params![period.key(s.format)],
                )?;
            }
            let mut stmt = s.conn.prepare(
                "INSERT INTO assignments (employee_id, period, project_id, work_location, project_description,
                    project_type, contract_type, customer_name, status, hours)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for a in assignments {
                stmt.execute(params![
                    a.employee_id,
                    a.period.key(s.format),
                    a.project_id,
                    a.work_location,
                    a.project_description,
                    a.project_type,
                    a.contract_type,
                    a.customer_name,
                    a.status,
                    decimal_text(a.hours),
                ])?;
            }
            info!(
                "Stored {} assignments across {} period(s)",
                assignments.len(),
                periods.len()
            );
            Ok(assignments.len())
        })
    }

    /// Replaces the stored payroll of every period present in `records`.
    pub fn replace_payroll(&mut self, records: &[PayrollRecord]) -> Result<usize, AppError> {
        let periods: BTreeSet<Period> = records.iter().map(|r| r.period).collect();
        self.with_transaction(|s| {
            for period in &periods {
                s.conn.execute(
                    "DELETE FROM payroll WHERE period = ?1",
                    params![period.key(s.format)],
                )?;
            }
            let mut stmt = s.conn.prepare(
                "INSERT INTO payroll (employee_id, period, gross_amount, employer_contribution)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.employee_id,
                    r.period.key(s.format),
                    decimal_text(r.gross_amount),
                    r.employer_contribution.map(decimal_text),
                ])?;
            }
            info!("Stored {} payroll records across {} period(s)", records.len(), periods.len());
            Ok(records.len())
        })
    }

    /// Insert-if-absent load; `rebuild` empties the directory first. Returns entries added.
    pub fn load_directory(&mut self, entries: &[DirectoryEntry], rebuild: bool) -> Result<usize, AppError> {
        self.with_transaction(|s| {
            let mut target = SqliteDirectory { conn: s.conn };
            directory::load_directory(&mut target, entries, rebuild)
        })
    }

    /// Appends profile rows; their insertion sequence decides latest-wins.
    pub fn append_profiles(&mut self, records: &[ProfileRecord]) -> Result<usize, AppError> {
        self.with_transaction(|s| {
            let mut stmt = s.conn.prepare(
                "INSERT INTO profiles (employee_id, project_id, period, role, band, function, manager_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.employee_id,
                    r.project_id,
                    r.period.map(|p| p.key(s.format)),
                    r.role,
                    r.band,
                    r.function,
                    r.manager_name,
                ])?;
            }
            Ok(records.len())
        })
    }
}

// --- Session ---

/// Queries against either the bare connection or an open transaction.
pub struct Session<'c> {
    conn: &'c Connection,
    format: PeriodFormat,
}

impl Session<'_> {
    /// Every period that has assignments or payroll, ascending.
    pub fn source_periods(&self) -> Result<Vec<Period>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT period FROM assignments UNION SELECT period FROM payroll")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let periods = keys
            .into_iter()
            .map(|k| read_period(k, self.format))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(periods.into_iter().collect())
    }

    pub fn assignments(&self, period: Period) -> Result<Vec<Assignment>, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT employee_id, project_id, hours, work_location, project_description, project_type,
                    contract_type, customer_name, status
             FROM assignments WHERE period = ?1
             ORDER BY employee_id, project_id",
        )?;
        let rows = stmt
            .query_map(params![period.key(self.format)], |row| {
                let employee_id: String = row.get(0)?;
                let project_id: String = row.get(1)?;
                let hours: String = row.get(2)?;
                let text: [Option<String>; 6] = text_columns(row, 3)?;
                Ok((employee_id, project_id, hours, text))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(employee_id, project_id, hours, text)| {
                let [work_location, project_description, project_type, contract_type, customer_name, status] =
                    text;
                Ok(Assignment {
                    employee_id,
                    period,
                    project_id,
                    work_location,
                    project_description,
                    project_type,
                    contract_type,
                    customer_name,
                    status,
                    hours: read_decimal("hours", hours)?,
                })
            })
            .collect()
    }

    pub fn payroll(&self, period: Period) -> Result<Vec<PayrollRecord>, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT employee_id, gross_amount, employer_contribution
             FROM payroll WHERE period = ?1 ORDER BY employee_id",
        )?;
        let rows = stmt
            .query_map(params![period.key(self.format)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(employee_id, gross, contribution)| {
                Ok(PayrollRecord {
                    employee_id,
                    period,
                    gross_amount: read_decimal("gross_amount", gross)?,
                    employer_contribution: read_optional_decimal("employer_contribution", contribution)?,
                })
            })
            .collect()
    }

    pub fn directory(&self) -> Result<Vec<DirectoryEntry>, AppError> {
        SqliteDirectory { conn: self.conn }.entries()
    }

    /// Profile rows in load order. Partitioned mode only loads the requested period's rows.
    pub fn profiles(&self, mode: ProfileMode, period: Period) -> Result<Vec<ProfileRecord>, AppError> {
        let (sql, key) = match mode {
            ProfileMode::Latest => (
                "SELECT employee_id, project_id, period, role, band, function, manager_name
                 FROM profiles ORDER BY seq",
                None,
            ),
            ProfileMode::PeriodPartitioned => (
                "SELECT employee_id, project_id, period, role, band, function, manager_name
                 FROM profiles WHERE period = ?1 ORDER BY seq",
                Some(period.key(self.format)),
            ),
        };
        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &Row<'_>| -> rusqlite::Result<(String, [Option<String>; 6])> {
            Ok((row.get(0)?, text_columns(row, 1)?))
        };
        let rows = match &key {
            Some(key) => stmt.query_map(params![key], map_row)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
        };

        rows.into_iter()
            .map(|(employee_id, text)| {
                let [project_id, period_key, role, band, function, manager_name] = text;
                Ok(ProfileRecord {
                    employee_id,
                    project_id,
                    period: period_key.map(|k| read_period(k, self.format)).transpose()?,
                    role,
                    band,
                    function,
                    manager_name,
                })
            })
            .collect()
    }

    /// Deletes the period's consolidated rows and inserts `records` in stable order.
    pub fn replace_consolidated(&self, period: Period, records: &[ConsolidatedRecord]) -> Result<usize, AppError> {
        let key = period.key(self.format);
        let removed = self
            .conn
            .execute("DELETE FROM consolidated WHERE period = ?1", params![key])?;
        debug!("Removed {} prior consolidated rows for {}", removed, period);

        let mut ordered: Vec<&ConsolidatedRecord> = records.iter().collect();
        ordered.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut stmt = self.conn.prepare(
            "INSERT INTO consolidated (employee_id, period, project_id, allocated_amount, allocated_contribution,
                role, band, function, work_location, project_description, project_type, contract_type,
                customer_name, manager_name, manager_email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )?;
        for r in ordered {
            stmt.execute(params![
                r.employee_id,
                key,
                r.project_id,
                r.allocated_amount.map(decimal_text),
                r.allocated_contribution.map(decimal_text),
                r.role,
                r.band,
                r.function,
                r.work_location,
                r.project_description,
                r.project_type,
                r.contract_type,
                r.customer_name,
                r.manager_name,
                r.manager_email,
            ])?;
        }
        Ok(records.len())
    }

    /// The period's consolidated rows ordered by (employee, project), null project first.
    pub fn consolidated(&self, period: Period) -> Result<Vec<ConsolidatedRecord>, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT employee_id, allocated_amount, allocated_contribution, project_id, role, band, function,
                    work_location, project_description, project_type, contract_type, customer_name,
                    manager_name, manager_email
             FROM consolidated WHERE period = ?1
             ORDER BY employee_id, project_id",
        )?;
        let rows = stmt
            .query_map(params![period.key(self.format)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    text_columns::<11>(row, 3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(employee_id, amount, contribution, text)| {
                let [project_id, role, band, function, work_location, project_description, project_type, contract_type, customer_name, manager_name, manager_email] =
                    text;
                Ok(ConsolidatedRecord {
                    employee_id,
                    period,
                    project_id,
                    allocated_amount: read_optional_decimal("allocated_amount", amount)?,
                    allocated_contribution: read_optional_decimal("allocated_contribution", contribution)?,
                    role,
                    band,
                    function,
                    work_location,
                    project_description,
                    project_type,
                    contract_type,
                    customer_name,
                    manager_name,
                    manager_email,
                })
            })
            .collect()
    }

    /// Name-based backfill of stored rows. Only rows whose email is null are updated.
    pub fn fill_missing_emails(&self, period: Period, directory: &DirectoryIndex) -> Result<usize, AppError> {
        let mut records = self.consolidated(period)?;
        let before: Vec<bool> = records.iter().map(|r| r.manager_email.is_some()).collect();
        let filled = backfill_emails(&mut records, directory);
        if filled == 0 {
            return Ok(0);
        }

        let key = period.key(self.format);
        let mut stmt = self.conn.prepare(
            "UPDATE consolidated SET manager_email = ?1
             WHERE period = ?2 AND employee_id = ?3 AND project_id IS ?4 AND manager_email IS NULL",
        )?;
        let mut updated = 0;
        for (record, had_email) in records.iter().zip(before) {
            if had_email {
                continue;
            }
            if let Some(email) = &record.manager_email {
                updated += stmt.execute(params![email, key, record.employee_id, record.project_id])?;
            }
        }
        info!("Backfilled {} manager email(s) for {}", updated, period);
        Ok(updated)
    }

    pub fn record_run(&self, period: Period, fingerprint: &str, record_count: usize) -> Result<(), AppError> {
        self.conn.execute(
            "INSERT INTO consolidation_runs (period, fingerprint, record_count, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                period.key(self.format),
                fingerprint,
                record_count as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Fingerprints of every recorded run for `period`, oldest first.
    pub fn run_fingerprints(&self, period: Period) -> Result<Vec<String>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT fingerprint FROM consolidation_runs WHERE period = ?1 ORDER BY id")?;
        let out = stmt
            .query_map(params![period.key(self.format)], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(out)
    }
}

// --- Directory table ---

struct SqliteDirectory<'c> {
    conn: &'c Connection,
}

impl DirectoryStore for SqliteDirectory<'_> {
    fn insert_if_absent(&mut self, entry: &DirectoryEntry) -> Result<bool, AppError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO directory (project_id, manager_name, manager_email) VALUES (?1, ?2, ?3)",
            params![entry.project_id, entry.manager_name, entry.manager_email],
        )?;
        Ok(inserted == 1)
    }

    fn clear(&mut self) -> Result<(), AppError> {
        self.conn.execute("DELETE FROM directory", [])?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<DirectoryEntry>, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, manager_name, manager_email FROM directory ORDER BY project_id",
        )?;
        let out = stmt
            .query_map([], |row| {
                Ok(DirectoryEntry {
                    project_id: row.get(0)?,
                    manager_name: row.get(1)?,
                    manager_email: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn jan() -> Period {
        Period::new(2024, 1).unwrap()
    }

    fn assignment(emp: &str, project: &str, hours: Decimal) -> Assignment {
        Assignment {
            employee_id: emp.to_string(),
            period: jan(),
            project_id: project.to_string(),
            work_location: Some("Pune".to_string()),
            project_description: None,
            project_type: None,
            contract_type: None,
            customer_name: None,
            status: None,
            hours,
        }
    }

    fn consolidated(emp: &str, project: Option<&str>, email: Option<&str>) -> ConsolidatedRecord {
        ConsolidatedRecord {
            employee_id: emp.to_string(),
            period: jan(),
            project_id: project.map(str::to_string),
            allocated_amount: Some(dec!(100.50)),
            allocated_contribution: None,
            role: None,
            band: None,
            function: None,
            work_location: None,
            project_description: None,
            project_type: None,
            contract_type: None,
            customer_name: None,
            manager_name: Some("Jane Doe".to_string()),
            manager_email: email.map(str::to_string),
        }
    }

    #[test]
    fn reopening_with_another_period_format_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paysplit.db");
        drop(Store::open(&path, PeriodFormat::AnchorDate).unwrap());

        assert!(Store::open(&path, PeriodFormat::AnchorDate).is_ok());
        assert!(matches!(
            Store::open(&path, PeriodFormat::MonthToken),
            Err(AppError::PeriodFormatMismatch {
                stored: PeriodFormat::AnchorDate,
                configured: PeriodFormat::MonthToken
            })
        ));
    }

    #[test]
    fn assignments_are_replaced_per_period() {
        let mut store = Store::open_in_memory(PeriodFormat::MonthToken).unwrap();
        store
            .replace_assignments(&[assignment("A1", "P1", dec!(40)), assignment("A1", "P2", dec!(60))])
            .unwrap();
        store.replace_assignments(&[assignment("A1", "P3", dec!(8.5))]).unwrap();

        let stored = store.view().assignments(jan()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].project_id, "P3");
        assert_eq!(stored[0].hours, dec!(8.5));
        assert_eq!(stored[0].work_location.as_deref(), Some("Pune"));
        assert_eq!(store.view().source_periods().unwrap(), vec![jan()]);
    }

    #[test]
    fn directory_load_keeps_existing_rows() {
        let mut store = Store::open_in_memory(PeriodFormat::AnchorDate).unwrap();
        let first = DirectoryEntry {
            project_id: "P1".into(),
            manager_name: Some("Ann".into()),
            manager_email: None,
        };
        let second = DirectoryEntry {
            manager_name: Some("Bob".into()),
            ..first.clone()
        };
        assert_eq!(store.load_directory(&[first], false).unwrap(), 1);
        assert_eq!(store.load_directory(&[second.clone()], false).unwrap(), 0);
        assert_eq!(store.view().directory().unwrap()[0].manager_name.as_deref(), Some("Ann"));

        assert_eq!(store.load_directory(&[second], true).unwrap(), 1);
        assert_eq!(store.view().directory().unwrap()[0].manager_name.as_deref(), Some("Bob"));
    }

    #[test]
    fn failed_transaction_leaves_prior_rows_in_place() {
        let mut store = Store::open_in_memory(PeriodFormat::AnchorDate).unwrap();
        store
            .with_transaction(|s| s.replace_consolidated(jan(), &[consolidated("A1", Some("P1"), None)]))
            .unwrap();

        let result: Result<(), AppError> = store.with_transaction(|s| {
            s.replace_consolidated(jan(), &[consolidated("B1", Some("P7"), None)])?;
            Err(AppError::CorruptValue {
                column: "allocated_amount",
                value: "boom".into(),
            })
        });
        assert!(result.is_err());

        let rows = store.view().consolidated(jan()).unwrap();
        assert_eq!(rows, vec![consolidated("A1", Some("P1"), None)]);
    }

    #[test]
    fn email_fill_only_touches_null_rows() {
        let mut store = Store::open_in_memory(PeriodFormat::AnchorDate).unwrap();
        let index = DirectoryIndex::new(vec![DirectoryEntry {
            project_id: "P6".into(),
            manager_name: Some("jane doe".into()),
            manager_email: Some("jane@example.com".into()),
        }]);
        let filled = store
            .with_transaction(|s| {
                s.replace_consolidated(
                    jan(),
                    &[
                        consolidated("A1", Some("P5"), None),
                        consolidated("A2", None, None),
                        consolidated("A3", Some("P5"), Some("kept@example.com")),
                    ],
                )?;
                s.fill_missing_emails(jan(), &index)
            })
            .unwrap();
        assert_eq!(filled, 2);

        let rows = store.view().consolidated(jan()).unwrap();
        let emails: Vec<Option<&str>> = rows.iter().map(|r| r.manager_email.as_deref()).collect();
        assert_eq!(
            emails,
            vec![Some("jane@example.com"), Some("jane@example.com"), Some("kept@example.com")]
        );
        assert_eq!(store.with_transaction(|s| s.fill_missing_emails(jan(), &index)).unwrap(), 0);
    }
}
