// src/export.rs
use std::io;
use std::path::Path;
use tracing::info;

use crate::error::AppError;
use crate::model::ConsolidatedRecord;

pub fn write_records<W: io::Write>(writer: W, records: &[ConsolidatedRecord]) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes a period's consolidated rows as CSV, one header line plus one line per record.
pub fn export_csv(path: &Path, records: &[ConsolidatedRecord]) -> Result<usize, AppError> {
    let file = std::fs::File::create(path)?;
    write_records(io::BufWriter::new(file), records)?;
    info!("Exported {} consolidated records to {}", records.len(), path.display());
    Ok(records.len())
}
