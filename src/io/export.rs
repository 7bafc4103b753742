//! CSV export for the reading ledger.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::store::ValueRecord;

/// Column header for the ledger CSV export.
const HEADER: [&str; 6] = ["point", "building", "room", "measurement", "time", "value"];

/// Exports ledger records to a CSV file at the given path.
///
/// Writes a header row followed by one row per record in the order given.
/// Identical input produces identical output.
///
/// # Arguments
///
/// * `records` - Ledger records, typically a [`MemoryStore::records`](crate::store::MemoryStore::records) snapshot
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[ValueRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_csv(records, io::BufWriter::new(file))
}

/// Writes ledger records as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(records: &[ValueRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER)?;

    for r in records {
        wtr.write_record(&[
            r.point.to_string(),
            r.building.to_string(),
            r.room.to_string(),
            r.measurement.to_string(),
            r.time.to_string(),
            r.value.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
