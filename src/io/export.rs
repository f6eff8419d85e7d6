//! CSV export for the energy history log.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::history::EnergyHistoryRecord;

/// Column header for CSV history export.
const HEADER: &str = "timestamp,total_consumption_kw,solar_output_kw,wind_output_kw,\
                      battery_level_kw,net_grid_load_kw,weather_condition";

/// Exports history records to a CSV file at the given path.
///
/// Writes a header row followed by one data row per record, in the order
/// given. Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[EnergyHistoryRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, buf)
}

/// Writes history records as CSV to any writer.
pub fn write_csv(records: &[EnergyHistoryRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in records {
        wtr.write_record(&[
            r.timestamp_ms.to_string(),
            format!("{:.4}", r.total_consumption_kw),
            format!("{:.4}", r.solar_output_kw),
            format!("{:.4}", r.wind_output_kw),
            format!("{:.4}", r.battery_level_kw),
            format!("{:.4}", r.net_grid_load_kw),
            r.weather_condition.as_str().to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
