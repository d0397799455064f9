//! Report export: full JSON and a monthly CSV summary.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::analysis::monthly::{EnergyBalance, MonthlyTotals};

/// Column header for the monthly summary.
const MONTHLY_HEADER: &str = "month,days,complete_days,pv_kwh,load_kwh,grid_import_kwh,\
                              grid_export_kwh,battery_charge_kwh,battery_discharge_kwh,\
                              self_consumed_kwh,self_consumption_pct,self_sufficiency_pct";

/// Exports the monthly summary to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_monthly_csv(totals: &MonthlyTotals, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_monthly_csv(totals, io::BufWriter::new(file))
}

/// Writes one row per month followed by an `all` row.
///
/// An unknown self-sufficiency is written as an empty field.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_monthly_csv(totals: &MonthlyTotals, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(MONTHLY_HEADER.split(',').map(str::trim))?;

    let rows = totals
        .months
        .iter()
        .map(|m| (m.month.to_string(), &m.balance))
        .chain(std::iter::once(("all".to_string(), &totals.overall)));
    for (label, b) in rows {
        wtr.write_record(balance_row(label, b))?;
    }

    wtr.flush()?;
    Ok(())
}

fn balance_row(label: String, b: &EnergyBalance) -> [String; 12] {
    [
        label,
        b.days.to_string(),
        b.complete_days.to_string(),
        format!("{:.3}", b.total_pv),
        format!("{:.3}", b.total_load),
        format!("{:.3}", b.grid_import),
        format!("{:.3}", b.grid_export),
        format!("{:.3}", b.battery_charge),
        format!("{:.3}", b.battery_discharge),
        format!("{:.3}", b.self_consumed),
        format!("{:.1}", b.self_consumption_pct),
        b.self_sufficiency_pct
            .map(|v| format!("{v:.1}"))
            .unwrap_or_default(),
    ]
}

/// Serializes any report value as JSON, followed by a newline.
///
/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_json<T: Serialize>(value: &T, mut writer: impl Write, pretty: bool) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    writer.flush()
}
