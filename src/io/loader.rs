//! Loads monthly hourly-telemetry CSV files.
//!
//! Each file is named `<prefix>_YYYY-MM.csv` and carries the 16-column
//! inverter export layout. A file with an unusable header or key column is
//! rejected as a whole; a row with a bad numeric field or a sign/SOC
//! violation is dropped with a warning and the rest of the file still loads.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{debug, warn};

use crate::analysis::classify::Dataset;
use crate::analysis::policy::SOC_ORDER_TOLERANCE_PCT;
use crate::analysis::types::{DataWarning, HourlyRecord, PowerAverages, RejectedFile, SocReading, YearMonth};
use crate::error::InputFormatError;

/// Expected header, in order.
pub const HEADER: [&str; 16] = [
    "Date",
    "Hour",
    "Readings",
    "Avg_PV_W",
    "PV_Energy_kWh",
    "Avg_Battery_W",
    "Battery_Energy_kWh",
    "Avg_Grid_W",
    "Grid_Energy_kWh",
    "Avg_GridLoad_W",
    "GridLoad_Energy_kWh",
    "Avg_BackupLoad_W",
    "BackupLoad_Energy_kWh",
    "Avg_SOC_Pct",
    "Min_SOC_Pct",
    "Max_SOC_Pct",
];

/// Lists `<prefix>_YYYY-MM.csv` files in `dir`, sorted by name.
///
/// # Errors
///
/// Returns an `io::Error` if the directory cannot be read.
pub fn discover_files(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(prefix))
            .and_then(|n| n.strip_prefix('_'))
            .and_then(|n| n.strip_suffix(".csv"))
            .and_then(YearMonth::parse)
            .is_some();
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "discovered telemetry files");
    Ok(files)
}

/// Everything read from a set of files.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Accepted records, sorted by (date, hour).
    pub records: Vec<HourlyRecord>,
    /// Dropped and duplicate rows.
    pub warnings: Vec<DataWarning>,
    /// Files rejected as a whole.
    pub file_errors: Vec<InputFormatError>,
    /// Names of the files that loaded.
    pub files: Vec<String>,
}

impl LoadOutcome {
    /// Classifies the records, carrying warnings and file names along.
    pub fn into_dataset(self) -> Dataset {
        let mut dataset = Dataset::from_records(self.records);
        let mut warnings = self.warnings;
        warnings.append(&mut dataset.warnings);
        dataset.warnings = warnings;
        dataset.files = self.files;
        dataset.rejected_files = self
            .file_errors
            .iter()
            .map(|e| RejectedFile {
                file: e.file().to_string(),
                reason: e.to_string(),
            })
            .collect();
        dataset
    }
}

/// Loads every file in order.
///
/// A rejected file does not stop the others. When two rows share a date and
/// hour the first one read wins.
pub fn load_files(paths: &[PathBuf]) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    let mut seen: BTreeSet<(NaiveDate, u8)> = BTreeSet::new();

    for path in paths {
        let rows = match load_file(path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "telemetry file rejected");
                outcome.file_errors.push(e);
                continue;
            }
        };
        debug!(
            file = %rows.file,
            records = rows.records.len(),
            dropped = rows.warnings.len(),
            "loaded telemetry file"
        );
        outcome.warnings.extend(rows.warnings);
        for (line, record) in rows.records {
            if seen.insert((record.date, record.hour)) {
                outcome.records.push(record);
            } else {
                warn!(file = %rows.file, line, date = %record.date, hour = record.hour, "duplicate hour ignored");
                outcome.warnings.push(DataWarning::DuplicateHour {
                    file: rows.file.clone(),
                    line,
                    date: record.date,
                    hour: record.hour,
                });
            }
        }
        outcome.files.push(rows.file);
    }

    outcome
        .records
        .sort_by(|a, b| (a.date, a.hour).cmp(&(b.date, b.hour)));
    outcome
}

struct FileRows {
    file: String,
    records: Vec<(u64, HourlyRecord)>,
    warnings: Vec<DataWarning>,
}

/// A row that cannot be used: fatal ones reject the file.
enum RowFault {
    Fatal(String),
    Drop(String),
}

fn load_file(path: &Path) -> Result<FileRows, InputFormatError> {
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let month = file
        .strip_suffix(".csv")
        .and_then(|stem| stem.rsplit_once('_'))
        .and_then(|(_, ym)| YearMonth::parse(ym))
        .ok_or_else(|| InputFormatError::FileName { file: file.clone() })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| InputFormatError::Csv {
            file: file.clone(),
            source,
        })?;
    check_header(&file, reader.headers())?;

    let mut rows = FileRows {
        file,
        records: Vec::new(),
        warnings: Vec::new(),
    };
    for result in reader.records() {
        let record = result.map_err(|source| InputFormatError::Csv {
            file: rows.file.clone(),
            source,
        })?;
        let line = record.position().map_or(0, csv::Position::line);
        match parse_row(&record, month) {
            Ok(r) => rows.records.push((line, r)),
            Err(RowFault::Fatal(detail)) => {
                return Err(InputFormatError::Row {
                    file: rows.file,
                    line,
                    detail,
                });
            }
            Err(RowFault::Drop(reason)) => {
                warn!(file = %rows.file, line, %reason, "row dropped");
                rows.warnings.push(DataWarning::DroppedRow {
                    file: rows.file.clone(),
                    line,
                    reason,
                });
            }
        }
    }
    Ok(rows)
}

fn check_header(file: &str, headers: csv::Result<&StringRecord>) -> Result<(), InputFormatError> {
    let headers = headers.map_err(|source| InputFormatError::Csv {
        file: file.to_string(),
        source,
    })?;
    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    if found == HEADER {
        return Ok(());
    }
    let detail = match HEADER.iter().zip(&found).position(|(want, got)| want != got) {
        Some(i) => format!("column {}: expected `{}`, found `{}`", i + 1, HEADER[i], found[i]),
        None => format!("expected {} columns, found {}", HEADER.len(), found.len()),
    };
    Err(InputFormatError::Header {
        file: file.to_string(),
        line: 1,
        detail,
    })
}

fn parse_row(record: &StringRecord, month: YearMonth) -> Result<HourlyRecord, RowFault> {
    if record.len() != HEADER.len() {
        return Err(RowFault::Fatal(format!(
            "expected {} fields, found {}",
            HEADER.len(),
            record.len()
        )));
    }
    let date = NaiveDate::parse_from_str(record[0].trim(), "%Y-%m-%d")
        .map_err(|_| RowFault::Fatal(format!("unparsable Date `{}`", &record[0])))?;
    let hour = parse_hour(record[1].trim())
        .ok_or_else(|| RowFault::Fatal(format!("unparsable Hour `{}`", &record[1])))?;

    let reading_count: u32 = record[2]
        .trim()
        .parse()
        .map_err(|_| RowFault::Drop(format!("Readings: `{}` is not a count", &record[2])))?;
    let mut values = [0.0_f64; 16];
    for i in 3..HEADER.len() {
        values[i] = number(record, i)?;
    }

    let power = PowerAverages {
        pv_w: values[3],
        battery_w: values[5],
        grid_w: values[7],
        grid_load_w: values[9],
        backup_load_w: values[11],
    };
    let soc = SocReading {
        avg: values[13],
        min: values[14],
        max: values[15],
    };

    if YearMonth::of(date) != month {
        return Err(RowFault::Drop(format!("{date} is outside {month}")));
    }
    for (name, w) in [
        ("Avg_PV_W", power.pv_w),
        ("Avg_GridLoad_W", power.grid_load_w),
        ("Avg_BackupLoad_W", power.backup_load_w),
    ] {
        if w < 0.0 {
            return Err(RowFault::Drop(format!("{name} is negative ({w})")));
        }
    }
    if soc.min > soc.avg + SOC_ORDER_TOLERANCE_PCT || soc.avg > soc.max + SOC_ORDER_TOLERANCE_PCT {
        return Err(RowFault::Drop(format!(
            "SOC out of order (min {}, avg {}, max {})",
            soc.min, soc.avg, soc.max
        )));
    }
    if [soc.avg, soc.min, soc.max]
        .iter()
        .any(|v| !(0.0..=100.0).contains(v))
    {
        return Err(RowFault::Drop("SOC outside 0-100".to_string()));
    }

    Ok(HourlyRecord::new(date, hour, reading_count, power, soc))
}

/// `HH:00` (or a bare hour number) to 0-23.
fn parse_hour(s: &str) -> Option<u8> {
    let hour = match s.split_once(':') {
        Some((h, m)) => {
            if m.trim().parse::<u8>().ok()? != 0 {
                return None;
            }
            h
        }
        None => s,
    };
    hour.trim().parse::<u8>().ok().filter(|h| *h < 24)
}

fn number(record: &StringRecord, i: usize) -> Result<f64, RowFault> {
    record[i]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RowFault::Drop(format!("{}: `{}` is not a number", HEADER[i], &record[i])))
}
