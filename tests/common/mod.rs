//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use solar_report::analysis::classify::Dataset;
use solar_report::analysis::types::{HourlyRecord, PowerAverages, SocReading};
use solar_report::io::loader::HEADER;

/// Readings per hour in every fixture row (one per 5 minutes).
pub const READINGS: u32 = 12;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// One full-hour row. With 12 readings, `W / 1000` is the hour's kWh.
pub fn hour(date: NaiveDate, hour: u8, power: PowerAverages, soc: f64) -> HourlyRecord {
    HourlyRecord::new(
        date,
        hour,
        READINGS,
        power,
        SocReading {
            avg: soc,
            min: soc,
            max: soc,
        },
    )
}

/// A 24-row day with daily totals spread evenly over every hour.
///
/// Net grid flow per hour is `(export - import) / 24`, so a day should not
/// both import and export.
pub fn uniform_day(
    date: NaiveDate,
    pv_kwh: f64,
    load_kwh: f64,
    import_kwh: f64,
    export_kwh: f64,
) -> Vec<HourlyRecord> {
    let w = |kwh: f64| kwh * 1000.0 / 24.0;
    (0..24u8)
        .map(|h| {
            hour(
                date,
                h,
                PowerAverages {
                    pv_w: w(pv_kwh),
                    grid_w: w(export_kwh) - w(import_kwh),
                    grid_load_w: w(load_kwh),
                    ..PowerAverages::default()
                },
                0.0,
            )
        })
        .collect()
}

/// A grid-only day importing `load_kwh`, evenly spread.
pub fn load_only_day(date: NaiveDate, load_kwh: f64) -> Vec<HourlyRecord> {
    uniform_day(date, 0.0, load_kwh, load_kwh, 0.0)
}

/// A day of all-zero rows.
pub fn zero_day(date: NaiveDate) -> Vec<HourlyRecord> {
    uniform_day(date, 0.0, 0.0, 0.0, 0.0)
}

/// A calendar month of plausible telemetry with seeded noise.
///
/// PV follows a daylight bell, the battery soaks surplus and covers the
/// evening, and the grid balances the rest, so every row respects the
/// sign conventions.
pub fn noisy_month(seed: u64, year: i32, month: u32, pv_kwp: f64) -> Vec<HourlyRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let capacity_kwh = 10.0;
    let mut soc = 50.0_f64;
    let mut records = Vec::new();

    let mut day = date(year, month, 1);
    while day.month() == month {
        let cloud: f64 = rng.random_range(0.3..1.0);
        for h in 0..24u8 {
            let x = (f64::from(h) - 12.5) / 3.5;
            let pv_w = if (6..19).contains(&h) {
                (pv_kwp * 1000.0 * cloud * (-x * x).exp()).round()
            } else {
                0.0
            };
            let base: f64 = if (17..22).contains(&h) { 900.0 } else { 350.0 };
            let load_w = (base + rng.random_range(0.0..250.0)).round();

            let surplus = pv_w - load_w;
            let battery_w = if surplus > 0.0 {
                surplus.min((100.0 - soc) / 100.0 * capacity_kwh * 1000.0).min(3000.0)
            } else {
                -(-surplus).min(soc / 100.0 * capacity_kwh * 1000.0 - 1000.0).max(0.0)
            }
            .round();
            let start_soc = soc;
            soc = (soc + battery_w / (capacity_kwh * 1000.0) * 100.0).clamp(0.0, 100.0);
            let grid_w = pv_w - load_w - battery_w;

            records.push(HourlyRecord::new(
                day,
                h,
                READINGS,
                PowerAverages {
                    pv_w,
                    battery_w,
                    grid_w,
                    grid_load_w: load_w,
                    backup_load_w: 0.0,
                },
                SocReading {
                    avg: (start_soc + soc) / 2.0,
                    min: start_soc.min(soc),
                    max: start_soc.max(soc),
                },
            ));
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    records
}

pub fn dataset(records: Vec<HourlyRecord>) -> Dataset {
    Dataset::from_records(records)
}

/// Writes records as a `<prefix>_YYYY-MM.csv` file and returns its path.
pub fn write_month_csv(
    dir: &Path,
    prefix: &str,
    year: i32,
    month: u32,
    records: &[HourlyRecord],
) -> PathBuf {
    let path = dir.join(format!("{prefix}_{year:04}-{month:02}.csv"));
    let mut f = fs::File::create(&path).expect("create csv");
    writeln!(f, "{}", HEADER.join(",")).expect("write header");
    for r in records {
        writeln!(f, "{}", csv_row(r)).expect("write row");
    }
    path
}

/// One record in the input column layout.
pub fn csv_row(r: &HourlyRecord) -> String {
    let p = &r.power;
    format!(
        "{},{:02}:00,{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        r.date,
        r.hour,
        r.reading_count,
        p.pv_w,
        r.pv_kwh,
        p.battery_w,
        r.battery_kwh,
        p.grid_w,
        r.grid_kwh,
        p.grid_load_w,
        r.grid_load_kwh,
        p.backup_load_w,
        r.backup_load_kwh,
        r.soc.avg,
        r.soc.min,
        r.soc.max,
    )
}
