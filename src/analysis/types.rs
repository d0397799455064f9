//! Core telemetry types: hourly records, days, months, and report sections.

use std::fmt;
use std::ops::Range;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Serialize, Serializer};

use super::policy::{COMPLETE_DAY_MIN_RECORDS, MINUTES_PER_READING};
use crate::error::InsufficientData;

/// Average power per channel over one hour (W).
///
/// Sign conventions follow the inverter export:
/// - `battery_w`: positive = charging, negative = discharging
/// - `grid_w`: positive = export, negative = import
/// - `pv_w`, `grid_load_w`, `backup_load_w`: always >= 0
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerAverages {
    pub pv_w: f64,
    pub battery_w: f64,
    pub grid_w: f64,
    pub grid_load_w: f64,
    pub backup_load_w: f64,
}

/// Battery state of charge over one hour (percent).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SocReading {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// One observation for a calendar hour.
///
/// Energies are always derived from the averages and the reading count,
/// never taken from the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRecord {
    /// Calendar date of the observation.
    pub date: NaiveDate,
    /// Hour of day (0-23).
    pub hour: u8,
    /// Number of 5-minute sub-samples aggregated into this hour.
    pub reading_count: u32,
    /// Average power per channel.
    pub power: PowerAverages,
    /// PV energy (kWh).
    pub pv_kwh: f64,
    /// Battery energy (kWh, positive = charged).
    pub battery_kwh: f64,
    /// Grid energy (kWh, positive = exported).
    pub grid_kwh: f64,
    /// Grid-connected load energy (kWh).
    pub grid_load_kwh: f64,
    /// Backup-circuit load energy (kWh).
    pub backup_load_kwh: f64,
    /// State of charge.
    pub soc: SocReading,
}

/// Energy (kWh) represented by `avg_w` held for `readings` 5-minute samples.
pub fn energy_kwh(avg_w: f64, readings: u32) -> f64 {
    avg_w * f64::from(readings) * MINUTES_PER_READING / 60.0 / 1000.0
}

impl HourlyRecord {
    /// Builds a record, deriving every energy field from the averages.
    pub fn new(
        date: NaiveDate,
        hour: u8,
        reading_count: u32,
        power: PowerAverages,
        soc: SocReading,
    ) -> Self {
        Self {
            date,
            hour,
            reading_count,
            pv_kwh: energy_kwh(power.pv_w, reading_count),
            battery_kwh: energy_kwh(power.battery_w, reading_count),
            grid_kwh: energy_kwh(power.grid_w, reading_count),
            grid_load_kwh: energy_kwh(power.grid_load_w, reading_count),
            backup_load_kwh: energy_kwh(power.backup_load_w, reading_count),
            power,
            soc,
        }
    }

    /// Total household load (grid-connected + backup) in kWh.
    pub fn load_kwh(&self) -> f64 {
        self.grid_load_kwh + self.backup_load_kwh
    }

    /// Total household load average in W.
    pub fn load_w(&self) -> f64 {
        self.power.grid_load_w + self.power.backup_load_w
    }

    pub fn import_kwh(&self) -> f64 {
        (-self.grid_kwh).max(0.0)
    }

    pub fn export_kwh(&self) -> f64 {
        self.grid_kwh.max(0.0)
    }

    pub fn charge_kwh(&self) -> f64 {
        self.battery_kwh.max(0.0)
    }

    pub fn discharge_kwh(&self) -> f64 {
        (-self.battery_kwh).max(0.0)
    }

    /// Magnitude of the average grid draw when importing, else 0 (W).
    pub fn import_w(&self) -> f64 {
        (-self.power.grid_w).max(0.0)
    }
}

/// Summed energy per channel (kWh).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyTotals {
    pub pv: f64,
    pub load: f64,
    pub grid_load: f64,
    pub backup_load: f64,
    pub import: f64,
    pub export: f64,
    pub charge: f64,
    pub discharge: f64,
}

impl EnergyTotals {
    /// Adds one hourly record.
    pub fn add(&mut self, r: &HourlyRecord) {
        self.pv += r.pv_kwh;
        self.grid_load += r.grid_load_kwh;
        self.backup_load += r.backup_load_kwh;
        self.load += r.load_kwh();
        self.import += r.import_kwh();
        self.export += r.export_kwh();
        self.charge += r.charge_kwh();
        self.discharge += r.discharge_kwh();
    }

    /// Adds another set of totals.
    pub fn merge(&mut self, other: &Self) {
        self.pv += other.pv;
        self.load += other.load;
        self.grid_load += other.grid_load;
        self.backup_load += other.backup_load;
        self.import += other.import;
        self.export += other.export;
        self.charge += other.charge;
        self.discharge += other.discharge;
    }

    /// Totals over a sequence of records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a HourlyRecord>) -> Self {
        let mut totals = Self::default();
        for r in records {
            totals.add(r);
        }
        totals
    }

    /// Load not met by the grid: `load - import` (battery losses are not
    /// counted as solar offset).
    pub fn self_consumed(&self) -> f64 {
        self.load - self.import
    }

    /// Self-sufficiency in percent, `None` when there is no load.
    pub fn self_sufficiency_pct(&self) -> Option<f64> {
        if self.load > 0.0 {
            Some((1.0 - self.import / self.load) * 100.0)
        } else {
            None
        }
    }

    /// Self-consumption in percent, clamped at 0 and 0 without PV.
    pub fn self_consumption_pct(&self) -> f64 {
        if self.pv > 0.0 {
            (self.self_consumed() / self.pv * 100.0).max(0.0)
        } else {
            0.0
        }
    }
}

/// Calendar month key, rendered `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses `YYYY-MM`.
    pub fn parse(s: &str) -> Option<Self> {
        let (y, m) = s.split_once('-')?;
        if y.len() != 4 || m.len() != 2 {
            return None;
        }
        let year = y.parse().ok()?;
        let month = m.parse().ok()?;
        (1..=12).contains(&month).then_some(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// All records sharing a date.
#[derive(Debug, Clone, PartialEq)]
pub struct Day {
    pub date: NaiveDate,
    /// Records sorted by hour.
    pub records: Vec<HourlyRecord>,
    /// Whether at least 21 hourly rows are present.
    pub is_complete: bool,
    /// EV classification; `None` until the EV pass runs and for incomplete days.
    pub is_ev_day: Option<bool>,
    pub totals: EnergyTotals,
}

impl Day {
    /// Builds a day from records of a single date.
    pub fn new(date: NaiveDate, mut records: Vec<HourlyRecord>) -> Self {
        records.sort_by_key(|r| r.hour);
        let totals = EnergyTotals::from_records(&records);
        Self {
            date,
            is_complete: records.len() >= COMPLETE_DAY_MIN_RECORDS,
            records,
            is_ev_day: None,
            totals,
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::of(self.date)
    }

    /// True only for complete days classified as EV days.
    pub fn is_ev(&self) -> bool {
        self.is_ev_day == Some(true)
    }

    /// True only for complete days classified as non-EV days.
    pub fn is_non_ev(&self) -> bool {
        self.is_ev_day == Some(false)
    }

    /// Average SOC of the first hour.
    pub fn start_soc(&self) -> Option<f64> {
        self.records.first().map(|r| r.soc.avg)
    }

    /// Average SOC of the last hour.
    pub fn end_soc(&self) -> Option<f64> {
        self.records.last().map(|r| r.soc.avg)
    }

    pub fn max_soc(&self) -> Option<f64> {
        self.records.iter().map(|r| r.soc.max).reduce(f64::max)
    }

    pub fn min_soc(&self) -> Option<f64> {
        self.records.iter().map(|r| r.soc.min).reduce(f64::min)
    }

    /// Record for `hour`, if present.
    pub fn record_at(&self, hour: u8) -> Option<&HourlyRecord> {
        self.records.iter().find(|r| r.hour == hour)
    }
}

/// Days sharing a calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct Month {
    pub key: YearMonth,
    /// Index range into [`Dataset::days`].
    pub days: Range<usize>,
    pub totals: EnergyTotals,
    pub complete_days: usize,
}

impl Month {
    /// Number of days with any data.
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// Average daily PV over days with data.
    pub fn avg_daily_pv(&self) -> f64 {
        if self.days.is_empty() {
            0.0
        } else {
            self.totals.pv / self.days.len() as f64
        }
    }

    /// Average daily load over days with data.
    pub fn avg_daily_load(&self) -> f64 {
        if self.days.is_empty() {
            0.0
        } else {
            self.totals.load / self.days.len() as f64
        }
    }

    /// Round-trip battery efficiency in percent, `None` without charging.
    pub fn battery_efficiency_pct(&self) -> Option<f64> {
        if self.totals.charge > 0.0 {
            Some(self.totals.discharge / self.totals.charge * 100.0)
        } else {
            None
        }
    }
}

/// Non-fatal data issue surfaced in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// A row was dropped.
    DroppedRow {
        file: String,
        line: u64,
        reason: String,
    },
    /// A second row for an hour already seen was ignored.
    DuplicateHour {
        file: String,
        line: u64,
        date: NaiveDate,
        hour: u8,
    },
    /// A day has too few rows to be compared with other days.
    IncompleteDay { date: NaiveDate, records: usize },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DroppedRow { file, line, reason } => {
                write!(f, "{file}: line {line}: row dropped: {reason}")
            }
            Self::DuplicateHour {
                file,
                line,
                date,
                hour,
            } => write!(f, "{file}: line {line}: duplicate {date} {hour:02}:00 ignored"),
            Self::IncompleteDay { date, records } => {
                write!(f, "{date}: only {records} hourly rows, day marked incomplete")
            }
        }
    }
}

/// A telemetry file whose rows were discarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedFile {
    pub file: String,
    pub reason: String,
}

/// A report section: the computed value or the reason it is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Computed(T),
    NotComputed(NotComputed),
}

/// Self-describing "not computed" marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotComputed {
    /// Always `"not_computed"`.
    pub status: &'static str,
    pub kind: InsufficientData,
    pub reason: String,
}

impl<T> Section<T> {
    /// The computed value, if any.
    pub fn computed(&self) -> Option<&T> {
        match self {
            Self::Computed(value) => Some(value),
            Self::NotComputed(_) => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    /// The reason the section is missing, if it is.
    pub fn missing_reason(&self) -> Option<InsufficientData> {
        match self {
            Self::Computed(_) => None,
            Self::NotComputed(nc) => Some(nc.kind),
        }
    }
}

impl<T> From<Result<T, InsufficientData>> for Section<T> {
    fn from(result: Result<T, InsufficientData>) -> Self {
        match result {
            Ok(value) => Self::Computed(value),
            Err(kind) => Self::NotComputed(NotComputed {
                status: "not_computed",
                kind,
                reason: kind.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap_or_default()
    }

    fn record(hour: u8, pv_w: f64, grid_w: f64, battery_w: f64) -> HourlyRecord {
        HourlyRecord::new(
            date(2),
            hour,
            12,
            PowerAverages {
                pv_w,
                battery_w,
                grid_w,
                grid_load_w: 400.0,
                backup_load_w: 100.0,
            },
            SocReading {
                avg: 50.0,
                min: 49.0,
                max: 51.0,
            },
        )
    }

    #[test]
    fn energy_recomputed_from_averages() {
        // 1200 W for 12 x 5 min = 1.2 kWh
        let r = record(10, 1200.0, -600.0, -300.0);
        assert!((r.pv_kwh - 1.2).abs() < 1e-12);
        assert!((r.import_kwh() - 0.6).abs() < 1e-12);
        assert_eq!(r.export_kwh(), 0.0);
        assert!((r.discharge_kwh() - 0.3).abs() < 1e-12);
        assert!((r.load_kwh() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn partial_hour_scales_energy() {
        let r = HourlyRecord::new(date(2), 0, 6, PowerAverages::default(), SocReading::default());
        assert_eq!(r.pv_kwh, 0.0);
        assert!((energy_kwh(1000.0, 6) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn completeness_threshold() {
        let full: Vec<_> = (0..21).map(|h| record(h, 0.0, 0.0, 0.0)).collect();
        let short: Vec<_> = (0..20).map(|h| record(h, 0.0, 0.0, 0.0)).collect();
        assert!(Day::new(date(2), full).is_complete);
        assert!(!Day::new(date(2), short).is_complete);
    }

    #[test]
    fn self_sufficiency_undefined_without_load() {
        let totals = EnergyTotals::default();
        assert_eq!(totals.self_sufficiency_pct(), None);
        assert_eq!(totals.self_consumption_pct(), 0.0);
    }

    #[test]
    fn year_month_round_trip_text() {
        let ym = YearMonth::parse("2025-03");
        assert_eq!(ym, Some(YearMonth { year: 2025, month: 3 }));
        assert_eq!(ym.map(|m| m.to_string()).as_deref(), Some("2025-03"));
        assert_eq!(YearMonth::parse("2025-13"), None);
        assert_eq!(YearMonth::parse("25-03"), None);
    }

    #[test]
    fn section_serializes_reason() {
        let section: Section<u32> = Err(InsufficientData::NoBattery).into();
        let json = serde_json::to_value(&section).ok();
        let status = json
            .as_ref()
            .and_then(|v| v.get("status"))
            .and_then(|v| v.as_str());
        assert_eq!(status, Some("not_computed"));
        let kind = json
            .as_ref()
            .and_then(|v| v.get("kind"))
            .and_then(|v| v.as_str());
        assert_eq!(kind, Some("no_battery"));
    }
}
