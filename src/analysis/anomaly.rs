//! Day-level anomaly detection.
//!
//! Three independent detectors run over complete days: PV shortfall against a
//! recent reference, load spikes on non-EV days, and poor battery round-trip
//! efficiency on days that end near their starting SOC.

use chrono::NaiveDate;
use serde::Serialize;

use super::classify::Dataset;
use super::policy::{
    BATTERY_EFFICIENCY_FLOOR, BATTERY_MIN_CHARGE_KWH, BATTERY_SOC_BALANCE_PCT, LOAD_SPIKE_MIN_DAYS,
    LOAD_SPIKE_SIGMA, PV_REFERENCE_WINDOW_DAYS, PV_SHORTFALL_RATIO, PV_WARMUP_DAYS,
};
use super::stats::{mean, relative_change, stdev};
use super::types::Day;
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    PvShortfall,
    LoadSpike,
    BatteryEfficiency,
}

/// One flagged day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub kind: AnomalyKind,
    /// Daily PV or load (kWh), or round-trip efficiency (%).
    pub observed: f64,
    /// Reference the observation was compared with, in the same unit.
    pub expected: f64,
    pub deviation_pct: Option<f64>,
}

impl Anomaly {
    fn new(date: NaiveDate, kind: AnomalyKind, observed: f64, expected: f64) -> Self {
        Self {
            date,
            kind,
            observed,
            expected,
            deviation_pct: relative_change(expected, observed).map(|c| c * 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomalies {
    /// Flags ordered by date, then detector.
    pub items: Vec<Anomaly>,
    pub pv_shortfall_count: usize,
    pub load_spike_count: usize,
    pub battery_efficiency_count: usize,
    /// No detector flagged anything.
    pub normal_operation: bool,
}

/// Runs every detector over the complete days of `dataset`.
///
/// # Errors
///
/// [`InsufficientData::NoData`] or [`InsufficientData::NoCompleteDays`].
pub fn compute(dataset: &Dataset, config: &AnalysisConfig) -> Result<Anomalies, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let complete: Vec<&Day> = dataset.complete_days().collect();
    if complete.is_empty() {
        return Err(InsufficientData::NoCompleteDays);
    }

    let mut items = pv_shortfalls(&complete);
    items.extend(load_spikes(&complete));
    if config.has_battery {
        items.extend(battery_efficiency(&complete));
    }
    items.sort_by(|a, b| (a.date, a.kind).cmp(&(b.date, b.kind)));

    let count = |kind| items.iter().filter(|a| a.kind == kind).count();
    Ok(Anomalies {
        pv_shortfall_count: count(AnomalyKind::PvShortfall),
        load_spike_count: count(AnomalyKind::LoadSpike),
        battery_efficiency_count: count(AnomalyKind::BatteryEfficiency),
        normal_operation: items.is_empty(),
        items,
    })
}

/// Reference PV for the `i`-th complete day.
///
/// Only earlier days count: the trailing window once enough history exists,
/// otherwise the earlier days of the same month, or every earlier day when
/// the month has just started.
fn pv_reference(days: &[&Day], i: usize) -> Option<f64> {
    let history = &days[i.saturating_sub(PV_REFERENCE_WINDOW_DAYS)..i];
    let all: Vec<f64> = history.iter().map(|d| d.totals.pv).collect();
    if i >= PV_REFERENCE_WINDOW_DAYS {
        return mean(&all);
    }
    let month = days[i].month();
    let same_month: Vec<f64> = history
        .iter()
        .filter(|d| d.month() == month)
        .map(|d| d.totals.pv)
        .collect();
    mean(&same_month).or_else(|| mean(&all))
}

fn pv_shortfalls(days: &[&Day]) -> Vec<Anomaly> {
    (PV_WARMUP_DAYS..days.len())
        .filter_map(|i| {
            let reference = pv_reference(days, i).filter(|r| *r > 0.0)?;
            let pv = days[i].totals.pv;
            (pv < reference * PV_SHORTFALL_RATIO)
                .then(|| Anomaly::new(days[i].date, AnomalyKind::PvShortfall, pv, reference))
        })
        .collect()
}

fn load_spikes(days: &[&Day]) -> Vec<Anomaly> {
    let non_ev: Vec<&Day> = days.iter().copied().filter(|d| d.is_non_ev()).collect();
    if non_ev.len() < LOAD_SPIKE_MIN_DAYS {
        return Vec::new();
    }
    let loads: Vec<f64> = non_ev.iter().map(|d| d.totals.load).collect();
    let Some(load_mean) = mean(&loads) else {
        return Vec::new();
    };
    let limit = load_mean + LOAD_SPIKE_SIGMA * stdev(&loads);

    non_ev
        .iter()
        .filter(|d| d.totals.load > limit)
        .map(|d| Anomaly::new(d.date, AnomalyKind::LoadSpike, d.totals.load, load_mean))
        .collect()
}

fn battery_efficiency(days: &[&Day]) -> Vec<Anomaly> {
    days.iter()
        .filter(|d| {
            let balanced = match (d.start_soc(), d.end_soc()) {
                (Some(s), Some(e)) => (s - e).abs() <= BATTERY_SOC_BALANCE_PCT,
                _ => false,
            };
            balanced && d.totals.charge > BATTERY_MIN_CHARGE_KWH
        })
        .filter_map(|d| {
            let efficiency = d.totals.discharge / d.totals.charge;
            (efficiency < BATTERY_EFFICIENCY_FLOOR).then(|| {
                Anomaly::new(
                    d.date,
                    AnomalyKind::BatteryEfficiency,
                    efficiency * 100.0,
                    BATTERY_EFFICIENCY_FLOOR * 100.0,
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ev;
    use crate::analysis::types::{HourlyRecord, PowerAverages, SocReading};

    fn day(date: NaiveDate, pv_w: f64, load_w: f64, battery_w: f64) -> Vec<HourlyRecord> {
        (0..24u8)
            .map(|h| {
                let pv = if (9..15).contains(&h) { pv_w } else { 0.0 };
                let battery = match h {
                    10 => battery_w,
                    21 => -battery_w * 0.5,
                    _ => 0.0,
                };
                HourlyRecord::new(
                    date,
                    h,
                    12,
                    PowerAverages {
                        pv_w: pv,
                        battery_w: battery,
                        grid_w: pv - load_w - battery,
                        grid_load_w: load_w,
                        backup_load_w: 0.0,
                    },
                    SocReading {
                        avg: 50.0,
                        min: 50.0,
                        max: 50.0,
                    },
                )
            })
            .collect()
    }

    fn dataset(days: &[(f64, f64, f64)]) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date");
        let records = days
            .iter()
            .enumerate()
            .flat_map(|(i, (pv, load, bat))| {
                day(start + chrono::Days::new(i as u64), *pv, *load, *bat)
            })
            .collect();
        let mut ds = Dataset::from_records(records);
        ev::classify(&mut ds, &AnalysisConfig::new(5.0));
        ds
    }

    #[test]
    fn cloudy_day_after_warmup_is_flagged() {
        let mut days = vec![(2000.0, 400.0, 0.0); 6];
        days.push((500.0, 400.0, 0.0));
        let ds = dataset(&days);
        let a = compute(&ds, &AnalysisConfig::new(5.0)).expect("complete days");
        assert_eq!(a.pv_shortfall_count, 1);
        assert_eq!(a.items[0].date.to_string(), "2025-05-07");
        assert!(!a.normal_operation);
    }

    #[test]
    fn fault_onset_is_flagged_until_it_dominates_history() {
        // 12 kWh for three days, 6 kWh once, then 3 kWh for the rest of May
        let mut days = vec![(2000.0, 400.0, 0.0); 3];
        days.push((1000.0, 400.0, 0.0));
        days.extend(vec![(500.0, 400.0, 0.0); 27]);
        let ds = dataset(&days);
        let a = compute(&ds, &AnalysisConfig::new(5.0)).expect("complete days");

        let flagged: Vec<String> = a.items.iter().map(|x| x.date.to_string()).collect();
        assert_eq!(flagged.first().map(String::as_str), Some("2025-05-04"));
        assert_eq!(a.pv_shortfall_count, 12);
        assert_eq!(flagged.last().map(String::as_str), Some("2025-05-15"));
        assert!((a.items[0].expected - 12.0).abs() < 1e-9);
    }

    #[test]
    fn trailing_window_sets_the_reference_after_two_weeks() {
        // 10 dim days, 15 bright days, then one half-bright day
        let mut days = vec![(500.0, 400.0, 0.0); 10];
        days.extend(vec![(2000.0, 400.0, 0.0); 15]);
        days.push((1000.0, 400.0, 0.0));
        let ds = dataset(&days);
        let a = compute(&ds, &AnalysisConfig::new(5.0)).expect("complete days");

        // against every earlier day (8.4 kWh) the 6 kWh day would pass
        assert_eq!(a.pv_shortfall_count, 1);
        assert_eq!(a.items[0].date.to_string(), "2025-05-26");
        assert!((a.items[0].expected - 12.0).abs() < 1e-9);
    }

    #[test]
    fn warmup_days_never_flagged() {
        let ds = dataset(&[(2000.0, 400.0, 0.0), (100.0, 400.0, 0.0), (100.0, 400.0, 0.0)]);
        let a = compute(&ds, &AnalysisConfig::new(5.0)).expect("complete days");
        assert_eq!(a.pv_shortfall_count, 0);
    }

    #[test]
    fn load_spike_needs_five_days() {
        let mut days = vec![(2000.0, 400.0, 0.0); 9];
        days.push((2000.0, 1500.0, 0.0));
        let ds = dataset(&days);
        let a = compute(&ds, &AnalysisConfig::new(5.0)).expect("complete days");
        assert_eq!(a.load_spike_count, 1);

        let ds = dataset(&[(2000.0, 400.0, 0.0), (2000.0, 400.0, 0.0), (2000.0, 1500.0, 0.0)]);
        let a = compute(&ds, &AnalysisConfig::new(5.0)).expect("complete days");
        assert_eq!(a.load_spike_count, 0);
    }

    #[test]
    fn lossy_battery_day_flagged() {
        // 2 kWh charged, 1 kWh discharged, SOC balanced
        let ds = dataset(&[(2000.0, 400.0, 2000.0)]);
        let a = compute(&ds, &AnalysisConfig::new(5.0)).expect("complete days");
        assert_eq!(a.battery_efficiency_count, 1);
        assert!((a.items[0].observed - 50.0).abs() < 1e-9);
    }

    #[test]
    fn all_zero_days_are_normal() {
        let ds = dataset(&[(0.0, 0.0, 0.0); 8]);
        let a = compute(&ds, &AnalysisConfig::new(5.0)).expect("complete days");
        assert!(a.normal_operation);
    }
}
