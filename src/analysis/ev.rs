//! EV charging day detection and EV/non-EV day profiles.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::classify::Dataset;
use super::policy::{EV_THRESHOLD_FLOOR_KWH, EV_THRESHOLD_FRACTION, EVENING_HOURS};
use super::stats::mean;
use super::types::Day;
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

/// Load margin used to flag EV days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvThreshold {
    /// Mean daily load over complete days (kWh).
    pub mean_daily_load: f64,
    /// `max(8, 0.3 * mean)` (kWh).
    pub threshold_kwh: f64,
}

impl EvThreshold {
    /// Threshold over the complete days of `dataset`, `None` when there are none.
    pub fn from_dataset(dataset: &Dataset) -> Option<Self> {
        let loads: Vec<f64> = dataset.complete_days().map(|d| d.totals.load).collect();
        let mean_daily_load = mean(&loads)?;
        Some(Self {
            mean_daily_load,
            threshold_kwh: EV_THRESHOLD_FLOOR_KWH.max(EV_THRESHOLD_FRACTION * mean_daily_load),
        })
    }

    /// Daily load above which a day is an EV day.
    pub fn cutoff_kwh(&self) -> f64 {
        self.mean_daily_load + self.threshold_kwh
    }

    pub fn is_ev(&self, day: &Day) -> bool {
        day.totals.load > self.cutoff_kwh()
    }
}

/// Flags every complete day as EV or non-EV.
///
/// Without an EV configured all complete days are non-EV. Returns the
/// threshold that was applied, if any.
pub fn classify(dataset: &mut Dataset, config: &AnalysisConfig) -> Option<EvThreshold> {
    if !config.has_ev {
        dataset.mark_ev_days(|_| false);
        return None;
    }
    let threshold = EvThreshold::from_dataset(dataset)?;
    dataset.mark_ev_days(|day| threshold.is_ev(day));
    debug!(
        mean_daily_load = threshold.mean_daily_load,
        cutoff = threshold.cutoff_kwh(),
        "classified EV days"
    );
    Some(threshold)
}

/// Average daily energy over a set of days (kWh).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAverages {
    pub days: usize,
    pub avg_pv: f64,
    pub avg_load: f64,
    pub avg_import: f64,
    pub avg_export: f64,
}

impl DailyAverages {
    /// Averages over `days`, `None` when empty.
    pub fn of<'a>(days: impl IntoIterator<Item = &'a Day>) -> Option<Self> {
        let days: Vec<&Day> = days.into_iter().collect();
        let avg = |f: fn(&Day) -> f64| mean(&days.iter().map(|d| f(d)).collect::<Vec<_>>());
        Some(Self {
            days: days.len(),
            avg_pv: avg(|d| d.totals.pv)?,
            avg_load: avg(|d| d.totals.load)?,
            avg_import: avg(|d| d.totals.import)?,
            avg_export: avg(|d| d.totals.export)?,
        })
    }

    /// Self-sufficiency of the average day (%), `None` without load.
    pub fn self_sufficiency_pct(&self) -> Option<f64> {
        (self.avg_load > 0.0).then(|| (1.0 - self.avg_import / self.avg_load) * 100.0)
    }
}

/// Profile of one day type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTypeProfile {
    #[serde(flatten)]
    pub averages: DailyAverages,
    /// Mean average SOC over 18:00-20:00 (%), `None` without readings.
    pub evening_soc: Option<f64>,
}

impl DayTypeProfile {
    fn of(days: &[&Day]) -> Option<Self> {
        let averages = DailyAverages::of(days.iter().copied())?;
        let evening: Vec<f64> = days
            .iter()
            .flat_map(|d| d.records.iter())
            .filter(|r| EVENING_HOURS.contains(&r.hour))
            .map(|r| r.soc.avg)
            .collect();
        Some(Self {
            averages,
            evening_soc: mean(&evening),
        })
    }
}

/// EV detection outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvDetection {
    /// Whether an EV is configured.
    pub enabled: bool,
    pub threshold: Option<EvThreshold>,
    pub complete_days: usize,
    pub ev_day_count: usize,
    pub non_ev_day_count: usize,
    pub ev_dates: Vec<NaiveDate>,
    pub ev: Option<DayTypeProfile>,
    pub non_ev: Option<DayTypeProfile>,
}

/// Summarizes the EV classification already applied to `dataset`.
///
/// # Errors
///
/// Returns [`InsufficientData::NoData`] for an empty dataset and
/// [`InsufficientData::NoCompleteDays`] when no day can be classified.
pub fn compute(
    dataset: &Dataset,
    config: &AnalysisConfig,
    threshold: Option<EvThreshold>,
) -> Result<EvDetection, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let ev: Vec<&Day> = dataset.days.iter().filter(|d| d.is_ev()).collect();
    let non_ev: Vec<&Day> = dataset.days.iter().filter(|d| d.is_non_ev()).collect();
    if ev.is_empty() && non_ev.is_empty() {
        return Err(InsufficientData::NoCompleteDays);
    }

    Ok(EvDetection {
        enabled: config.has_ev,
        threshold,
        complete_days: ev.len() + non_ev.len(),
        ev_day_count: ev.len(),
        non_ev_day_count: non_ev.len(),
        ev_dates: ev.iter().map(|d| d.date).collect(),
        ev: DayTypeProfile::of(&ev),
        non_ev: DayTypeProfile::of(&non_ev),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{HourlyRecord, PowerAverages, SocReading};

    fn day_with_load(day: u32, load_w: f64, hours: u8) -> Vec<HourlyRecord> {
        (0..hours)
            .map(|h| {
                HourlyRecord::new(
                    NaiveDate::from_ymd_opt(2025, 7, day).expect("valid date"),
                    h,
                    12,
                    PowerAverages {
                        grid_w: -load_w,
                        grid_load_w: load_w,
                        ..PowerAverages::default()
                    },
                    SocReading {
                        avg: 60.0,
                        min: 59.0,
                        max: 61.0,
                    },
                )
            })
            .collect()
    }

    fn dataset(loads_w: &[f64]) -> Dataset {
        let records = loads_w
            .iter()
            .enumerate()
            .flat_map(|(i, w)| day_with_load(i as u32 + 1, *w, 24))
            .collect();
        Dataset::from_records(records)
    }

    fn ev_config() -> AnalysisConfig {
        AnalysisConfig {
            has_ev: true,
            ..AnalysisConfig::new(5.0)
        }
    }

    #[test]
    fn floor_applies_to_small_households() {
        // 500 W all day = 12 kWh/day; 0.3 * mean is below the 8 kWh floor
        let mut ds = dataset(&[500.0; 6]);
        let t = classify(&mut ds, &ev_config());
        assert_eq!(t.map(|t| t.threshold_kwh), Some(EV_THRESHOLD_FLOOR_KWH));
        assert!(ds.days.iter().all(|d| d.is_non_ev()));
    }

    #[test]
    fn heavy_day_flagged_as_ev() {
        let mut loads = vec![1000.0; 9];
        loads.push(3000.0);
        let mut ds = dataset(&loads);
        let t = classify(&mut ds, &ev_config());
        assert!(t.is_some());
        assert!(ds.days[9].is_ev());
        assert_eq!(ds.days.iter().filter(|d| d.is_ev()).count(), 1);

        let summary = compute(&ds, &ev_config(), t).expect("complete days present");
        assert_eq!(summary.ev_day_count, 1);
        assert_eq!(summary.non_ev_day_count, 9);
        assert_eq!(summary.ev.as_ref().map(|p| p.averages.days), Some(1));
        assert_eq!(summary.non_ev.and_then(|p| p.evening_soc), Some(60.0));
    }

    #[test]
    fn incomplete_days_stay_unclassified() {
        let mut records = day_with_load(1, 800.0, 24);
        records.extend(day_with_load(2, 5000.0, 10));
        let mut ds = Dataset::from_records(records);
        classify(&mut ds, &ev_config());
        assert_eq!(ds.days[1].is_ev_day, None);
        assert!(ds.days[0].is_non_ev());
    }

    #[test]
    fn without_ev_every_complete_day_is_non_ev() {
        let mut ds = dataset(&[1000.0, 1000.0, 6000.0]);
        let t = classify(&mut ds, &AnalysisConfig::new(5.0));
        assert!(t.is_none());
        assert!(ds.days.iter().all(|d| d.is_non_ev()));
    }

    #[test]
    fn no_complete_days_is_not_computed() {
        let mut ds = Dataset::from_records(day_with_load(1, 800.0, 5));
        let t = classify(&mut ds, &ev_config());
        assert_eq!(
            compute(&ds, &ev_config(), t).err(),
            Some(InsufficientData::NoCompleteDays)
        );
    }
}
