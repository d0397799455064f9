//! Hour-of-day profiles over EV and non-EV days.

use std::collections::BTreeMap;

use serde::Serialize;

use super::classify::Dataset;
use super::policy::{
    EV_CHARGING_HOUR_DELTA_W, EVENING_HOURS, MORNING_HOURS, PEAK_PV_HOUR_FRACTION, TAPER_SOC_PCT,
};
use super::stats::mean;
use super::types::{Day, HourlyRecord};
use crate::error::InsufficientData;

/// Channel averages for one hour of day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyAverages {
    pub hour: u8,
    pub avg_pv_w: f64,
    pub avg_load_w: f64,
    pub avg_battery_w: f64,
    pub avg_grid_w: f64,
    pub avg_soc: f64,
    pub avg_import_kwh: f64,
    pub avg_export_kwh: f64,
}

/// Builds the per-hour profile of `days`, one entry per hour with data.
pub fn profile<'a>(days: impl IntoIterator<Item = &'a Day>) -> Vec<HourlyAverages> {
    let mut by_hour: BTreeMap<u8, Vec<&HourlyRecord>> = BTreeMap::new();
    for day in days {
        for r in &day.records {
            by_hour.entry(r.hour).or_default().push(r);
        }
    }

    by_hour
        .into_iter()
        .map(|(hour, rows)| {
            let avg = |f: fn(&HourlyRecord) -> f64| {
                mean(&rows.iter().map(|r| f(r)).collect::<Vec<_>>()).unwrap_or(0.0)
            };
            HourlyAverages {
                hour,
                avg_pv_w: avg(|r| r.power.pv_w),
                avg_load_w: avg(HourlyRecord::load_w),
                avg_battery_w: avg(|r| r.power.battery_w),
                avg_grid_w: avg(|r| r.power.grid_w),
                avg_soc: avg(|r| r.soc.avg),
                avg_import_kwh: avg(HourlyRecord::import_kwh),
                avg_export_kwh: avg(HourlyRecord::export_kwh),
            }
        })
        .collect()
}

/// Evening-to-morning SOC loss.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocDrain {
    /// Mean of each evening's max SOC over 18:00-20:00 (%).
    pub evening_soc: f64,
    /// Mean of each following morning's min SOC over 05:00-06:00 (%).
    pub morning_soc: f64,
    /// `evening_soc - morning_soc` (percentage points).
    pub drain: f64,
    /// Number of consecutive-day pairs averaged.
    pub nights: usize,
}

/// Hour-of-day patterns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPatterns {
    pub non_ev: Vec<HourlyAverages>,
    pub ev: Vec<HourlyAverages>,
    /// Hour with the highest average PV.
    pub peak_pv_hour: Option<u8>,
    /// Hour with the highest average load.
    pub peak_load_hour: Option<u8>,
    /// Hours whose average PV exceeds half the best hour.
    pub peak_pv_hours: Vec<u8>,
    /// Hours where EV-day load exceeds non-EV load by more than 500 W.
    pub ev_charging_hours: Vec<u8>,
    /// Hours with net export on average.
    pub export_hours: Vec<u8>,
    /// Charging hours with a falling charge rate at high SOC.
    pub taper_hours: Vec<u8>,
    pub soc_drain_non_ev: Option<SocDrain>,
    pub soc_drain_ev: Option<SocDrain>,
}

/// Computes hourly patterns over classified complete days.
///
/// # Errors
///
/// [`InsufficientData::NoData`] or [`InsufficientData::NoCompleteDays`].
pub fn compute(dataset: &Dataset) -> Result<HourlyPatterns, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let classified: Vec<&Day> = dataset
        .days
        .iter()
        .filter(|d| d.is_ev_day.is_some())
        .collect();
    if classified.is_empty() {
        return Err(InsufficientData::NoCompleteDays);
    }

    let non_ev = profile(classified.iter().copied().filter(|d| d.is_non_ev()));
    let ev = profile(classified.iter().copied().filter(|d| d.is_ev()));
    let all = profile(classified.iter().copied());

    let peak_pv_hour = argmax(&all, |h| h.avg_pv_w);
    let peak_load_hour = argmax(&all, |h| h.avg_load_w);
    let max_pv = all.iter().map(|h| h.avg_pv_w).fold(0.0, f64::max);
    let peak_pv_hours = all
        .iter()
        .filter(|h| max_pv > 0.0 && h.avg_pv_w > max_pv * PEAK_PV_HOUR_FRACTION)
        .map(|h| h.hour)
        .collect();
    let export_hours = all
        .iter()
        .filter(|h| h.avg_export_kwh - h.avg_import_kwh > 0.0)
        .map(|h| h.hour)
        .collect();

    let ev_charging_hours = ev
        .iter()
        .filter(|e| {
            non_ev
                .iter()
                .find(|n| n.hour == e.hour)
                .is_some_and(|n| e.avg_load_w - n.avg_load_w > EV_CHARGING_HOUR_DELTA_W)
        })
        .map(|e| e.hour)
        .collect();

    let has_soc = dataset.has_soc_data();
    Ok(HourlyPatterns {
        peak_pv_hour,
        peak_load_hour,
        peak_pv_hours,
        ev_charging_hours,
        export_hours,
        taper_hours: taper_hours(&all),
        soc_drain_non_ev: has_soc.then(|| soc_drain(dataset, Day::is_non_ev)).flatten(),
        soc_drain_ev: has_soc.then(|| soc_drain(dataset, Day::is_ev)).flatten(),
        non_ev,
        ev,
    })
}

fn argmax(profile: &[HourlyAverages], f: impl Fn(&HourlyAverages) -> f64) -> Option<u8> {
    profile
        .iter()
        .fold(None::<&HourlyAverages>, |best, h| match best {
            Some(b) if f(b) >= f(h) => Some(b),
            _ => Some(h),
        })
        .map(|h| h.hour)
}

fn taper_hours(profile: &[HourlyAverages]) -> Vec<u8> {
    profile
        .windows(2)
        .filter(|w| w[1].hour == w[0].hour + 1)
        .filter(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            cur.avg_battery_w > 0.0
                && cur.avg_battery_w < prev.avg_battery_w
                && cur.avg_soc >= TAPER_SOC_PCT
        })
        .map(|w| w[1].hour)
        .collect()
}

/// Pairs each evening of a `kind` day with the next calendar day's morning.
fn soc_drain(dataset: &Dataset, kind: fn(&Day) -> bool) -> Option<SocDrain> {
    let mut evenings = Vec::new();
    let mut mornings = Vec::new();
    for pair in dataset.days.windows(2) {
        let (today, tomorrow) = (&pair[0], &pair[1]);
        if !kind(today) || today.date.succ_opt() != Some(tomorrow.date) {
            continue;
        }
        let evening = window_soc(today, &EVENING_HOURS, |r| r.soc.max, f64::max);
        let morning = window_soc(tomorrow, &MORNING_HOURS, |r| r.soc.min, f64::min);
        if let (Some(e), Some(m)) = (evening, morning) {
            evenings.push(e);
            mornings.push(m);
        }
    }

    let evening_soc = mean(&evenings)?;
    let morning_soc = mean(&mornings)?;
    Some(SocDrain {
        evening_soc,
        morning_soc,
        drain: evening_soc - morning_soc,
        nights: evenings.len(),
    })
}

fn window_soc(
    day: &Day,
    hours: &[u8],
    value: fn(&HourlyRecord) -> f64,
    pick: fn(f64, f64) -> f64,
) -> Option<f64> {
    day.records
        .iter()
        .filter(|r| hours.contains(&r.hour))
        .map(value)
        .reduce(pick)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ev;
    use crate::analysis::types::{PowerAverages, SocReading};
    use crate::config::AnalysisConfig;
    use chrono::NaiveDate;

    fn solar_day(day: u32, extra_evening_load_w: f64) -> Vec<HourlyRecord> {
        (0..24u8)
            .map(|h| {
                let pv = match h {
                    10..=14 => 3000.0,
                    8 | 9 | 15 | 16 => 1000.0,
                    _ => 0.0,
                };
                let load = if (19..=22).contains(&h) {
                    400.0 + extra_evening_load_w
                } else {
                    400.0
                };
                let soc = if h >= 18 { 95.0 } else if h <= 6 { 40.0 } else { 70.0 };
                HourlyRecord::new(
                    NaiveDate::from_ymd_opt(2025, 8, day).expect("valid date"),
                    h,
                    12,
                    PowerAverages {
                        pv_w: pv,
                        battery_w: 0.0,
                        grid_w: pv - load,
                        grid_load_w: load,
                        backup_load_w: 0.0,
                    },
                    SocReading {
                        avg: soc,
                        min: soc - 1.0,
                        max: soc + 1.0,
                    },
                )
            })
            .collect()
    }

    fn classified(days: &[(u32, f64)]) -> Dataset {
        let records = days.iter().flat_map(|(d, w)| solar_day(*d, *w)).collect();
        let mut ds = Dataset::from_records(records);
        let config = AnalysisConfig {
            has_ev: true,
            ..AnalysisConfig::new(6.0)
        };
        ev::classify(&mut ds, &config);
        ds
    }

    #[test]
    fn peak_and_export_hours() {
        let ds = classified(&[(1, 0.0), (2, 0.0), (3, 0.0)]);
        let p = compute(&ds).expect("complete days");
        assert_eq!(p.peak_pv_hour, Some(10));
        assert_eq!(p.peak_pv_hours, vec![10, 11, 12, 13, 14]);
        assert!(p.export_hours.contains(&12));
        assert!(!p.export_hours.contains(&2));
        assert_eq!(p.non_ev.len(), 24);
        assert!(p.ev.is_empty());
    }

    #[test]
    fn ev_charging_hours_from_evening_load() {
        let mut days: Vec<(u32, f64)> = (1..=9).map(|d| (d, 0.0)).collect();
        days.push((10, 7000.0));
        let ds = classified(&days);
        let p = compute(&ds).expect("complete days");
        assert_eq!(p.ev_charging_hours, vec![19, 20, 21, 22]);
    }

    #[test]
    fn overnight_drain_uses_consecutive_days() {
        // day 5 has no predecessor pair with day 3
        let ds = classified(&[(1, 0.0), (2, 0.0), (3, 0.0), (5, 0.0)]);
        let p = compute(&ds).expect("complete days");
        let drain = p.soc_drain_non_ev.expect("soc present");
        assert_eq!(drain.nights, 2);
        // evening max 96, morning min 39
        assert!((drain.drain - 57.0).abs() < 1e-9);
    }

    #[test]
    fn taper_detected_on_falling_charge_at_high_soc() {
        let rows = [
            (10, 3000.0, 70.0),
            (11, 2500.0, 88.0),
            (12, 1200.0, 93.0),
            (13, 300.0, 97.0),
        ];
        let profile: Vec<HourlyAverages> = rows
            .iter()
            .map(|(hour, battery, soc)| HourlyAverages {
                hour: *hour,
                avg_pv_w: 0.0,
                avg_load_w: 0.0,
                avg_battery_w: *battery,
                avg_grid_w: 0.0,
                avg_soc: *soc,
                avg_import_kwh: 0.0,
                avg_export_kwh: 0.0,
            })
            .collect();
        assert_eq!(taper_hours(&profile), vec![12, 13]);
    }

    #[test]
    fn unclassified_dataset_is_not_computed() {
        let ds = Dataset::from_records(solar_day(1, 0.0));
        assert_eq!(compute(&ds).err(), Some(InsufficientData::NoCompleteDays));
    }
}
