//! Peak import and peak generation.

use chrono::NaiveDate;
use serde::Serialize;

use super::classify::Dataset;
use super::stats::{mean, ratio};
use super::types::{Day, HourlyRecord};
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

/// The hour a peak occurred.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakHour {
    pub power_w: f64,
    pub date: NaiveDate,
    pub hour: u8,
    pub is_ev_day: bool,
}

impl PeakHour {
    fn of(day: &Day, record: &HourlyRecord, power_w: f64) -> Self {
        Self {
            power_w,
            date: record.date,
            hour: record.hour,
            is_ev_day: day.is_ev(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakDemand {
    /// Largest average grid draw over importing hours, `None` if the site
    /// never imported.
    pub peak_import: Option<PeakHour>,
    pub peak_pv: PeakHour,
    /// Mean of each non-EV day's largest import hour (W).
    pub avg_daily_peak_import_non_ev_w: Option<f64>,
    /// Mean of each EV day's largest import hour (W).
    pub avg_daily_peak_import_ev_w: Option<f64>,
    pub peak_pv_pct_inverter: Option<f64>,
}

/// Scans every hour for the import and generation peaks.
///
/// # Errors
///
/// [`InsufficientData::NoData`] for an empty dataset.
pub fn compute(dataset: &Dataset, config: &AnalysisConfig) -> Result<PeakDemand, InsufficientData> {
    let hours = || {
        dataset
            .days
            .iter()
            .flat_map(|d| d.records.iter().map(move |r| (d, r)))
    };

    let peak_import = hours()
        .filter(|(_, r)| r.grid_kwh < 0.0)
        .fold(None::<(&Day, &HourlyRecord)>, |best, (d, r)| match best {
            Some((_, b)) if b.import_w() >= r.import_w() => best,
            _ => Some((d, r)),
        })
        .map(|(d, r)| PeakHour::of(d, r, r.import_w()));

    let peak_pv = hours()
        .fold(None::<(&Day, &HourlyRecord)>, |best, (d, r)| match best {
            Some((_, b)) if b.power.pv_w >= r.power.pv_w => best,
            _ => Some((d, r)),
        })
        .map(|(d, r)| PeakHour::of(d, r, r.power.pv_w))
        .ok_or(InsufficientData::NoData)?;

    let daily_peak = |pick: fn(&Day) -> bool| {
        let peaks: Vec<f64> = dataset
            .days
            .iter()
            .filter(|d| pick(d))
            .filter_map(|d| {
                d.records
                    .iter()
                    .filter(|r| r.grid_kwh < 0.0)
                    .map(HourlyRecord::import_w)
                    .reduce(f64::max)
            })
            .collect();
        mean(&peaks)
    };

    Ok(PeakDemand {
        peak_import,
        avg_daily_peak_import_non_ev_w: daily_peak(Day::is_non_ev),
        avg_daily_peak_import_ev_w: daily_peak(Day::is_ev),
        peak_pv_pct_inverter: ratio(peak_pv.power_w, config.inverter_kw() * 1000.0)
            .map(|r| r * 100.0),
        peak_pv,
    })
}
