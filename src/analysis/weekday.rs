//! Weekday versus weekend comparison over non-EV days.

use serde::Serialize;

use super::classify::Dataset;
use super::ev::DailyAverages;
use super::hourly::profile;
use super::policy::WEEKDAY_DIFF_W;
use super::types::Day;
use crate::error::InsufficientData;

/// Averages for one group of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    #[serde(flatten)]
    pub averages: DailyAverages,
    pub self_sufficiency_pct: Option<f64>,
    /// Average load by hour of day (W), indexed by hour.
    pub hourly_load_w: Vec<HourLoad>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourLoad {
    pub hour: u8,
    pub load_w: f64,
}

/// An hour where weekend load differs from weekday load by more than 200 W.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourDiff {
    pub hour: u8,
    /// Weekend minus weekday (W).
    pub diff_w: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayWeekend {
    pub weekday: DayGroup,
    pub weekend: DayGroup,
    pub significant_hourly_diffs: Vec<HourDiff>,
}

impl DayGroup {
    fn of(days: &[&Day]) -> Option<Self> {
        let averages = DailyAverages::of(days.iter().copied())?;
        let hourly_load_w = profile(days.iter().copied())
            .into_iter()
            .map(|h| HourLoad {
                hour: h.hour,
                load_w: h.avg_load_w,
            })
            .collect();
        Some(Self {
            self_sufficiency_pct: averages.self_sufficiency_pct(),
            averages,
            hourly_load_w,
        })
    }
}

/// Compares weekdays with weekends, excluding EV days.
///
/// # Errors
///
/// [`InsufficientData::NoData`] for an empty dataset,
/// [`InsufficientData::NoCompleteDays`] without non-EV days and
/// [`InsufficientData::MissingDayType`] when either group is empty.
pub fn compute(dataset: &Dataset) -> Result<WeekdayWeekend, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let non_ev: Vec<&Day> = dataset.days.iter().filter(|d| d.is_non_ev()).collect();
    if non_ev.is_empty() {
        return Err(InsufficientData::NoCompleteDays);
    }
    let (weekend, weekday): (Vec<&Day>, Vec<&Day>) = non_ev.into_iter().partition(|d| d.is_weekend());

    let weekday = DayGroup::of(&weekday).ok_or(InsufficientData::MissingDayType)?;
    let weekend = DayGroup::of(&weekend).ok_or(InsufficientData::MissingDayType)?;

    let significant_hourly_diffs = weekday
        .hourly_load_w
        .iter()
        .filter_map(|wd| {
            let we = weekend.hourly_load_w.iter().find(|we| we.hour == wd.hour)?;
            let diff_w = we.load_w - wd.load_w;
            (diff_w.abs() > WEEKDAY_DIFF_W).then_some(HourDiff {
                hour: wd.hour,
                diff_w,
            })
        })
        .collect();

    Ok(WeekdayWeekend {
        weekday,
        weekend,
        significant_hourly_diffs,
    })
}
