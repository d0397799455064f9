//! Month-over-month comparisons.

use serde::Serialize;

use super::classify::Dataset;
use super::policy::TREND_SHIFT_RATIO;
use super::stats::{ratio, relative_change};
use super::types::{Month, YearMonth};
use crate::error::InsufficientData;

/// One metric in two adjacent months.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricChange {
    pub from: Option<f64>,
    pub to: Option<f64>,
    /// `to - from`.
    pub delta: Option<f64>,
    /// Relative change (%), `None` when either side is missing or `from` is 0.
    pub change_pct: Option<f64>,
    /// Relative change exceeded 10%.
    pub shifted: bool,
}

impl MetricChange {
    fn new(from: Option<f64>, to: Option<f64>) -> Self {
        let (delta, change) = match (from, to) {
            (Some(a), Some(b)) => (Some(b - a), relative_change(a, b)),
            _ => (None, None),
        };
        Self {
            from,
            to,
            delta,
            change_pct: change.map(|c| c * 100.0),
            shifted: change.is_some_and(|c| c.abs() > TREND_SHIFT_RATIO),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTrend {
    pub from: YearMonth,
    pub to: YearMonth,
    pub avg_daily_pv: MetricChange,
    pub avg_daily_load: MetricChange,
    pub self_sufficiency_pct: MetricChange,
    pub self_consumption_pct: MetricChange,
    pub battery_efficiency_pct: MetricChange,
    pub grid_dependence_pct: MetricChange,
}

impl MonthTrend {
    fn between(a: &Month, b: &Month) -> Self {
        let grid_dependence = |m: &Month| ratio(m.totals.import, m.totals.load).map(|r| r * 100.0);
        Self {
            from: a.key,
            to: b.key,
            avg_daily_pv: MetricChange::new(Some(a.avg_daily_pv()), Some(b.avg_daily_pv())),
            avg_daily_load: MetricChange::new(Some(a.avg_daily_load()), Some(b.avg_daily_load())),
            self_sufficiency_pct: MetricChange::new(
                a.totals.self_sufficiency_pct(),
                b.totals.self_sufficiency_pct(),
            ),
            self_consumption_pct: MetricChange::new(
                Some(a.totals.self_consumption_pct()),
                Some(b.totals.self_consumption_pct()),
            ),
            battery_efficiency_pct: MetricChange::new(
                a.battery_efficiency_pct(),
                b.battery_efficiency_pct(),
            ),
            grid_dependence_pct: MetricChange::new(grid_dependence(a), grid_dependence(b)),
        }
    }
}

/// Compares each month with the next.
///
/// # Errors
///
/// [`InsufficientData::NoData`] or [`InsufficientData::TooFewMonths`].
pub fn compute(dataset: &Dataset) -> Result<Vec<MonthTrend>, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    if dataset.months.len() < 2 {
        return Err(InsufficientData::TooFewMonths);
    }
    Ok(dataset
        .months
        .windows(2)
        .map(|w| MonthTrend::between(&w[0], &w[1]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{HourlyRecord, PowerAverages, SocReading};
    use chrono::NaiveDate;

    fn day(month: u32, pv_w: f64) -> Vec<HourlyRecord> {
        (0..24u8)
            .map(|h| {
                HourlyRecord::new(
                    NaiveDate::from_ymd_opt(2025, month, 10).expect("valid date"),
                    h,
                    12,
                    PowerAverages {
                        pv_w,
                        grid_w: pv_w - 500.0,
                        grid_load_w: 500.0,
                        ..PowerAverages::default()
                    },
                    SocReading::default(),
                )
            })
            .collect()
    }

    #[test]
    fn pv_drop_is_a_shift() {
        let mut records = day(3, 400.0);
        records.extend(day(4, 300.0));
        records.extend(day(5, 310.0));
        let ds = Dataset::from_records(records);
        let trends = compute(&ds).expect("two months");
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].from.to_string(), "2025-03");
        assert!(trends[0].avg_daily_pv.shifted);
        assert!((trends[0].avg_daily_pv.change_pct.unwrap_or_default() + 25.0).abs() < 1e-9);
        assert!(!trends[1].avg_daily_pv.shifted);
        assert!(!trends[0].avg_daily_load.shifted);
        assert_eq!(trends[0].battery_efficiency_pct.change_pct, None);
    }

    #[test]
    fn single_month_is_not_computed() {
        let ds = Dataset::from_records(day(3, 400.0));
        assert_eq!(compute(&ds).err(), Some(InsufficientData::TooFewMonths));
    }
}
