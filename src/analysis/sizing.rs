//! System sizing and clipping checks.

use serde::Serialize;

use super::classify::Dataset;
use super::ev::DailyAverages;
use super::policy::{INVERTER_LIMITED_RATIO, PANEL_CLIP_RATIO};
use super::stats::{mean, ratio};
use super::types::YearMonth;
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

/// Sizing figures for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySizing {
    pub month: YearMonth,
    /// Average daily PV over days with data (kWh).
    pub avg_daily_pv: f64,
    pub peak_sun_hours: f64,
    pub capacity_factor_pct: f64,
    /// Share of load imported (%), `None` without load.
    pub grid_dependence_pct: Option<f64>,
}

/// Array and inverter sizing verdicts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSizing {
    /// Average daily PV over complete days (kWh).
    pub avg_daily_pv: f64,
    pub capacity_factor_pct: f64,
    pub peak_sun_hours: f64,
    /// Highest hourly average PV power (W).
    pub max_pv_w: f64,
    pub nameplate_w: f64,
    pub inverter_ac_w: f64,
    pub dc_ac_ratio: f64,
    pub max_pv_pct_nameplate: f64,
    pub max_pv_pct_inverter: f64,
    /// Hours above 85% of panel nameplate.
    pub panel_clip_hours: usize,
    /// Hours above the inverter AC rating.
    pub inverter_clip_hours: usize,
    /// Max PV reached 95% of the inverter rating.
    pub inverter_limited: bool,
    /// Mean daily PV over mean daily load on non-EV days.
    pub pv_load_ratio: Option<f64>,
    pub monthly: Vec<MonthlySizing>,
}

/// Highest hourly average PV in the dataset (W).
pub fn max_pv_w(dataset: &Dataset) -> f64 {
    dataset.records().map(|r| r.power.pv_w).fold(0.0, f64::max)
}

/// Whether the observed PV peak is pinned near the inverter rating.
pub fn is_inverter_limited(dataset: &Dataset, config: &AnalysisConfig) -> bool {
    let inverter_w = config.inverter_kw() * 1000.0;
    inverter_w > 0.0 && max_pv_w(dataset) >= inverter_w * INVERTER_LIMITED_RATIO
}

/// Computes capacity factor, peak sun hours and clipping counts.
///
/// # Errors
///
/// [`InsufficientData::NoData`] or [`InsufficientData::NoCompleteDays`].
pub fn compute(dataset: &Dataset, config: &AnalysisConfig) -> Result<SystemSizing, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let daily_pv: Vec<f64> = dataset.complete_days().map(|d| d.totals.pv).collect();
    let avg_daily_pv = mean(&daily_pv).ok_or(InsufficientData::NoCompleteDays)?;

    let kwp = config.pv_kwp;
    let nameplate_w = kwp * 1000.0;
    let inverter_kw = config.inverter_kw();
    let inverter_ac_w = inverter_kw * 1000.0;
    let max_pv_w = max_pv_w(dataset);

    let panel_clip_hours = dataset
        .records()
        .filter(|r| r.power.pv_w > nameplate_w * PANEL_CLIP_RATIO)
        .count();
    let inverter_clip_hours = dataset
        .records()
        .filter(|r| r.power.pv_w > inverter_ac_w)
        .count();

    let pv_load_ratio = DailyAverages::of(dataset.days.iter().filter(|d| d.is_non_ev()))
        .and_then(|a| ratio(a.avg_pv, a.avg_load));

    let monthly = dataset
        .months
        .iter()
        .map(|m| {
            let avg = m.avg_daily_pv();
            MonthlySizing {
                month: m.key,
                avg_daily_pv: avg,
                peak_sun_hours: ratio(avg, kwp).unwrap_or(0.0),
                capacity_factor_pct: ratio(avg, kwp * 24.0).unwrap_or(0.0) * 100.0,
                grid_dependence_pct: ratio(m.totals.import, m.totals.load).map(|r| r * 100.0),
            }
        })
        .collect();

    Ok(SystemSizing {
        avg_daily_pv,
        capacity_factor_pct: ratio(avg_daily_pv, kwp * 24.0).unwrap_or(0.0) * 100.0,
        peak_sun_hours: ratio(avg_daily_pv, kwp).unwrap_or(0.0),
        max_pv_w,
        nameplate_w,
        inverter_ac_w,
        dc_ac_ratio: ratio(kwp, inverter_kw).unwrap_or(0.0),
        max_pv_pct_nameplate: ratio(max_pv_w, nameplate_w).unwrap_or(0.0) * 100.0,
        max_pv_pct_inverter: ratio(max_pv_w, inverter_ac_w).unwrap_or(0.0) * 100.0,
        panel_clip_hours,
        inverter_clip_hours,
        inverter_limited: is_inverter_limited(dataset, config),
        pv_load_ratio,
        monthly,
    })
}
