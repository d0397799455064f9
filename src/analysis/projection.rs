//! Seasonal annual PV projection.
//!
//! Each observed month's average daily PV is divided by its seasonal factor,
//! the results are averaged into a baseline day, and the baseline is
//! re-scaled by all twelve factors to project a full year.

use serde::Serialize;

use super::classify::Dataset;
use super::policy::{DAYS_PER_MONTH, PROJECTION_HIGH_MONTHS, PROJECTION_MODERATE_MONTHS};
use super::roi::degraded;
use super::stats::mean;
use super::types::YearMonth;
use crate::config::{AnalysisConfig, ClimateBand, Hemisphere};
use crate::error::InsufficientData;

/// Relative PV yield per calendar month (January first) for a northern
/// hemisphere site. Each row sums to 12.
const fn band_table(band: ClimateBand) -> [f64; 12] {
    match band {
        ClimateBand::Tropical => [
            0.95, 1.00, 1.05, 1.05, 1.00, 0.95, 0.95, 1.00, 1.05, 1.05, 1.00, 0.95,
        ],
        ClimateBand::Subtropical => [
            0.75, 0.85, 1.00, 1.10, 1.20, 1.20, 1.20, 1.15, 1.05, 0.95, 0.80, 0.75,
        ],
        ClimateBand::Temperate => [
            0.45, 0.65, 0.95, 1.20, 1.40, 1.50, 1.50, 1.35, 1.10, 0.85, 0.55, 0.50,
        ],
        ClimateBand::HighLatitude => [
            0.15, 0.40, 0.90, 1.40, 1.80, 1.95, 1.90, 1.50, 1.00, 0.55, 0.25, 0.20,
        ],
    }
}

/// Seasonal factor for each calendar month, index 0 = January.
///
/// Explicit per-month overrides win; other months come from the band table,
/// shifted six months for southern sites.
pub fn seasonal_factors(config: &AnalysisConfig) -> [f64; 12] {
    let table = band_table(config.climate_band());
    let shift = match config.hemisphere() {
        Hemisphere::North => 0,
        Hemisphere::South => 6,
    };
    let overrides = config.seasonal_overrides();
    let mut factors = [0.0; 12];
    for (i, factor) in factors.iter_mut().enumerate() {
        *factor = overrides[i].unwrap_or(table[(i + shift) % 12]);
    }
    factors
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Moderate,
    High,
}

impl Confidence {
    /// Confidence for a number of observed months.
    pub fn for_months(months: usize) -> Self {
        if months < PROJECTION_MODERATE_MONTHS {
            Self::Low
        } else if months < PROJECTION_HIGH_MONTHS {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

/// An observed month with its seasonal adjustment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeseasonalizedMonth {
    pub month: YearMonth,
    pub avg_daily_pv: f64,
    pub factor: f64,
    pub deseasonalized: f64,
}

/// Projected PV for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedMonth {
    pub month: u32,
    pub factor: f64,
    pub pv_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualProjection {
    pub months_count: usize,
    pub confidence: Confidence,
    pub climate_band: ClimateBand,
    pub hemisphere: Hemisphere,
    /// Baseline average day with seasonality removed (kWh).
    pub baseline_daily_pv: f64,
    pub projected_annual_pv: f64,
    /// Observed self-consumption rate applied to the projection (%).
    pub self_consumption_pct: f64,
    pub projected_annual_self_consumed: f64,
    pub projected_annual_export: f64,
    /// Year-10 output, degraded over 9 years like ROI savings.
    pub projected_annual_pv_year10: f64,
    /// Year-25 output, degraded over 24 years.
    pub projected_annual_pv_year25: f64,
    pub observed: Vec<DeseasonalizedMonth>,
    pub projected: Vec<ProjectedMonth>,
}

/// Projects a full year of PV from the observed months.
///
/// # Errors
///
/// [`InsufficientData::NoData`] for an empty dataset and
/// [`InsufficientData::NoProjection`] when no month has a usable factor.
pub fn compute(dataset: &Dataset, config: &AnalysisConfig) -> Result<AnnualProjection, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let factors = seasonal_factors(config);

    let observed: Vec<DeseasonalizedMonth> = dataset
        .months
        .iter()
        .filter_map(|m| {
            let factor = factors[(m.key.month as usize).checked_sub(1)?];
            (factor > 0.0).then(|| DeseasonalizedMonth {
                month: m.key,
                avg_daily_pv: m.avg_daily_pv(),
                factor,
                deseasonalized: m.avg_daily_pv() / factor,
            })
        })
        .collect();
    let baseline_daily_pv = mean(&observed.iter().map(|m| m.deseasonalized).collect::<Vec<_>>())
        .ok_or(InsufficientData::NoProjection)?;

    let projected: Vec<ProjectedMonth> = factors
        .iter()
        .zip(1u32..)
        .map(|(factor, month)| ProjectedMonth {
            month,
            factor: *factor,
            pv_kwh: baseline_daily_pv * factor * DAYS_PER_MONTH,
        })
        .collect();
    let projected_annual_pv: f64 = projected.iter().map(|m| m.pv_kwh).sum();

    let self_consumption_pct = dataset.totals().self_consumption_pct();
    let projected_annual_self_consumed = projected_annual_pv * self_consumption_pct / 100.0;

    Ok(AnnualProjection {
        months_count: dataset.months.len(),
        confidence: Confidence::for_months(dataset.months.len()),
        climate_band: config.climate_band(),
        hemisphere: config.hemisphere(),
        baseline_daily_pv,
        projected_annual_pv,
        self_consumption_pct,
        projected_annual_self_consumed,
        projected_annual_export: projected_annual_pv - projected_annual_self_consumed,
        projected_annual_pv_year10: degraded(projected_annual_pv, 9),
        projected_annual_pv_year25: degraded(projected_annual_pv, 24),
        observed,
        projected,
    })
}
