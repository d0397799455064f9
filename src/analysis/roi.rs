//! Payback and lifetime savings with yearly output degradation.

use serde::Serialize;

use super::bill::{self, BillImpact, HourFlow};
use super::classify::Dataset;
use super::policy::{ANNUAL_DEGRADATION, DAYS_PER_YEAR, LIFETIME_YEARS, ROI_HORIZON_YEARS};
use super::types::HourlyRecord;
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

/// A year-1 quantity after `n` years of compounding degradation.
///
/// `n` is 0-based: year 1 is undegraded, year 10 is `n = 9`.
pub fn degraded(first_year: f64, n: usize) -> f64 {
    first_year * (1.0 - ANNUAL_DEGRADATION).powi(n as i32)
}

/// Savings of selected years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsSample {
    pub year_1: f64,
    pub year_10: f64,
    pub year_25: f64,
}

/// Payback of one investment against degrading yearly savings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payback {
    pub investment: f64,
    /// First-year savings.
    pub annual_savings: f64,
    /// Smallest 0-based year whose cumulative savings reach the investment,
    /// `None` if not reached within 50 years.
    pub payback_year: Option<usize>,
    /// Payback interpolated within that year (years).
    pub payback_years: Option<f64>,
    /// Payback still ahead given the system's age (years).
    pub remaining_payback_years: Option<f64>,
    pub lifetime_savings_25yr: f64,
    pub yearly_savings: SavingsSample,
}

impl Payback {
    /// Sums yearly savings until they cover `investment`.
    pub fn schedule(investment: f64, annual_savings: f64, system_age_years: f64) -> Self {
        let mut cumulative = 0.0;
        let mut found = None;
        for n in 0..ROI_HORIZON_YEARS {
            let year = degraded(annual_savings, n);
            let before = cumulative;
            cumulative += year;
            if cumulative >= investment {
                let fraction = if year > 0.0 {
                    (investment - before) / year
                } else {
                    0.0
                };
                found = Some((n, n as f64 + fraction));
                break;
            }
        }

        Self {
            investment,
            annual_savings,
            payback_year: found.map(|(n, _)| n),
            payback_years: found.map(|(_, y)| y),
            remaining_payback_years: found.map(|(_, y)| (y - system_age_years).max(0.0)),
            lifetime_savings_25yr: (0..LIFETIME_YEARS)
                .map(|n| degraded(annual_savings, n))
                .sum(),
            yearly_savings: SavingsSample {
                year_1: degraded(annual_savings, 0),
                year_10: degraded(annual_savings, 9),
                year_25: degraded(annual_savings, 24),
            },
        }
    }
}

/// The system priced as if it had no battery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithoutBattery {
    pub battery_cost: f64,
    #[serde(flatten)]
    pub payback: Payback,
    /// Yearly savings the battery adds.
    pub battery_incremental_savings: f64,
    /// Payback of the battery alone on its incremental savings.
    pub battery_payback: Option<Payback>,
}

/// ROI section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiProjection {
    pub currency: String,
    pub system_age_years: f64,
    pub daily_savings: f64,
    #[serde(flatten)]
    pub payback: Payback,
    pub without_battery: Option<WithoutBattery>,
}

/// Flows had PV only served the same hour's load.
pub fn without_battery_flow(r: &HourlyRecord) -> HourFlow {
    let pv = r.pv_kwh.max(0.0);
    let load = r.load_kwh();
    let direct = if pv > 0.0 { pv.min(load) } else { 0.0 };
    HourFlow {
        hour: r.hour,
        load_kwh: load,
        import_kwh: load - direct,
        export_kwh: pv - direct,
    }
}

/// Projects payback from the bill impact.
///
/// # Errors
///
/// [`InsufficientData::NoRoiConfig`] without ROI inputs,
/// [`InsufficientData::NoSavings`] when annual savings are not positive, or
/// the reason the bill impact is missing.
pub fn compute(
    dataset: &Dataset,
    config: &AnalysisConfig,
    bill: Result<&BillImpact, InsufficientData>,
) -> Result<RoiProjection, InsufficientData> {
    let roi = config.roi.as_ref().ok_or(InsufficientData::NoRoiConfig)?;
    let bill = bill?;
    let savings = bill.annual_savings;
    if savings <= 0.0 {
        return Err(InsufficientData::NoSavings);
    }
    let age = roi.system_age_years;

    let without_battery = match roi.battery_cost {
        Some(battery_cost) if config.has_battery => {
            let no_battery = bill::price(dataset, config, without_battery_flow)?;
            let incremental = savings - no_battery.annual_savings;
            Some(WithoutBattery {
                battery_cost,
                payback: Payback::schedule(
                    roi.total_cost - battery_cost,
                    no_battery.annual_savings,
                    age,
                ),
                battery_incremental_savings: incremental,
                battery_payback: (incremental > 0.0)
                    .then(|| Payback::schedule(battery_cost, incremental, age)),
            })
        }
        _ => None,
    };

    Ok(RoiProjection {
        currency: config.currency.clone(),
        system_age_years: age,
        daily_savings: savings / DAYS_PER_YEAR,
        payback: Payback::schedule(roi.total_cost, savings, age),
        without_battery,
    })
}
