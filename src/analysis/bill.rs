//! Bill impact under flat, tiered and time-of-use tariffs.
//!
//! Costs are metered hour by hour within each calendar-month billing period:
//! tiered rates depend on the volume already drawn that month and TOU rates on
//! the clock hour, so monthly totals cannot be priced in one step.

use serde::Serialize;
use tracing::debug;

use super::classify::Dataset;
use super::policy::DAYS_PER_YEAR;
use super::stats::ratio;
use super::types::{HourlyRecord, YearMonth};
use crate::config::{AnalysisConfig, Tariff, TariffTier};
use crate::error::InsufficientData;

/// Energy flows of one hour as seen by the meter (kWh).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourFlow {
    pub hour: u8,
    pub load_kwh: f64,
    pub import_kwh: f64,
    pub export_kwh: f64,
}

impl HourFlow {
    /// Flows actually recorded.
    pub fn observed(r: &HourlyRecord) -> Self {
        Self {
            hour: r.hour,
            load_kwh: r.load_kwh(),
            import_kwh: r.import_kwh(),
            export_kwh: r.export_kwh(),
        }
    }
}

/// Running cost of one billing period.
#[derive(Debug, Clone)]
pub struct TariffMeter<'a> {
    tariff: &'a Tariff,
    metered_kwh: f64,
}

impl<'a> TariffMeter<'a> {
    pub fn new(tariff: &'a Tariff) -> Self {
        Self {
            tariff,
            metered_kwh: 0.0,
        }
    }

    /// Prices `kwh` drawn during `hour` and adds it to the period volume.
    pub fn charge(&mut self, hour: u8, kwh: f64) -> f64 {
        if kwh <= 0.0 {
            return 0.0;
        }
        let cost = match self.tariff {
            Tariff::Flat { rate } => kwh * rate,
            Tariff::Tiered { tiers, above_rate } => {
                tiered_cost(tiers, *above_rate, self.metered_kwh, kwh)
            }
            Tariff::Tou { .. } => kwh * self.tariff.rate_at_hour(hour),
        };
        self.metered_kwh += kwh;
        cost
    }

    /// Volume drawn so far this period (kWh).
    pub fn metered_kwh(&self) -> f64 {
        self.metered_kwh
    }
}

/// Cost of the volume between `from` and `from + kwh` on a tier ladder.
///
/// Each tier covers `(previous ceiling, up_to_kwh]`, so a kWh ending exactly
/// on a ceiling is priced in the lower tier.
fn tiered_cost(tiers: &[TariffTier], above_rate: Option<f64>, from: f64, kwh: f64) -> f64 {
    let to = from + kwh;
    let mut cost = 0.0;
    let mut floor = 0.0_f64;
    for tier in tiers {
        let lo = from.max(floor);
        let hi = to.min(tier.up_to_kwh);
        if hi > lo {
            cost += (hi - lo) * tier.rate;
        }
        floor = floor.max(tier.up_to_kwh);
    }
    let beyond = to - from.max(floor);
    if beyond > 0.0 {
        let rate = above_rate
            .or_else(|| tiers.last().map(|t| t.rate))
            .unwrap_or(0.0);
        cost += beyond * rate;
    }
    cost
}

/// 1-based tier a monthly volume ends in; one past the ladder when above it.
pub fn tier_reached(tiers: &[TariffTier], kwh: f64) -> usize {
    tiers
        .iter()
        .position(|t| kwh <= t.up_to_kwh)
        .map_or(tiers.len() + 1, |i| i + 1)
}

/// One billing period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBill {
    pub month: YearMonth,
    pub days: usize,
    pub load_kwh: f64,
    pub import_kwh: f64,
    pub export_kwh: f64,
    /// Tariff applied to the whole load.
    pub without_solar: f64,
    /// Tariff applied to grid import only.
    pub with_solar: f64,
    pub feedin_credit: f64,
    /// `without_solar - with_solar + feedin_credit`.
    pub net_savings: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_without_solar: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_with_solar: Option<usize>,
}

/// Bill impact section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillImpact {
    pub tariff_type: &'static str,
    pub currency: String,
    pub monthly: Vec<MonthlyBill>,
    /// Days with data across all billing periods.
    pub total_days: usize,
    pub annual_without_solar: f64,
    pub annual_with_solar: f64,
    pub annual_feedin_credit: f64,
    pub annual_savings: f64,
    /// Annual savings as a share of the without-solar bill (%).
    pub annual_reduction_pct: Option<f64>,
}

/// Prices the observed flows.
///
/// # Errors
///
/// [`InsufficientData::NoData`] for an empty dataset.
pub fn compute(dataset: &Dataset, config: &AnalysisConfig) -> Result<BillImpact, InsufficientData> {
    price(dataset, config, HourFlow::observed)
}

/// Prices the flows `flow` derives from each record.
///
/// Shared by the observed bill and the ROI without-battery scenario so both go
/// through the same meter.
///
/// # Errors
///
/// [`InsufficientData::NoData`] for an empty dataset.
pub fn price(
    dataset: &Dataset,
    config: &AnalysisConfig,
    flow: impl Fn(&HourlyRecord) -> HourFlow,
) -> Result<BillImpact, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let tariff = &config.tariff;

    let monthly: Vec<MonthlyBill> = dataset
        .months
        .iter()
        .map(|m| {
            let mut without = TariffMeter::new(tariff);
            let mut with = TariffMeter::new(tariff);
            let mut without_solar = 0.0;
            let mut with_solar = 0.0;
            let mut feedin_credit = 0.0;
            let mut export_kwh = 0.0;
            for r in dataset.days_of(m).iter().flat_map(|d| d.records.iter()) {
                let f = flow(r);
                without_solar += without.charge(f.hour, f.load_kwh);
                with_solar += with.charge(f.hour, f.import_kwh);
                feedin_credit += f.export_kwh * config.feedin_ratio * tariff.rate_at_hour(f.hour);
                export_kwh += f.export_kwh;
            }
            let (tier_without_solar, tier_with_solar) = match tariff {
                Tariff::Tiered { tiers, .. } => (
                    Some(tier_reached(tiers, without.metered_kwh())),
                    Some(tier_reached(tiers, with.metered_kwh())),
                ),
                _ => (None, None),
            };
            MonthlyBill {
                month: m.key,
                days: m.day_count(),
                load_kwh: without.metered_kwh(),
                import_kwh: with.metered_kwh(),
                export_kwh,
                without_solar,
                with_solar,
                feedin_credit,
                net_savings: without_solar - with_solar + feedin_credit,
                tier_without_solar,
                tier_with_solar,
            }
        })
        .collect();

    let total_days: usize = monthly.iter().map(|m| m.days).sum();
    let annualize = |f: fn(&MonthlyBill) -> f64| {
        let total: f64 = monthly.iter().map(f).sum();
        ratio(total, total_days as f64).unwrap_or(0.0) * DAYS_PER_YEAR
    };
    let annual_without_solar = annualize(|m| m.without_solar);
    let annual_with_solar = annualize(|m| m.with_solar);
    let annual_feedin_credit = annualize(|m| m.feedin_credit);
    let annual_savings = annualize(|m| m.net_savings);
    debug!(tariff = tariff.kind(), annual_savings, "priced bill impact");

    Ok(BillImpact {
        tariff_type: tariff.kind(),
        currency: config.currency.clone(),
        monthly,
        total_days,
        annual_without_solar,
        annual_with_solar,
        annual_feedin_credit,
        annual_savings,
        annual_reduction_pct: ratio(annual_savings, annual_without_solar).map(|r| r * 100.0),
    })
}
