//! Battery usable capacity, daily cycling, efficiency, avoidable import and
//! cycle-life health.

use serde::Serialize;
use tracing::debug;

use super::classify::Dataset;
use super::policy::{
    BATTERY_FULL_SOC_PCT, DAYS_PER_YEAR, LFP_RATED_CYCLES, USABLE_DECLINE_MIN_PCT,
    USABLE_FALLBACK_FRACTION,
};
use super::stats::{mean, median, ratio};
use super::types::{Day, YearMonth};
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

/// How the usable capacity figure was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsableMethod {
    /// Median over days with a deep SOC decline.
    DeclineMedian,
    /// No day qualified; 90% of nominal capacity.
    NominalFallback,
}

/// How avoidable import was estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidableImportMethod {
    /// Hour by hour from exported surplus the battery had room for.
    Hourly,
    /// `max(0, import - max(0, load - pv))` per day; an upper-bound estimate.
    DailyUpperBound,
}

/// The deepest SOC decline within one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decline {
    /// Index of the first record of the run.
    pub start: usize,
    /// Index of the last record of the run.
    pub end: usize,
    /// SOC lost over the run (percentage points).
    pub drop_pct: f64,
    /// Battery discharge summed over the run, inclusive (kWh).
    pub discharge_kwh: f64,
}

impl Decline {
    /// Usable capacity implied by this run (kWh).
    pub fn usable_kwh(&self) -> Option<f64> {
        if self.drop_pct > 0.0 && self.discharge_kwh > 0.0 {
            Some(self.discharge_kwh / self.drop_pct * 100.0)
        } else {
            None
        }
    }
}

/// Finds the run of non-increasing average SOC with the largest drop.
///
/// A run starts where SOC falls from one hour to the next and extends while
/// it does not rise. Ties keep the earliest run.
pub fn deepest_decline(day: &Day) -> Option<Decline> {
    let soc: Vec<f64> = day.records.iter().map(|r| r.soc.avg).collect();
    let mut best: Option<(usize, usize, f64)> = None;
    let mut i = 0;
    while i + 1 < soc.len() {
        if soc[i] > soc[i + 1] {
            let mut j = i + 1;
            while j + 1 < soc.len() && soc[j] >= soc[j + 1] {
                j += 1;
            }
            let drop = soc[i] - soc[j];
            if best.is_none_or(|(_, _, d)| drop > d) {
                best = Some((i, j, drop));
            }
            i = j;
        } else {
            i += 1;
        }
    }

    best.map(|(start, end, drop_pct)| Decline {
        start,
        end,
        drop_pct,
        discharge_kwh: day.records[start..=end]
            .iter()
            .map(|r| r.discharge_kwh())
            .sum(),
    })
}

/// Usable capacity estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsableCapacity {
    pub nominal_kwh: f64,
    pub estimated_usable_kwh: f64,
    /// Estimate as a share of nominal (%), `None` without a nominal figure.
    pub usable_pct: Option<f64>,
    /// Days whose deepest decline exceeded 30 points.
    pub estimate_days: usize,
    pub method: UsableMethod,
}

/// Estimates usable capacity from complete days.
pub fn usable_capacity(dataset: &Dataset, nominal_kwh: f64) -> UsableCapacity {
    let estimates: Vec<f64> = dataset
        .complete_days()
        .filter_map(deepest_decline)
        .filter(|d| d.drop_pct > USABLE_DECLINE_MIN_PCT)
        .filter_map(|d| d.usable_kwh())
        .collect();

    let (estimated_usable_kwh, method) = match median(&estimates) {
        Some(m) => (m, UsableMethod::DeclineMedian),
        None => (
            nominal_kwh * USABLE_FALLBACK_FRACTION,
            UsableMethod::NominalFallback,
        ),
    };

    UsableCapacity {
        nominal_kwh,
        estimated_usable_kwh,
        usable_pct: ratio(estimated_usable_kwh, nominal_kwh).map(|r| r * 100.0),
        estimate_days: estimates.len(),
        method,
    }
}

/// Average daily cycling over a set of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CyclingStats {
    pub days: usize,
    pub avg_charge: f64,
    pub avg_discharge: f64,
    /// Daily discharge as a share of usable capacity (%).
    pub avg_cycle_depth_pct: f64,
}

impl CyclingStats {
    fn of(days: &[&Day], usable_kwh: f64) -> Option<Self> {
        let charge: Vec<f64> = days.iter().map(|d| d.totals.charge).collect();
        let discharge: Vec<f64> = days.iter().map(|d| d.totals.discharge).collect();
        let depth: Vec<f64> = discharge
            .iter()
            .map(|d| ratio(*d, usable_kwh).unwrap_or(0.0) * 100.0)
            .collect();
        Some(Self {
            days: days.len(),
            avg_charge: mean(&charge)?,
            avg_discharge: mean(&discharge)?,
            avg_cycle_depth_pct: mean(&depth)?,
        })
    }
}

/// Round-trip efficiency for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyEfficiency {
    pub month: YearMonth,
    pub charge: f64,
    pub discharge: f64,
    /// `discharge / charge` (%), `None` when nothing was charged.
    pub efficiency_pct: Option<f64>,
}

/// Import the battery could have covered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvoidableImport {
    pub method: AvoidableImportMethod,
    pub total_kwh: f64,
    pub avg_per_day_kwh: f64,
    pub days: usize,
}

/// Battery analysis section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryAnalysis {
    pub capacity: UsableCapacity,
    #[serde(flatten)]
    pub overall: CyclingStats,
    pub avg_min_soc: f64,
    pub avg_max_soc: f64,
    pub non_ev: Option<CyclingStats>,
    pub ev: Option<CyclingStats>,
    pub monthly_efficiency: Vec<MonthlyEfficiency>,
    pub avoidable_import: AvoidableImport,
}

/// Analyzes battery behaviour over complete days.
///
/// # Errors
///
/// [`InsufficientData::NoBattery`] when no battery is configured,
/// [`InsufficientData::NoData`] or [`InsufficientData::NoCompleteDays`].
pub fn compute(dataset: &Dataset, config: &AnalysisConfig) -> Result<BatteryAnalysis, InsufficientData> {
    if !config.has_battery {
        return Err(InsufficientData::NoBattery);
    }
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let complete: Vec<&Day> = dataset.complete_days().collect();
    if complete.is_empty() {
        return Err(InsufficientData::NoCompleteDays);
    }

    let capacity = usable_capacity(dataset, config.battery_nominal_kwh());
    let usable = capacity.estimated_usable_kwh;
    debug!(usable, method = ?capacity.method, "estimated usable battery capacity");

    let overall = CyclingStats::of(&complete, usable).ok_or(InsufficientData::NoCompleteDays)?;
    let min_soc: Vec<f64> = complete.iter().filter_map(|d| d.min_soc()).collect();
    let max_soc: Vec<f64> = complete.iter().filter_map(|d| d.max_soc()).collect();
    let by_type = |pick: fn(&Day) -> bool| {
        let days: Vec<&Day> = complete.iter().copied().filter(|d| pick(d)).collect();
        CyclingStats::of(&days, usable)
    };

    Ok(BatteryAnalysis {
        avg_min_soc: mean(&min_soc).unwrap_or(0.0),
        avg_max_soc: mean(&max_soc).unwrap_or(0.0),
        non_ev: by_type(Day::is_non_ev),
        ev: by_type(Day::is_ev),
        monthly_efficiency: monthly_efficiency(dataset),
        avoidable_import: avoidable_import(dataset, usable),
        capacity,
        overall,
    })
}

/// Round-trip efficiency per month.
pub fn monthly_efficiency(dataset: &Dataset) -> Vec<MonthlyEfficiency> {
    dataset
        .months
        .iter()
        .map(|m| MonthlyEfficiency {
            month: m.key,
            charge: m.totals.charge,
            discharge: m.totals.discharge,
            efficiency_pct: m.battery_efficiency_pct(),
        })
        .collect()
}

/// Estimates import that stored surplus could have covered.
///
/// Uses the hourly method when SOC readings exist, otherwise the daily upper
/// bound.
pub fn avoidable_import(dataset: &Dataset, usable_kwh: f64) -> AvoidableImport {
    let complete: Vec<&Day> = dataset.complete_days().collect();
    let (method, total_kwh) = if dataset.has_soc_data() && usable_kwh > 0.0 {
        (
            AvoidableImportMethod::Hourly,
            complete.iter().map(|d| hourly_avoidable(d, usable_kwh)).sum(),
        )
    } else {
        (
            AvoidableImportMethod::DailyUpperBound,
            complete.iter().map(|d| daily_upper_bound(d)).sum(),
        )
    };

    AvoidableImport {
        method,
        total_kwh,
        avg_per_day_kwh: ratio(total_kwh, complete.len() as f64).unwrap_or(0.0),
        days: complete.len(),
    }
}

/// Exported energy banked while the battery had headroom, drawn down by
/// later imports on the same day.
fn hourly_avoidable(day: &Day, usable_kwh: f64) -> f64 {
    let mut bank = 0.0_f64;
    let mut avoidable = 0.0;
    for r in &day.records {
        let export = r.export_kwh();
        if export > 0.0 && r.soc.max < BATTERY_FULL_SOC_PCT {
            let headroom = usable_kwh * (100.0 - r.soc.avg).max(0.0) / 100.0;
            bank = (bank + export).min(headroom);
        }
        let import = r.import_kwh();
        if import > 0.0 && bank > 0.0 {
            let covered = import.min(bank);
            avoidable += covered;
            bank -= covered;
        }
    }
    avoidable
}

fn daily_upper_bound(day: &Day) -> f64 {
    let t = &day.totals;
    (t.import - (t.load - t.pv).max(0.0)).max(0.0)
}

/// Cycle-life indicators against the LFP rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryHealth {
    pub usable_kwh: f64,
    pub usable_pct: Option<f64>,
    pub nominal_kwh: f64,
    pub daily_equivalent_cycles: f64,
    pub annual_cycles: f64,
    pub system_age_years: f64,
    pub cycles_used: f64,
    pub rated_cycles: f64,
    pub remaining_cycles: f64,
    /// `None` when the battery is not cycling.
    pub remaining_cycle_years: Option<f64>,
}

impl BatteryHealth {
    /// Derives health figures from a battery analysis.
    pub fn from_analysis(analysis: &BatteryAnalysis, system_age_years: f64) -> Self {
        let usable = analysis.capacity.estimated_usable_kwh;
        let daily = ratio(analysis.overall.avg_discharge, usable).unwrap_or(0.0);
        let annual_cycles = daily * DAYS_PER_YEAR;
        let cycles_used = annual_cycles * system_age_years;
        let remaining_cycles = (LFP_RATED_CYCLES - cycles_used).max(0.0);
        Self {
            usable_kwh: usable,
            usable_pct: analysis.capacity.usable_pct,
            nominal_kwh: analysis.capacity.nominal_kwh,
            daily_equivalent_cycles: daily,
            annual_cycles,
            system_age_years,
            cycles_used,
            rated_cycles: LFP_RATED_CYCLES,
            remaining_cycles,
            remaining_cycle_years: ratio(remaining_cycles, annual_cycles),
        }
    }
}

/// Battery health section.
///
/// # Errors
///
/// Propagates the reason the battery analysis could not be computed.
pub fn health(
    analysis: Result<&BatteryAnalysis, InsufficientData>,
    config: &AnalysisConfig,
) -> Result<BatteryHealth, InsufficientData> {
    analysis.map(|a| BatteryHealth::from_analysis(a, config.system_age_years()))
}
