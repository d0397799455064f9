//! Monthly energy balances.

use serde::Serialize;

use super::classify::Dataset;
use super::types::{EnergyTotals, YearMonth};
use crate::error::InsufficientData;

/// Energy balance over a set of days.
///
/// `self_consumed` is `load - import`, so battery round-trip losses are never
/// counted as solar offset and `self_consumed + import == load` holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyBalance {
    /// Days with any data.
    pub days: usize,
    /// Days with at least 21 hourly rows.
    pub complete_days: usize,
    pub total_pv: f64,
    /// Grid-connected plus backup load.
    pub total_load: f64,
    pub grid_load: f64,
    pub backup_load: f64,
    pub grid_export: f64,
    pub grid_import: f64,
    pub battery_charge: f64,
    pub battery_discharge: f64,
    pub self_consumed: f64,
    /// Share of PV used on site (%); 0 when there was no PV.
    pub self_consumption_pct: f64,
    /// Share of load met without import (%); `None` when there was no load.
    pub self_sufficiency_pct: Option<f64>,
}

impl EnergyBalance {
    pub fn from_totals(totals: &EnergyTotals, days: usize, complete_days: usize) -> Self {
        Self {
            days,
            complete_days,
            total_pv: totals.pv,
            total_load: totals.load,
            grid_load: totals.grid_load,
            backup_load: totals.backup_load,
            grid_export: totals.export,
            grid_import: totals.import,
            battery_charge: totals.charge,
            battery_discharge: totals.discharge,
            self_consumed: totals.self_consumed(),
            self_consumption_pct: totals.self_consumption_pct(),
            self_sufficiency_pct: totals.self_sufficiency_pct(),
        }
    }
}

/// One calendar month's balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBalance {
    pub month: YearMonth,
    #[serde(flatten)]
    pub balance: EnergyBalance,
}

/// Monthly balances plus the whole-dataset balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub months: Vec<MonthlyBalance>,
    pub overall: EnergyBalance,
}

impl MonthlyTotals {
    /// Balance for `month`, if present.
    pub fn month(&self, month: YearMonth) -> Option<&MonthlyBalance> {
        self.months.iter().find(|m| m.month == month)
    }
}

/// Computes per-month and overall balances.
///
/// # Errors
///
/// Returns [`InsufficientData::NoData`] for an empty dataset.
pub fn compute(dataset: &Dataset) -> Result<MonthlyTotals, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }

    let months = dataset
        .months
        .iter()
        .map(|m| MonthlyBalance {
            month: m.key,
            balance: EnergyBalance::from_totals(&m.totals, m.day_count(), m.complete_days),
        })
        .collect();

    let complete = dataset.complete_days().count();
    let overall = EnergyBalance::from_totals(&dataset.totals(), dataset.days.len(), complete);

    Ok(MonthlyTotals { months, overall })
}
