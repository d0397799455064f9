//! Best and worst days by self-sufficiency.

use chrono::NaiveDate;
use serde::Serialize;

use super::classify::Dataset;
use super::types::Day;
use crate::error::InsufficientData;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub pv: f64,
    pub load: f64,
    pub grid_import: f64,
    pub grid_export: f64,
    pub peak_soc: Option<f64>,
    pub self_sufficiency_pct: f64,
    pub is_ev_day: bool,
}

impl DaySummary {
    fn of(day: &Day) -> Option<Self> {
        let self_sufficiency_pct = day.totals.self_sufficiency_pct()?;
        Some(Self {
            date: day.date,
            pv: day.totals.pv,
            load: day.totals.load,
            grid_import: day.totals.import,
            grid_export: day.totals.export,
            peak_soc: day.max_soc(),
            self_sufficiency_pct,
            is_ev_day: day.is_ev(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestWorstDays {
    pub best: DaySummary,
    pub worst: DaySummary,
}

/// Picks the complete days with the highest and lowest self-sufficiency.
///
/// Days without load are skipped; the earliest date wins a tie.
///
/// # Errors
///
/// [`InsufficientData::NoData`], [`InsufficientData::NoCompleteDays`] or
/// [`InsufficientData::NoLoad`].
pub fn compute(dataset: &Dataset) -> Result<BestWorstDays, InsufficientData> {
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    if dataset.complete_days().next().is_none() {
        return Err(InsufficientData::NoCompleteDays);
    }
    let days: Vec<DaySummary> = dataset.complete_days().filter_map(DaySummary::of).collect();

    let mut best: Option<&DaySummary> = None;
    let mut worst: Option<&DaySummary> = None;
    for d in &days {
        if best.is_none_or(|b| d.self_sufficiency_pct > b.self_sufficiency_pct) {
            best = Some(d);
        }
        if worst.is_none_or(|w| d.self_sufficiency_pct < w.self_sufficiency_pct) {
            worst = Some(d);
        }
    }

    match (best, worst) {
        (Some(best), Some(worst)) => Ok(BestWorstDays {
            best: best.clone(),
            worst: worst.clone(),
        }),
        _ => Err(InsufficientData::NoLoad),
    }
}
