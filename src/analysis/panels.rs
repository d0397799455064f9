//! Additional-panel scenario.

use serde::Serialize;

use super::classify::Dataset;
use super::sizing::is_inverter_limited;
use super::stats::ratio;
use super::types::Day;
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

/// Projected effect of extra PV capacity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdditionalPanels {
    pub additional_kwp: f64,
    pub total_kwp: f64,
    /// `(kwp + additional) / kwp`.
    pub scale: f64,
    pub days: usize,
    pub extra_pv_total: f64,
    pub extra_self_consumed_total: f64,
    pub extra_exported_total: f64,
    pub extra_self_consumed_daily: f64,
    pub extra_exported_daily: f64,
    /// At the tariff reference rate, export credited at the feed-in ratio.
    pub extra_daily_savings: f64,
    /// The inverter was already near its limit, so added clipping is ignored.
    pub optimistic: bool,
}

/// Simulates a larger array over complete days.
///
/// Extra PV each hour first offsets that hour's import; the remainder is
/// exported.
///
/// # Errors
///
/// [`InsufficientData::NoAdditionalCapacity`] when no scenario is configured,
/// [`InsufficientData::NoData`] or [`InsufficientData::NoCompleteDays`].
pub fn compute(dataset: &Dataset, config: &AnalysisConfig) -> Result<AdditionalPanels, InsufficientData> {
    if config.additional_kwp <= 0.0 || config.pv_kwp <= 0.0 {
        return Err(InsufficientData::NoAdditionalCapacity);
    }
    if dataset.is_empty() {
        return Err(InsufficientData::NoData);
    }
    let complete: Vec<&Day> = dataset.complete_days().collect();
    if complete.is_empty() {
        return Err(InsufficientData::NoCompleteDays);
    }

    let total_kwp = config.pv_kwp + config.additional_kwp;
    let scale = total_kwp / config.pv_kwp;
    let mut extra_pv_total = 0.0;
    let mut self_consumed = 0.0;
    let mut exported = 0.0;
    for r in complete.iter().flat_map(|d| d.records.iter()) {
        let extra = r.pv_kwh * (scale - 1.0);
        let offset = extra.min(r.import_kwh());
        extra_pv_total += extra;
        self_consumed += offset;
        exported += extra - offset;
    }

    let days = complete.len() as f64;
    let rate = config.tariff.reference_rate();
    let self_consumed_daily = ratio(self_consumed, days).unwrap_or(0.0);
    let exported_daily = ratio(exported, days).unwrap_or(0.0);

    Ok(AdditionalPanels {
        additional_kwp: config.additional_kwp,
        total_kwp,
        scale,
        days: complete.len(),
        extra_pv_total,
        extra_self_consumed_total: self_consumed,
        extra_exported_total: exported,
        extra_self_consumed_daily: self_consumed_daily,
        extra_exported_daily: exported_daily,
        extra_daily_savings: self_consumed_daily * rate
            + exported_daily * rate * config.feedin_ratio,
        optimistic: is_inverter_limited(dataset, config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{HourlyRecord, PowerAverages, SocReading};
    use crate::config::Tariff;
    use chrono::NaiveDate;

    fn day() -> Vec<HourlyRecord> {
        (0..24u8)
            .map(|h| {
                // 1 kWh PV at noon with 0.3 kWh import; 1 kWh import at 20:00
                let (pv, grid) = match h {
                    12 => (1000.0, -300.0),
                    20 => (0.0, -1000.0),
                    _ => (0.0, 0.0),
                };
                HourlyRecord::new(
                    NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date"),
                    h,
                    12,
                    PowerAverages {
                        pv_w: pv,
                        grid_w: grid,
                        grid_load_w: pv - grid,
                        ..PowerAverages::default()
                    },
                    SocReading::default(),
                )
            })
            .collect()
    }

    fn config(additional_kwp: f64) -> AnalysisConfig {
        AnalysisConfig {
            additional_kwp,
            feedin_ratio: 0.5,
            tariff: Tariff::Flat { rate: 0.2 },
            ..AnalysisConfig::new(4.0)
        }
    }

    #[test]
    fn extra_pv_offsets_same_hour_import_first() {
        let ds = Dataset::from_records(day());
        let p = compute(&ds, &config(2.0)).expect("scenario configured");
        // scale 1.5: 0.5 kWh extra at noon, 0.3 offsets import, 0.2 exported
        assert!((p.scale - 1.5).abs() < 1e-12);
        assert!((p.extra_self_consumed_total - 0.3).abs() < 1e-9);
        assert!((p.extra_exported_total - 0.2).abs() < 1e-9);
        assert!((p.extra_daily_savings - (0.3 * 0.2 + 0.2 * 0.2 * 0.5)).abs() < 1e-9);
        assert!(!p.optimistic);
    }

    #[test]
    fn no_scenario_is_not_computed() {
        let ds = Dataset::from_records(day());
        assert_eq!(
            compute(&ds, &config(0.0)).err(),
            Some(InsufficientData::NoAdditionalCapacity)
        );
    }
}
