//! Carbon offset of projected self-consumption.

use serde::Serialize;

use super::policy::{KG_CO2_PER_KM, KG_CO2_PER_TREE};
use super::projection::AnnualProjection;
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarbonOffset {
    /// kg CO2 per kWh of grid electricity.
    pub grid_emission_factor: f64,
    pub annual_self_consumed_kwh: f64,
    pub annual_co2_avoided_kg: f64,
    pub annual_co2_avoided_tonnes: f64,
    /// Trees absorbing the same CO2 over a year.
    pub equiv_trees: f64,
    /// Car kilometres emitting the same CO2.
    pub equiv_km_driving: f64,
}

impl CarbonOffset {
    pub fn from_self_consumed(kwh: f64, emission_factor: f64) -> Self {
        let kg = kwh * emission_factor;
        Self {
            grid_emission_factor: emission_factor,
            annual_self_consumed_kwh: kwh,
            annual_co2_avoided_kg: kg,
            annual_co2_avoided_tonnes: kg / 1000.0,
            equiv_trees: kg / KG_CO2_PER_TREE,
            equiv_km_driving: kg / KG_CO2_PER_KM,
        }
    }
}

/// Converts the projected annual self-consumption into avoided emissions.
///
/// # Errors
///
/// Propagates the reason the annual projection is missing.
pub fn compute(
    projection: Result<&AnnualProjection, InsufficientData>,
    config: &AnalysisConfig,
) -> Result<CarbonOffset, InsufficientData> {
    projection.map(|p| {
        CarbonOffset::from_self_consumed(p.projected_annual_self_consumed, config.grid_emission_factor)
    })
}
