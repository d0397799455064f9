//! Report assembly: runs every analysis over one dataset.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use super::anomaly::{self, Anomalies};
use super::battery::{self, BatteryAnalysis, BatteryHealth};
use super::best_worst::{self, BestWorstDays};
use super::bill::{self, BillImpact};
use super::carbon::{self, CarbonOffset};
use super::classify::Dataset;
use super::ev::{self, EvDetection};
use super::hourly::{self, HourlyPatterns};
use super::monthly::{self, MonthlyTotals};
use super::panels::{self, AdditionalPanels};
use super::peak::{self, PeakDemand};
use super::projection::{self, AnnualProjection};
use super::roi::{self, RoiProjection};
use super::sizing::{self, SystemSizing};
use super::trends::{self, MonthTrend};
use super::types::{DataWarning, RejectedFile, Section};
use super::weekday::{self, WeekdayWeekend};
use crate::config::AnalysisConfig;
use crate::error::InsufficientData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// What was analyzed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetMetadata {
    pub files: Vec<String>,
    pub total_rows: usize,
    pub date_range: Option<DateRange>,
    pub unique_days: usize,
    pub complete_days: usize,
    pub incomplete_days: usize,
    pub months: usize,
}

impl DatasetMetadata {
    pub fn of(dataset: &Dataset) -> Self {
        let date_range = match (dataset.days.first(), dataset.days.last()) {
            (Some(first), Some(last)) => Some(DateRange {
                start: first.date,
                end: last.date,
            }),
            _ => None,
        };
        let complete_days = dataset.complete_days().count();
        Self {
            files: dataset.files.clone(),
            total_rows: dataset.record_count(),
            date_range,
            unique_days: dataset.days.len(),
            complete_days,
            incomplete_days: dataset.days.len() - complete_days,
            months: dataset.months.len(),
        }
    }
}

/// Every report section plus dataset metadata.
///
/// Sections are independent: each is either computed or carries the reason
/// it is not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub metadata: DatasetMetadata,
    /// Display symbol, passed through from the configuration.
    pub currency: String,
    pub warnings: Vec<DataWarning>,
    pub rejected_files: Vec<RejectedFile>,
    pub monthly_totals: Section<MonthlyTotals>,
    pub ev_detection: Section<EvDetection>,
    pub hourly_patterns: Section<HourlyPatterns>,
    pub weekday_weekend: Section<WeekdayWeekend>,
    pub system_sizing: Section<SystemSizing>,
    pub battery_analysis: Section<BatteryAnalysis>,
    pub battery_health: Section<BatteryHealth>,
    pub additional_panels: Section<AdditionalPanels>,
    pub peak_demand: Section<PeakDemand>,
    pub anomalies: Section<Anomalies>,
    pub bill_impact: Section<BillImpact>,
    pub roi: Section<RoiProjection>,
    pub trends: Section<Vec<MonthTrend>>,
    pub annual_projection: Section<AnnualProjection>,
    pub carbon_offset: Section<CarbonOffset>,
    pub best_worst_days: Section<BestWorstDays>,
}

impl AnalysisResult {
    /// Names of the sections that could not be computed.
    pub fn missing_sections(&self) -> Vec<(&'static str, InsufficientData)> {
        let sections = [
            ("monthly_totals", self.monthly_totals.missing_reason()),
            ("ev_detection", self.ev_detection.missing_reason()),
            ("hourly_patterns", self.hourly_patterns.missing_reason()),
            ("weekday_weekend", self.weekday_weekend.missing_reason()),
            ("system_sizing", self.system_sizing.missing_reason()),
            ("battery_analysis", self.battery_analysis.missing_reason()),
            ("battery_health", self.battery_health.missing_reason()),
            ("additional_panels", self.additional_panels.missing_reason()),
            ("peak_demand", self.peak_demand.missing_reason()),
            ("anomalies", self.anomalies.missing_reason()),
            ("bill_impact", self.bill_impact.missing_reason()),
            ("roi", self.roi.missing_reason()),
            ("trends", self.trends.missing_reason()),
            ("annual_projection", self.annual_projection.missing_reason()),
            ("carbon_offset", self.carbon_offset.missing_reason()),
            ("best_worst_days", self.best_worst_days.missing_reason()),
        ];
        sections
            .into_iter()
            .filter_map(|(name, reason)| reason.map(|r| (name, r)))
            .collect()
    }
}

/// Runs the EV pass on a private copy of the days, then every analysis.
///
/// Pure: identical inputs give identical results.
pub fn analyze(dataset: &Dataset, config: &AnalysisConfig) -> AnalysisResult {
    let mut classified = dataset.clone();
    let threshold = ev::classify(&mut classified, config);
    let ds = &classified;

    let battery = battery::compute(ds, config);
    let bill = bill::compute(ds, config);
    let projection = projection::compute(ds, config);

    let result = AnalysisResult {
        metadata: DatasetMetadata::of(ds),
        currency: config.currency.clone(),
        warnings: ds.warnings.clone(),
        rejected_files: ds.rejected_files.clone(),
        monthly_totals: monthly::compute(ds).into(),
        ev_detection: ev::compute(ds, config, threshold).into(),
        hourly_patterns: hourly::compute(ds).into(),
        weekday_weekend: weekday::compute(ds).into(),
        system_sizing: sizing::compute(ds, config).into(),
        battery_health: battery::health(battery.as_ref().map_err(|e| *e), config).into(),
        additional_panels: panels::compute(ds, config).into(),
        peak_demand: peak::compute(ds, config).into(),
        anomalies: anomaly::compute(ds, config).into(),
        roi: roi::compute(ds, config, bill.as_ref().map_err(|e| *e)).into(),
        trends: trends::compute(ds).into(),
        carbon_offset: carbon::compute(projection.as_ref().map_err(|e| *e), config).into(),
        best_worst_days: best_worst::compute(ds).into(),
        battery_analysis: battery.into(),
        bill_impact: bill.into(),
        annual_projection: projection.into(),
    };

    for (name, reason) in result.missing_sections() {
        debug!(section = name, %reason, "section not computed");
    }
    info!(
        rows = result.metadata.total_rows,
        days = result.metadata.unique_days,
        months = result.metadata.months,
        warnings = result.warnings.len(),
        "analysis complete"
    );
    result
}
