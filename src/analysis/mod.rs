//! The analysis engine: pure functions from classified telemetry and an
//! [`AnalysisConfig`](crate::config::AnalysisConfig) to report sections.

pub mod anomaly;
/// Usable capacity, cycling, efficiency and health.
pub mod battery;
pub mod best_worst;
/// Tariff metering and bill impact.
pub mod bill;
pub mod carbon;
/// Day and month grouping.
pub mod classify;
pub mod ev;
pub mod hourly;
pub mod monthly;
pub mod panels;
pub mod peak;
/// Thresholds and constants used across modules.
pub mod policy;
pub mod projection;
pub mod report;
pub mod roi;
pub mod sizing;
pub mod stats;
pub mod trends;
pub mod types;
pub mod weekday;

pub use classify::Dataset;
pub use report::{AnalysisResult, analyze};
