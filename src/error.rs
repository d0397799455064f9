//! Error types shared by the loader, the configuration layer, and the engine.

use serde::Serialize;
use thiserror::Error;

/// A telemetry file that cannot be used at all.
///
/// Raised per file: the file's rows are discarded but other files in the same
/// run still load.
#[derive(Debug, Error)]
pub enum InputFormatError {
    /// The file name does not follow `<prefix>_YYYY-MM.csv`.
    #[error("{file}: file name does not match <prefix>_YYYY-MM.csv")]
    FileName { file: String },
    /// The header row is missing or does not match the 16-column layout.
    #[error("{file}: line {line}: header mismatch: {detail}")]
    Header {
        file: String,
        line: u64,
        detail: String,
    },
    /// A required key column (`Date`, `Hour`) or the row shape is unusable.
    #[error("{file}: line {line}: {detail}")]
    Row {
        file: String,
        line: u64,
        detail: String,
    },
    /// The file could not be opened or read as CSV.
    #[error("{file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
}

impl InputFormatError {
    /// Name of the file the error refers to.
    pub fn file(&self) -> &str {
        match self {
            Self::FileName { file }
            | Self::Header { file, .. }
            | Self::Row { file, .. }
            | Self::Csv { file, .. } => file,
        }
    }
}

/// Why a report section could not be computed.
///
/// Distinguishes "the value is unknown" from "the value is zero"; every
/// message is written so a report writer can quote it directly.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientData {
    #[error("no telemetry rows were loaded")]
    NoData,
    #[error("no complete days (at least 21 hourly rows) are available")]
    NoCompleteDays,
    #[error("the system has no battery configured")]
    NoBattery,
    #[error("no additional panel capacity scenario was configured")]
    NoAdditionalCapacity,
    #[error("both weekday and weekend non-EV days are required")]
    MissingDayType,
    #[error("at least two months of data are required")]
    TooFewMonths,
    #[error("no ROI inputs (total cost) were configured")]
    NoRoiConfig,
    #[error("the system shows no positive annual savings")]
    NoSavings,
    #[error("no days with household load are available")]
    NoLoad,
    #[error("the annual projection could not be computed")]
    NoProjection,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"tariff.tiers"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
