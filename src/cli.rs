//! Command-line options for the `solar-report` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::AnalysisConfig;
use crate::error::ConfigError;

/// Preset used when neither `--config` nor `--preset` is given.
pub const DEFAULT_PRESET: &str = "flat_basic";

#[derive(Parser, Debug)]
#[command(
    name = "solar-report",
    about = "Performance report for hourly solar and battery telemetry"
)]
pub struct Cli {
    /// Site configuration file (TOML, or JSON with a .json extension).
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in configuration: flat_basic, tiered_ev or tou_battery.
    #[arg(long)]
    pub preset: Option<String>,

    /// Directory holding the monthly CSV files.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// File name prefix before `_YYYY-MM.csv`.
    #[arg(long, default_value = "solar_hourly")]
    pub prefix: String,

    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Also write a monthly summary CSV.
    #[arg(long)]
    pub monthly_csv: Option<PathBuf>,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Resolves the configuration: `--config` first, then `--preset`, then
    /// the default preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be parsed or the preset is
    /// unknown.
    pub fn load_config(&self) -> Result<AnalysisConfig, ConfigError> {
        match (&self.config, &self.preset) {
            (Some(path), _) => AnalysisConfig::from_path(path),
            (None, Some(name)) => AnalysisConfig::from_preset(name),
            (None, None) => AnalysisConfig::from_preset(DEFAULT_PRESET),
        }
    }
}
