//! TOML/JSON system configuration and preset definitions.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// DC/AC ratio assumed when the inverter rating is not supplied.
const DEFAULT_DC_AC_RATIO: f64 = 1.3;

/// Immutable system description consumed by every analysis module.
///
/// Parse from a file with [`AnalysisConfig::from_path`], from strings with
/// [`AnalysisConfig::from_toml_str`] or [`AnalysisConfig::from_json_str`], or
/// start from one of the named [`presets`](AnalysisConfig::PRESETS). Unknown keys are rejected at parse
/// time; range checks happen in [`AnalysisConfig::validate`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// PV nameplate capacity (kWp, must be > 0).
    pub pv_kwp: f64,
    /// Inverter AC rating (kW). Defaults to `pv_kwp / 1.3`.
    #[serde(default)]
    pub inverter_kw: Option<f64>,
    /// Whether a home battery is installed.
    #[serde(default = "default_true")]
    pub has_battery: bool,
    /// Battery nameplate capacity (kWh). Defaults to 0.
    #[serde(default)]
    pub battery_nominal_kwh: Option<f64>,
    /// Whether the household charges an EV/PHEV at home.
    #[serde(default)]
    pub has_ev: bool,
    /// Export credit as a fraction of the import rate (0 = no feed-in).
    #[serde(default)]
    pub feedin_ratio: f64,
    /// Extra panel capacity to simulate (kWp, 0 = no scenario).
    #[serde(default)]
    pub additional_kwp: f64,
    /// Per-month overrides of the seasonal PV factor, keyed by month number
    /// (`"1"` or `"01"` for January).
    #[serde(default)]
    pub seasonal_factors: BTreeMap<String, f64>,
    /// Climate band used for months without an override.
    #[serde(default)]
    pub climate_band: Option<ClimateBand>,
    /// Site latitude in degrees; picks the band and hemisphere when set.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Hemisphere override; otherwise derived from `latitude` (north if unset).
    #[serde(default)]
    pub hemisphere: Option<Hemisphere>,
    /// Grid emission factor (kg CO2 per kWh).
    #[serde(default = "default_emission_factor")]
    pub grid_emission_factor: f64,
    /// Import tariff used for bill and ROI modeling.
    #[serde(default)]
    pub tariff: Tariff,
    /// Investment figures; ROI is skipped when absent.
    #[serde(default)]
    pub roi: Option<RoiConfig>,
    /// Display currency symbol, passed through to the report untouched.
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// Calendar month (1-12) named by a seasonal override key such as `"1"` or `"01"`.
fn override_month(key: &str) -> Option<usize> {
    key.parse::<usize>().ok().filter(|m| (1..=12).contains(m))
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn default_true() -> bool {
    true
}

fn default_emission_factor() -> f64 {
    0.5
}

fn default_currency() -> String {
    "$".to_string()
}

/// Climate band selecting a row of the built-in seasonal factor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateBand {
    Tropical,
    Subtropical,
    Temperate,
    HighLatitude,
}

impl ClimateBand {
    /// Band for an absolute latitude in degrees.
    pub fn from_latitude(latitude: f64) -> Self {
        match latitude.abs() {
            l if l < 15.0 => Self::Tropical,
            l if l < 30.0 => Self::Subtropical,
            l if l < 55.0 => Self::Temperate,
            _ => Self::HighLatitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hemisphere {
    North,
    South,
}

/// Import tariff, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tariff {
    /// Single rate for every kWh.
    Flat { rate: f64 },
    /// Volume tiers per monthly billing period.
    Tiered {
        /// Ascending tier ceilings with their rates.
        tiers: Vec<TariffTier>,
        /// Rate beyond the last ceiling; defaults to the last tier's rate.
        #[serde(default)]
        above_rate: Option<f64>,
    },
    /// Time-of-use: peak windows at `peak_rate`, everything else off-peak.
    Tou {
        peak_windows: Vec<PeakWindow>,
        peak_rate: f64,
        offpeak_rate: f64,
    },
}

impl Default for Tariff {
    fn default() -> Self {
        Self::Flat { rate: 0.0 }
    }
}

impl Tariff {
    /// Short label used in the report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Flat { .. } => "flat",
            Self::Tiered { .. } => "tiered",
            Self::Tou { .. } => "tou",
        }
    }

    /// Rate used when a single import rate is needed (feed-in credit, panel
    /// savings): the flat rate, the first tier, or the off-peak rate.
    pub fn reference_rate(&self) -> f64 {
        match self {
            Self::Flat { rate } => *rate,
            Self::Tiered { tiers, above_rate } => tiers
                .first()
                .map(|t| t.rate)
                .or(*above_rate)
                .unwrap_or(0.0),
            Self::Tou { offpeak_rate, .. } => *offpeak_rate,
        }
    }

    /// Import rate in force during `hour` for time-independent lookups.
    ///
    /// Tiered tariffs return the first-tier rate; the volume split is done
    /// by the bill meter.
    pub fn rate_at_hour(&self, hour: u8) -> f64 {
        match self {
            Self::Tou {
                peak_windows,
                peak_rate,
                offpeak_rate,
            } => {
                if peak_windows.iter().any(|w| w.contains(hour)) {
                    *peak_rate
                } else {
                    *offpeak_rate
                }
            }
            Self::Flat { .. } | Self::Tiered { .. } => self.reference_rate(),
        }
    }
}

/// One volume tier: kWh up to (and including) `up_to_kwh` cost `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TariffTier {
    /// Cumulative monthly ceiling of this tier (kWh).
    pub up_to_kwh: f64,
    /// Price per kWh inside this tier.
    pub rate: f64,
}

/// Peak window `[start_hour, end_hour)`; wraps past midnight when
/// `start_hour > end_hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PeakWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl PeakWindow {
    /// Whether `hour` falls inside the window.
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Investment figures for payback modeling.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoiConfig {
    /// Total installed cost, battery included.
    pub total_cost: f64,
    /// Battery share of `total_cost`; enables the without-battery scenario.
    #[serde(default)]
    pub battery_cost: Option<f64>,
    /// Years the system has already been running.
    #[serde(default)]
    pub system_age_years: f64,
}

impl AnalysisConfig {
    /// Minimal configuration: PV size only, every other field at its default.
    pub fn new(pv_kwp: f64) -> Self {
        Self {
            pv_kwp,
            inverter_kw: None,
            has_battery: true,
            battery_nominal_kwh: None,
            has_ev: false,
            feedin_ratio: 0.0,
            additional_kwp: 0.0,
            seasonal_factors: BTreeMap::new(),
            climate_band: None,
            latitude: None,
            hemisphere: None,
            grid_emission_factor: default_emission_factor(),
            tariff: Tariff::default(),
            roi: None,
            currency: default_currency(),
        }
    }

    /// Inverter AC rating in kW, defaulting to `pv_kwp / 1.3`.
    pub fn inverter_kw(&self) -> f64 {
        self.inverter_kw
            .unwrap_or(self.pv_kwp / DEFAULT_DC_AC_RATIO)
    }

    /// Battery nameplate capacity in kWh, 0 when absent.
    pub fn battery_nominal_kwh(&self) -> f64 {
        self.battery_nominal_kwh.unwrap_or(0.0)
    }

    /// Climate band: explicit, else from latitude, else temperate.
    pub fn climate_band(&self) -> ClimateBand {
        self.climate_band
            .or(self.latitude.map(ClimateBand::from_latitude))
            .unwrap_or(ClimateBand::Temperate)
    }

    /// Hemisphere: explicit, else south for negative latitudes, else north.
    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere.unwrap_or(match self.latitude {
            Some(lat) if lat < 0.0 => Hemisphere::South,
            _ => Hemisphere::North,
        })
    }

    /// Seasonal overrides by month index, 0 = January.
    ///
    /// Keys that do not name a month are skipped; `validate` reports them.
    pub fn seasonal_overrides(&self) -> [Option<f64>; 12] {
        let mut overrides = [None; 12];
        for (key, factor) in &self.seasonal_factors {
            if let Some(month) = override_month(key) {
                overrides[month - 1] = Some(*factor);
            }
        }
        overrides
    }

    /// Years in service, 0 when no ROI block is given.
    pub fn system_age_years(&self) -> f64 {
        self.roi.as_ref().map_or(0.0, |r| r.system_age_years)
    }

    /// Returns the flat-rate preset: 6 kWp, 10 kWh battery, no EV.
    pub fn flat_basic() -> Self {
        Self {
            inverter_kw: Some(5.0),
            battery_nominal_kwh: Some(10.0),
            feedin_ratio: 0.5,
            tariff: Tariff::Flat { rate: 0.25 },
            ..Self::new(6.0)
        }
    }

    /// Returns the tiered preset: EV household on a two-tier tariff.
    pub fn tiered_ev() -> Self {
        Self {
            inverter_kw: Some(8.0),
            battery_nominal_kwh: Some(13.5),
            has_ev: true,
            feedin_ratio: 0.3,
            tariff: Tariff::Tiered {
                tiers: vec![
                    TariffTier {
                        up_to_kwh: 200.0,
                        rate: 0.15,
                    },
                    TariffTier {
                        up_to_kwh: 400.0,
                        rate: 0.25,
                    },
                ],
                above_rate: Some(0.35),
            },
            roi: Some(RoiConfig {
                total_cost: 18_000.0,
                battery_cost: Some(7_000.0),
                system_age_years: 1.0,
            }),
            ..Self::new(10.0)
        }
    }

    /// Returns the TOU preset: evening peak window, southern temperate site.
    pub fn tou_battery() -> Self {
        Self {
            inverter_kw: Some(5.0),
            battery_nominal_kwh: Some(10.0),
            feedin_ratio: 0.4,
            latitude: Some(-33.9),
            tariff: Tariff::Tou {
                peak_windows: vec![PeakWindow {
                    start_hour: 17,
                    end_hour: 21,
                }],
                peak_rate: 0.45,
                offpeak_rate: 0.20,
            },
            ..Self::new(6.6)
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["flat_basic", "tiered_ev", "tou_battery"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "flat_basic" => Ok(Self::flat_basic()),
            "tiered_ev" => Ok(Self::tiered_ev()),
            "tou_battery" => Ok(Self::tou_battery()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration file, choosing JSON for `.json` and TOML
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or does not parse.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the JSON is invalid or contains unknown fields.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::new("json", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if !is_positive(self.pv_kwp) {
            errors.push(ConfigError::new("pv_kwp", "must be > 0"));
        }
        if self.inverter_kw.is_some_and(|kw| !is_positive(kw)) {
            errors.push(ConfigError::new("inverter_kw", "must be > 0"));
        }
        if self.battery_nominal_kwh.is_some_and(|kwh| kwh < 0.0) {
            errors.push(ConfigError::new("battery_nominal_kwh", "must be >= 0"));
        }
        if self.feedin_ratio < 0.0 {
            errors.push(ConfigError::new("feedin_ratio", "must be >= 0"));
        }
        if self.additional_kwp < 0.0 {
            errors.push(ConfigError::new("additional_kwp", "must be >= 0"));
        }
        if self.grid_emission_factor < 0.0 {
            errors.push(ConfigError::new("grid_emission_factor", "must be >= 0"));
        }
        if self.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            errors.push(ConfigError::new("latitude", "must be in [-90, 90]"));
        }

        for (key, factor) in &self.seasonal_factors {
            let field = format!("seasonal_factors.{key}");
            if override_month(key).is_none() {
                errors.push(ConfigError::new(&field, "key must be a month number 1-12"));
            }
            if !is_positive(*factor) {
                errors.push(ConfigError::new(field, "must be > 0"));
            }
        }

        match &self.tariff {
            Tariff::Flat { rate } => {
                if *rate < 0.0 {
                    errors.push(ConfigError::new("tariff.rate", "must be >= 0"));
                }
            }
            Tariff::Tiered { tiers, above_rate } => {
                if tiers.is_empty() {
                    errors.push(ConfigError::new("tariff.tiers", "must not be empty"));
                }
                let ascending = tiers
                    .windows(2)
                    .all(|pair| pair[0].up_to_kwh < pair[1].up_to_kwh);
                if !ascending {
                    errors.push(ConfigError::new(
                        "tariff.tiers",
                        "ceilings must be strictly ascending",
                    ));
                }
                if tiers.iter().any(|t| t.up_to_kwh <= 0.0 || t.rate < 0.0) {
                    errors.push(ConfigError::new(
                        "tariff.tiers",
                        "ceilings must be > 0 and rates >= 0",
                    ));
                }
                if above_rate.is_some_and(|r| r < 0.0) {
                    errors.push(ConfigError::new("tariff.above_rate", "must be >= 0"));
                }
            }
            Tariff::Tou {
                peak_windows,
                peak_rate,
                offpeak_rate,
            } => {
                if peak_windows
                    .iter()
                    .any(|w| w.start_hour > 23 || w.end_hour > 24 || w.start_hour == w.end_hour)
                {
                    errors.push(ConfigError::new(
                        "tariff.peak_windows",
                        "hours must be 0-24 and start != end",
                    ));
                }
                if *peak_rate < 0.0 || *offpeak_rate < 0.0 {
                    errors.push(ConfigError::new("tariff", "rates must be >= 0"));
                }
            }
        }

        if let Some(roi) = &self.roi {
            if !is_positive(roi.total_cost) {
                errors.push(ConfigError::new("roi.total_cost", "must be > 0"));
            }
            if roi.system_age_years < 0.0 {
                errors.push(ConfigError::new("roi.system_age_years", "must be >= 0"));
            }
            if roi
                .battery_cost
                .is_some_and(|cost| cost < 0.0 || cost >= roi.total_cost)
            {
                errors.push(ConfigError::new(
                    "roi.battery_cost",
                    "must be >= 0 and below roi.total_cost",
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_are_valid() {
        for name in AnalysisConfig::PRESETS {
            let cfg = AnalysisConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = AnalysisConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err();
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
pv_kwp = 8.2
inverter_kw = 6.0
battery_nominal_kwh = 10.0
has_ev = true
feedin_ratio = 0.5
grid_emission_factor = 0.4
currency = "€"

[seasonal_factors]
"1" = 0.4
"7" = 1.6

[tariff]
type = "tou"
peak_rate = 0.4
offpeak_rate = 0.2
peak_windows = [{ start_hour = 17, end_hour = 21 }]

[roi]
total_cost = 12000.0
battery_cost = 5000.0
system_age_years = 2.0
"#;
        let cfg = AnalysisConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.pv_kwp), Some(8.2));
        assert_eq!(cfg.as_ref().map(|c| c.tariff.kind()), Some("tou"));
        assert_eq!(cfg.as_ref().map(AnalysisConfig::system_age_years), Some(2.0));
        assert_eq!(
            cfg.as_ref().map(|c| c.validate().is_empty()),
            Some(true)
        );
    }

    #[test]
    fn json_config_parses() {
        let json = r#"{
            "pv_kwp": 5.0,
            "has_battery": false,
            "tariff": {"type": "tiered", "tiers": [{"up_to_kwh": 200, "rate": 0.1}]}
        }"#;
        let cfg = AnalysisConfig::from_json_str(json);
        assert!(cfg.is_ok(), "valid JSON should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.has_battery), Some(false));
        assert_eq!(cfg.as_ref().map(|c| c.tariff.reference_rate()), Some(0.1));
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
pv_kwp = 5.0
bogus_field = true
"#;
        assert!(AnalysisConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn missing_pv_size_is_a_parse_error() {
        assert!(AnalysisConfig::from_toml_str("has_ev = true").is_err());
    }

    #[test]
    fn optional_fields_use_stated_defaults() {
        let cfg = AnalysisConfig::from_toml_str("pv_kwp = 6.5");
        assert!(cfg.is_ok());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.inverter_kw()), Some(5.0));
        assert_eq!(cfg.as_ref().map(|c| c.battery_nominal_kwh()), Some(0.0));
        assert_eq!(cfg.as_ref().map(|c| c.has_battery), Some(true));
        assert_eq!(cfg.as_ref().map(|c| c.currency.as_str()), Some("$"));
        assert_eq!(cfg.as_ref().map(|c| c.grid_emission_factor), Some(0.5));
    }

    #[test]
    fn validation_catches_zero_pv() {
        let cfg = AnalysisConfig::new(0.0);
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "pv_kwp"));
    }

    #[test]
    fn validation_catches_unsorted_tiers() {
        let mut cfg = AnalysisConfig::tiered_ev();
        cfg.tariff = Tariff::Tiered {
            tiers: vec![
                TariffTier {
                    up_to_kwh: 400.0,
                    rate: 0.2,
                },
                TariffTier {
                    up_to_kwh: 200.0,
                    rate: 0.1,
                },
            ],
            above_rate: None,
        };
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "tariff.tiers"));
    }

    #[test]
    fn validation_catches_bad_seasonal_key() {
        let mut cfg = AnalysisConfig::flat_basic();
        cfg.seasonal_factors.insert("13".to_string(), 1.0);
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "seasonal_factors.13"));
    }

    #[test]
    fn zero_padded_seasonal_key_is_applied() {
        let mut cfg = AnalysisConfig::flat_basic();
        cfg.seasonal_factors.insert("01".to_string(), 3.0);
        cfg.seasonal_factors.insert("12".to_string(), 0.4);
        assert!(cfg.validate().is_empty());

        let overrides = cfg.seasonal_overrides();
        assert_eq!(overrides[0], Some(3.0));
        assert_eq!(overrides[11], Some(0.4));
        assert_eq!(overrides[5], None);
    }

    #[test]
    fn validation_catches_battery_cost_above_total() {
        let mut cfg = AnalysisConfig::tiered_ev();
        if let Some(roi) = cfg.roi.as_mut() {
            roi.battery_cost = Some(roi.total_cost + 1.0);
        }
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "roi.battery_cost"));
    }

    #[test]
    fn peak_window_wraps_midnight() {
        let w = PeakWindow {
            start_hour: 22,
            end_hour: 6,
        };
        assert!(w.contains(23));
        assert!(w.contains(0));
        assert!(w.contains(5));
        assert!(!w.contains(6));
        assert!(!w.contains(12));
    }

    #[test]
    fn tou_rate_lookup_by_hour() {
        let cfg = AnalysisConfig::tou_battery();
        assert_eq!(cfg.tariff.rate_at_hour(18), 0.45);
        assert_eq!(cfg.tariff.rate_at_hour(21), 0.20);
        assert_eq!(cfg.tariff.rate_at_hour(3), 0.20);
    }

    #[test]
    fn climate_band_from_latitude() {
        assert_eq!(ClimateBand::from_latitude(5.0), ClimateBand::Tropical);
        assert_eq!(ClimateBand::from_latitude(-25.0), ClimateBand::Subtropical);
        assert_eq!(ClimateBand::from_latitude(48.1), ClimateBand::Temperate);
        assert_eq!(ClimateBand::from_latitude(60.0), ClimateBand::HighLatitude);
    }
}
