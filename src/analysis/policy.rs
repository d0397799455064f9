//! Heuristic thresholds used across the analysis modules.
//!
//! Kept in one table so each cutoff can be tuned and tested without touching
//! module logic.

/// Minimum hourly rows for a day to count as complete.
pub const COMPLETE_DAY_MIN_RECORDS: usize = 21;
/// Minutes represented by one sub-sample in the `Readings` column.
pub const MINUTES_PER_READING: f64 = 5.0;
/// Slack allowed on `min_soc <= avg_soc <= max_soc` (exporters truncate).
pub const SOC_ORDER_TOLERANCE_PCT: f64 = 1.0;

/// Absolute floor of the EV-day load margin (kWh).
pub const EV_THRESHOLD_FLOOR_KWH: f64 = 8.0;
/// EV-day load margin as a fraction of mean daily load.
pub const EV_THRESHOLD_FRACTION: f64 = 0.3;
/// Hourly load excess on EV days that marks an EV charging hour (W).
pub const EV_CHARGING_HOUR_DELTA_W: f64 = 500.0;

/// Hourly weekday/weekend load difference reported as significant (W).
pub const WEEKDAY_DIFF_W: f64 = 200.0;
/// Fraction of the best hourly PV average that still counts as a peak hour.
pub const PEAK_PV_HOUR_FRACTION: f64 = 0.5;
/// Average SOC above which a falling charge rate is reported as taper.
pub const TAPER_SOC_PCT: f64 = 90.0;
/// Evening window for overnight drain (inclusive hours).
pub const EVENING_HOURS: [u8; 3] = [18, 19, 20];
/// Morning window for overnight drain (inclusive hours).
pub const MORNING_HOURS: [u8; 2] = [5, 6];

/// Max PV over inverter rating at which the inverter is called limiting.
pub const INVERTER_LIMITED_RATIO: f64 = 0.95;
/// Fraction of panel nameplate above which an hour counts as panel clipping.
pub const PANEL_CLIP_RATIO: f64 = 0.85;

/// Minimum SOC decline (percentage points) for a usable-capacity estimate.
pub const USABLE_DECLINE_MIN_PCT: f64 = 30.0;
/// Usable fraction of nameplate assumed when no day qualifies.
pub const USABLE_FALLBACK_FRACTION: f64 = 0.9;
/// Rated full cycles of an LFP battery.
pub const LFP_RATED_CYCLES: f64 = 6000.0;
/// SOC at or above which the battery is treated as full.
pub const BATTERY_FULL_SOC_PCT: f64 = 98.0;

/// Day PV below this fraction of the reference is a shortfall.
pub const PV_SHORTFALL_RATIO: f64 = 0.6;
/// Trailing window for the PV reference (days).
pub const PV_REFERENCE_WINDOW_DAYS: usize = 14;
/// Leading days of the dataset that are never flagged.
pub const PV_WARMUP_DAYS: usize = 3;
/// Standard deviations above the mean for a load spike.
pub const LOAD_SPIKE_SIGMA: f64 = 2.0;
/// Non-EV days required before load spikes are evaluated.
pub const LOAD_SPIKE_MIN_DAYS: usize = 5;
/// Daily discharge/charge ratio below which efficiency is anomalous.
pub const BATTERY_EFFICIENCY_FLOOR: f64 = 0.8;
/// Max start/end SOC gap for the daily efficiency check (points).
pub const BATTERY_SOC_BALANCE_PCT: f64 = 5.0;
/// Minimum daily charge for the efficiency check (kWh).
pub const BATTERY_MIN_CHARGE_KWH: f64 = 1.0;

/// Relative month-over-month change reported as a shift.
pub const TREND_SHIFT_RATIO: f64 = 0.1;

/// Yearly PV output degradation.
pub const ANNUAL_DEGRADATION: f64 = 0.005;
/// Years searched for payback.
pub const ROI_HORIZON_YEARS: usize = 50;
/// Years summed for lifetime savings.
pub const LIFETIME_YEARS: usize = 25;
/// Days represented by one projected month.
pub const DAYS_PER_MONTH: f64 = 30.44;
/// Days used to annualize observed figures.
pub const DAYS_PER_YEAR: f64 = 365.0;
/// Months of data below which the projection confidence is low.
pub const PROJECTION_MODERATE_MONTHS: usize = 3;
/// Months of data from which the projection confidence is high.
pub const PROJECTION_HIGH_MONTHS: usize = 6;

/// CO2 absorbed by one tree per year (kg).
pub const KG_CO2_PER_TREE: f64 = 22.0;
/// CO2 emitted per km driven by an average car (kg).
pub const KG_CO2_PER_KM: f64 = 0.21;
