/// Report export (JSON and monthly CSV).
pub mod export;
/// Monthly telemetry CSV loading.
pub mod loader;
