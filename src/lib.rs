//! Performance reports for hourly residential solar and battery telemetry.

pub mod analysis;
pub mod cli;
/// Site configuration, tariffs and presets.
pub mod config;
pub mod error;
pub mod io;
