//! Keeps the per-team WiFi networks of a field access point in sync with the
//! teams assigned to each station, and reports per-station link and
//! throughput telemetry.

pub mod access_point;
pub mod config;
pub mod error;
pub mod services;
pub mod ssh_client;
pub mod types;
