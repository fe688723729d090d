use crate::{access_point::AccessPointSettings, types::DeviceKind};
use anyhow::{Context, Result};
use serde_valid::Validate;
use std::{env, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Access point connection and radio settings
    pub access_point: AccessPointSettings,

    /// Telemetry log configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub status_log_interval: Duration,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// The first successful load is cached for the lifetime of the process.
    pub fn get() -> Result<&'static Self> {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

        if let Some(config) = APP_CONFIG.get() {
            return Ok(config);
        }
        let config = Self::load()?;
        Ok(APP_CONFIG.get_or_init(|| config))
    }

    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Loads the configuration through `lookup`, which returns the value of a
    /// variable or `None` if it is not set.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let access_point = load_access_point(&lookup)?;
        let telemetry = TelemetryConfig::load(&lookup)?;

        Ok(Self {
            access_point,
            telemetry,
        })
    }
}

fn load_access_point(lookup: &impl Fn(&str) -> Option<String>) -> Result<AccessPointSettings> {
    let kind = lookup("AP_KIND")
        .unwrap_or_else(|| "linksys".to_string())
        .parse::<DeviceKind>()
        .map_err(anyhow::Error::msg)
        .context("failed to parse AP_KIND")?;
    let address = lookup("AP_ADDRESS").unwrap_or_else(|| "10.0.100.2".to_string());
    let username = lookup("AP_USERNAME").unwrap_or_else(|| "root".to_string());
    let password = lookup("AP_PASSWORD").unwrap_or_default();
    let team_channel = lookup("AP_TEAM_CHANNEL")
        .unwrap_or_else(|| "157".to_string())
        .parse::<u16>()
        .context("failed to parse AP_TEAM_CHANNEL: invalid format")?;
    let network_security_enabled = lookup("AP_NETWORK_SECURITY_ENABLED")
        .unwrap_or_else(|| "false".to_string())
        .parse::<bool>()
        .context("failed to parse AP_NETWORK_SECURITY_ENABLED: expected true or false")?;

    let settings = AccessPointSettings {
        kind,
        address,
        username,
        password,
        team_channel,
        network_security_enabled,
    };
    settings
        .validate()
        .context("invalid access point settings")?;

    Ok(settings)
}

impl TelemetryConfig {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secs = lookup("AP_STATUS_LOG_INTERVAL_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse::<u64>()
            .context("failed to parse AP_STATUS_LOG_INTERVAL_SECS: invalid format")?;
        anyhow::ensure!(secs > 0, "AP_STATUS_LOG_INTERVAL_SECS must be positive");

        Ok(Self {
            status_log_interval: Duration::from_secs(secs),
        })
    }
}
