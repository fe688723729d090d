use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Number of team stations (radios) on the field
pub const STATION_COUNT: usize = 6;

/// Team as consumed from the competition data model
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: u32,
    pub wpa_key: String,
}

impl Team {
    pub fn new(id: u32, wpa_key: impl Into<String>) -> Self {
        Self {
            id,
            wpa_key: wpa_key.into(),
        }
    }
}

/// One optional team per station, index 0-5 (stations 1-6)
pub type TeamAssignment = [Option<Team>; STATION_COUNT];

/// Observed state of one station network
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatus {
    /// 0 when the network carries no team (placeholder or unparseable name)
    pub team_id: u32,
    pub radio_linked: bool,
    pub megabits_per_second: f64,
}

/// Status of all stations, index-aligned with [`TeamAssignment`]
pub type StationStatuses = [StationStatus; STATION_COUNT];

/// Supported access point hardware
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Linksys WRT1900ACS running OpenWRT
    #[default]
    Linksys,
    /// Vivid-Hosting VH-109
    Vivid,
}

impl DeviceKind {
    /// WPA3 needs the passphrase repeated as `sae_password`.
    pub fn requires_sae_password(self) -> bool {
        matches!(self, DeviceKind::Vivid)
    }

    /// The Linksys radio crashes when reconfigured live unless it is blanked first.
    pub fn blank_before_configure(self) -> bool {
        matches!(self, DeviceKind::Linksys)
    }

    /// Wireless interface carrying each station network
    pub fn station_interfaces(self) -> &'static [&'static str; STATION_COUNT] {
        match self {
            DeviceKind::Vivid => &["ath1", "ath11", "ath12", "ath13", "ath14", "ath15"],
            DeviceKind::Linksys => &["ath0", "ath0-1", "ath0-2", "ath0-3", "ath0-4", "ath0-5"],
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Linksys => write!(f, "linksys"),
            DeviceKind::Vivid => write!(f, "vivid"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linksys" => Ok(DeviceKind::Linksys),
            "vivid" => Ok(DeviceKind::Vivid),
            other => Err(format!("unknown access point kind '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_kind_parses_case_insensitively() {
        assert_eq!("Vivid".parse::<DeviceKind>(), Ok(DeviceKind::Vivid));
        assert_eq!(" linksys ".parse::<DeviceKind>(), Ok(DeviceKind::Linksys));
        assert!("netgear".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn device_kind_round_trips_through_display() {
        for kind in [DeviceKind::Linksys, DeviceKind::Vivid] {
            assert_eq!(kind.to_string().parse::<DeviceKind>(), Ok(kind));
        }
    }

    #[test]
    fn station_status_serializes_camel_case() {
        let status = StationStatus {
            team_id: 254,
            radio_linked: true,
            megabits_per_second: 1.5,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(
            json,
            r#"{"teamId":254,"radioLinked":true,"megabitsPerSecond":1.5}"#
        );
    }
}
