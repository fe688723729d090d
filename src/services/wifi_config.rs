//! Device configuration commands
//!
//! Maps a station assignment onto OpenWRT `uci` directives. Every write goes
//! through a `uci batch` here-document; the wireless subsystem only picks the
//! changes up after [`COMMIT_COMMAND`] and [`RELOAD_COMMAND`].

use crate::{
    error::ApError,
    types::{DeviceKind, STATION_COUNT, Team},
};

/// Persists staged wireless changes
pub const COMMIT_COMMAND: &str = "uci commit wireless";
/// Restarts the wireless subsystem with the committed configuration
pub const RELOAD_COMMAND: &str = "wifi reload";

const MIN_WPA_KEY_LENGTH: usize = 8;
const MAX_WPA_KEY_LENGTH: usize = 63;

/// Network name and passphrase used for a station without a team
pub fn placeholder_name(position: usize) -> String {
    format!("no-team-{position}")
}

/// Builds the `uci` directives provisioning one station.
///
/// `position` is 1-based. Without a team, name and passphrase both become the
/// station placeholder so all six radios stay up.
pub fn generate_station_config(
    kind: DeviceKind,
    team: Option<&Team>,
    position: usize,
) -> Result<String, ApError> {
    if !(1..=STATION_COUNT).contains(&position) {
        return Err(ApError::InvalidPosition(position));
    }

    let (ssid, key) = match team {
        None => (placeholder_name(position), placeholder_name(position)),
        Some(team) => {
            let key_length = team.wpa_key.len();
            if !(MIN_WPA_KEY_LENGTH..=MAX_WPA_KEY_LENGTH).contains(&key_length) {
                return Err(ApError::InvalidCredential {
                    team_id: team.id,
                    key_length,
                });
            }
            (team.id.to_string(), team.wpa_key.clone())
        }
    };

    let mut commands = vec![
        format!("set wireless.@wifi-iface[{position}].disabled='0'"),
        format!("set wireless.@wifi-iface[{position}].ssid='{ssid}'"),
        format!("set wireless.@wifi-iface[{position}].key='{key}'"),
    ];
    if kind.requires_sae_password() {
        commands.push(format!(
            "set wireless.@wifi-iface[{position}].sae_password='{key}'"
        ));
    }

    Ok(commands.join("\n"))
}

/// Wraps directives into a single `uci batch` shell command.
pub fn batch_command(directives: &str) -> String {
    format!("uci batch <<'ENDCONFIG'\n{directives}\nENDCONFIG\n")
}

/// Sets the team radio channel and restarts that radio.
pub fn admin_settings_command(team_channel: u16) -> String {
    let directives = [
        format!("set wireless.radio0.channel='{team_channel}'"),
        "commit wireless".to_string(),
    ];
    format!(
        "uci batch <<'ENDCONFIG' && wifi radio0\n{}\nENDCONFIG\n",
        directives.join("\n")
    )
}

/// Counter dump for one station interface
pub fn bandwidth_command(interface: &str) -> String {
    format!("luci-bwc -i {interface}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team_with_key(key: &str) -> Team {
        Team::new(254, key)
    }

    #[test]
    fn placeholder_config_for_every_position() {
        for position in 1..=STATION_COUNT {
            let config = generate_station_config(DeviceKind::Linksys, None, position).unwrap();
            assert_eq!(
                config,
                format!(
                    "set wireless.@wifi-iface[{position}].disabled='0'\n\
                     set wireless.@wifi-iface[{position}].ssid='no-team-{position}'\n\
                     set wireless.@wifi-iface[{position}].key='no-team-{position}'"
                )
            );
        }
    }

    #[test]
    fn team_config_uses_id_and_key() {
        let team = team_with_key("11111111");
        let config = generate_station_config(DeviceKind::Linksys, Some(&team), 3).unwrap();
        assert!(config.contains("set wireless.@wifi-iface[3].ssid='254'"));
        assert!(config.contains("set wireless.@wifi-iface[3].key='11111111'"));
        assert!(!config.contains("sae_password"));
    }

    #[test]
    fn vivid_adds_sae_password() {
        let team = team_with_key("11111111");
        let config = generate_station_config(DeviceKind::Vivid, Some(&team), 6).unwrap();
        assert!(config.ends_with("set wireless.@wifi-iface[6].sae_password='11111111'"));

        let config = generate_station_config(DeviceKind::Vivid, None, 2).unwrap();
        assert!(config.ends_with("set wireless.@wifi-iface[2].sae_password='no-team-2'"));
    }

    #[test]
    fn positions_outside_range_are_rejected() {
        for position in [0, 7, 100] {
            assert_eq!(
                generate_station_config(DeviceKind::Linksys, None, position),
                Err(ApError::InvalidPosition(position))
            );
        }
    }

    #[test]
    fn wpa_key_length_bounds() {
        for length in [8, 63] {
            let team = team_with_key(&"k".repeat(length));
            assert!(generate_station_config(DeviceKind::Vivid, Some(&team), 1).is_ok());
        }

        for length in [0, 7, 64] {
            let team = team_with_key(&"k".repeat(length));
            assert_eq!(
                generate_station_config(DeviceKind::Vivid, Some(&team), 1),
                Err(ApError::InvalidCredential {
                    team_id: 254,
                    key_length: length
                })
            );
        }
    }

    #[test]
    fn batch_command_wraps_directives_in_heredoc() {
        assert_eq!(
            batch_command("set a='1'\nset b='2'"),
            "uci batch <<'ENDCONFIG'\nset a='1'\nset b='2'\nENDCONFIG\n"
        );
    }

    #[test]
    fn admin_command_sets_channel_and_restarts_radio() {
        assert_eq!(
            admin_settings_command(157),
            "uci batch <<'ENDCONFIG' && wifi radio0\n\
             set wireless.radio0.channel='157'\n\
             commit wireless\n\
             ENDCONFIG\n"
        );
    }
}
