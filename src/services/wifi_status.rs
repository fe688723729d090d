//! Decoding of `iwinfo` output
//!
//! `iwinfo` prints one block per wireless interface:
//!
//! ```text
//! ath1      ESSID: "254"
//!           Access Point: 4A:DA:35:B0:00:2C
//!           Tx-Power: 23 dBm  Link Quality: 70/70
//! ```
//!
//! Stations are matched to blocks by interface name when every station
//! interface of the device is present. Otherwise the first six network names
//! and the first six link qualities are paired up by position.

use crate::{
    error::ApError,
    types::{STATION_COUNT, StationStatus, StationStatuses},
};
use regex::Regex;
use std::sync::LazyLock;

static SSID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ESSID: "([-\w ]*)""#).expect("invalid ESSID pattern"));

static LINK_QUALITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Link Quality: ([-\w ]+)/([-\w ]+)").expect("invalid link quality pattern")
});

static BLOCK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^(\S+)[ \t]+ESSID: "([-\w ]*)""#).expect("invalid block header pattern")
});

const UNKNOWN_LINK_QUALITY: &str = "unknown";

/// Decodes the six station networks from an `iwinfo` dump.
///
/// `interfaces` names the interface of each station; pass `None` to force
/// positional decoding. Throughput is left at zero for the caller to fill in.
pub fn decode_wifi_info(
    wifi_info: &str,
    interfaces: Option<&[&str; STATION_COUNT]>,
) -> Result<StationStatuses, ApError> {
    if let Some(statuses) = interfaces.and_then(|interfaces| decode_by_interface(wifi_info, interfaces))
    {
        return Ok(statuses);
    }

    decode_by_position(wifi_info)
}

fn decode_by_position(wifi_info: &str) -> Result<StationStatuses, ApError> {
    let ssids: Vec<&str> = SSID_RE
        .captures_iter(wifi_info)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    let link_qualities: Vec<&str> = LINK_QUALITY_RE
        .captures_iter(wifi_info)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    // There should be six networks present -- one for each team on the 5GHz radio.
    if ssids.len() < STATION_COUNT || link_qualities.len() < STATION_COUNT {
        return Err(ApError::MalformedStatus {
            ssids: ssids.len(),
            link_qualities: link_qualities.len(),
        });
    }

    Ok(std::array::from_fn(|i| {
        station_status(ssids[i], link_qualities[i])
    }))
}

fn decode_by_interface(
    wifi_info: &str,
    interfaces: &[&str; STATION_COUNT],
) -> Option<StationStatuses> {
    let headers: Vec<_> = BLOCK_HEADER_RE.captures_iter(wifi_info).collect();

    let blocks: Vec<(&str, &str, Option<&str>)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let start = caps.get(0)?.start();
            let end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(wifi_info.len(), |m| m.start());
            let link_quality = LINK_QUALITY_RE
                .captures(&wifi_info[start..end])
                .and_then(|lq| lq.get(1))
                .map(|m| m.as_str());
            Some((caps.get(1)?.as_str(), caps.get(2)?.as_str(), link_quality))
        })
        .collect();

    let mut statuses = StationStatuses::default();
    for (status, interface) in statuses.iter_mut().zip(interfaces) {
        let (_, ssid, link_quality) = blocks.iter().find(|(name, ..)| name == interface)?;
        *status = station_status(ssid, (*link_quality)?);
    }
    Some(statuses)
}

fn station_status(ssid: &str, link_quality: &str) -> StationStatus {
    StationStatus {
        // Any non-numeric network name (e.g. a placeholder) means no team.
        team_id: ssid.parse().unwrap_or(0),
        radio_linked: link_quality != UNKNOWN_LINK_QUALITY,
        megabits_per_second: 0.0,
    }
}
