//! Throughput estimation from `luci-bwc` counter dumps
//!
//! `luci-bwc -i <iface>` prints roughly one row per second:
//! `[ timestamp, rx_bytes, rx_packets, tx_bytes, tx_packets ]`.

use regex::Regex;
use std::sync::LazyLock;

static SAMPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]*)\]").expect("invalid sample pattern"));

/// Rows needed before an estimate is available
const MIN_SAMPLES: usize = 7;
/// Rows between the baseline and the newest sample; the baseline is the 6th row from the end.
const BASELINE_OFFSET: usize = 5;
const WINDOW_SECS: f64 = 5.0;
const MEGABITS_PER_BYTE: f64 = 0.000008;

/// One counter row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterSample {
    pub timestamp: u64,
    pub rx_bytes: i64,
    pub tx_bytes: i64,
}

impl CounterSample {
    fn parse(row: &str) -> Option<Self> {
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            return None;
        }

        Some(Self {
            timestamp: fields[0].parse().ok()?,
            rx_bytes: fields[1].parse().ok()?,
            tx_bytes: fields[3].parse().ok()?,
        })
    }
}

/// Parses every well-formed row of a counter dump, oldest first.
pub fn parse_samples(response: &str) -> Vec<CounterSample> {
    SAMPLE_RE
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .filter_map(|row| CounterSample::parse(row.as_str()))
        .collect()
}

/// Five second average throughput in megabits per second.
///
/// Returns 0 while fewer than seven rows of history exist.
pub fn parse_btu(response: &str) -> f64 {
    let samples = parse_samples(response);
    if samples.len() < MIN_SAMPLES {
        return 0.0;
    }

    let last = samples[samples.len() - 1];
    let baseline = samples[samples.len() - 1 - BASELINE_OFFSET];
    // counters come from device text and may be garbage
    let delta_rx = last.rx_bytes.wrapping_sub(baseline.rx_bytes) as f64;
    let delta_tx = last.tx_bytes.wrapping_sub(baseline.tx_bytes) as f64;

    (delta_rx + delta_tx) * MEGABITS_PER_BYTE / WINDOW_SECS
}
