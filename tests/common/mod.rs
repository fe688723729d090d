#![allow(dead_code)]

use field_ap_controller::{
    access_point::AccessPointSettings,
    error::ApError,
    ssh_client::{CommandRunner, DeviceTarget},
    types::{DeviceKind, STATION_COUNT, Team, TeamAssignment},
};
use regex::Regex;
use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, Mutex},
};

static SSID_DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@wifi-iface\[(\d+)\]\.ssid='([^']*)'").unwrap());

static CHANNEL_DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"wireless\.radio0\.channel='(\d+)'").unwrap());

pub fn settings(kind: DeviceKind) -> AccessPointSettings {
    AccessPointSettings {
        kind,
        address: "10.0.100.2".to_string(),
        username: "root".to_string(),
        password: "password".to_string(),
        team_channel: 157,
        network_security_enabled: true,
    }
}

pub fn assignment(teams: &[(usize, u32)]) -> TeamAssignment {
    let mut assignment = TeamAssignment::default();
    for &(position, id) in teams {
        assignment[position - 1] = Some(Team::new(id, format!("wpakey{id:04}")));
    }
    assignment
}

struct ScriptedFailure {
    pattern: String,
    remaining: usize,
    error: ApError,
}

struct DeviceState {
    kind: DeviceKind,
    staged: [String; STATION_COUNT],
    committed: [String; STATION_COUNT],
    live: [String; STATION_COUNT],
    channel: Option<u16>,
    commands: Vec<String>,
    failures: Vec<ScriptedFailure>,
    ignored_reloads: usize,
    bandwidth: HashMap<String, String>,
    status_override: Option<String>,
}

/// In-memory OpenWRT access point understanding the handful of commands the
/// controller sends
#[derive(Clone)]
pub struct FakeAccessPoint {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeAccessPoint {
    pub fn new(kind: DeviceKind) -> Self {
        let placeholders: [String; STATION_COUNT] =
            std::array::from_fn(|i| format!("no-team-{}", i + 1));

        Self {
            state: Arc::new(Mutex::new(DeviceState {
                kind,
                staged: placeholders.clone(),
                committed: placeholders.clone(),
                live: placeholders,
                channel: None,
                commands: Vec::new(),
                failures: Vec::new(),
                ignored_reloads: 0,
                bandwidth: HashMap::new(),
                status_override: None,
            })),
        }
    }

    /// Fails the next `count` commands containing `pattern` with `error`.
    pub fn fail_next(&self, pattern: &str, count: usize, error: ApError) {
        self.state.lock().unwrap().failures.push(ScriptedFailure {
            pattern: pattern.to_string(),
            remaining: count,
            error,
        });
    }

    /// Makes the next `count` reloads leave the live networks unchanged.
    pub fn ignore_reloads(&self, count: usize) {
        self.state.lock().unwrap().ignored_reloads = count;
    }

    pub fn set_bandwidth(&self, interface: &str, output: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .bandwidth
            .insert(interface.to_string(), output.into());
    }

    pub fn set_status_output(&self, output: Option<&str>) {
        self.state.lock().unwrap().status_override = output.map(str::to_string);
    }

    pub fn live_ssids(&self) -> Vec<String> {
        self.state.lock().unwrap().live.to_vec()
    }

    pub fn channel(&self) -> Option<u16> {
        self.state.lock().unwrap().channel
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn batch_commands(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with("uci batch <<'ENDCONFIG'\n"))
            .collect()
    }

    pub fn clear_commands(&self) {
        self.state.lock().unwrap().commands.clear();
    }
}

impl DeviceState {
    fn execute(&mut self, command: &str) -> Result<String, ApError> {
        self.commands.push(command.to_string());

        if let Some(failure) = self
            .failures
            .iter_mut()
            .find(|f| f.remaining > 0 && command.contains(&f.pattern))
        {
            failure.remaining -= 1;
            return Err(failure.error.clone());
        }

        if command.starts_with("uci batch") {
            if let Some(caps) = CHANNEL_DIRECTIVE_RE.captures(command) {
                self.channel = caps[1].parse().ok();
            }
            for caps in SSID_DIRECTIVE_RE.captures_iter(command) {
                let position: usize = caps[1].parse().unwrap();
                self.staged[position - 1] = caps[2].to_string();
            }
            return Ok(String::new());
        }

        match command {
            "uci commit wireless" => {
                self.committed = self.staged.clone();
                Ok(String::new())
            }
            "wifi reload" => {
                if self.ignored_reloads > 0 {
                    self.ignored_reloads -= 1;
                } else {
                    self.live = self.committed.clone();
                }
                Ok(String::new())
            }
            "iwinfo" => Ok(self
                .status_override
                .clone()
                .unwrap_or_else(|| self.render_iwinfo())),
            _ => match command.strip_prefix("luci-bwc -i ") {
                Some(interface) => Ok(self.bandwidth.get(interface).cloned().unwrap_or_default()),
                None => Err(ApError::CommandError {
                    exit_status: 127,
                    stderr: format!("sh: {command}: not found"),
                }),
            },
        }
    }

    fn render_iwinfo(&self) -> String {
        // radio0 is the admin network and never belongs to a team
        let mut output = String::from(
            "wlan1     ESSID: \"field-admin\"\n          Tx-Power: 20 dBm  Link Quality: 60/70\n\n",
        );

        for (interface, ssid) in self.kind.station_interfaces().iter().zip(&self.live) {
            let link_quality = if ssid.parse::<u32>().is_ok() {
                "70"
            } else {
                "unknown"
            };
            output.push_str(&format!(
                "{interface}     ESSID: \"{ssid}\"\n          Access Point: 4A:DA:35:B0:00:2C\n          Mode: Master  Channel: 157 (5.785 GHz)\n          Tx-Power: 23 dBm  Link Quality: {link_quality}/70\n          Encryption: WPA2 PSK (CCMP)\n\n"
            ));
        }

        output
    }
}

impl CommandRunner for FakeAccessPoint {
    async fn run_command(&self, _target: &DeviceTarget, command: &str) -> Result<String, ApError> {
        self.state.lock().unwrap().execute(command)
    }
}
