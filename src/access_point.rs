//! Access point controller
//!
//! Owns the per-team WiFi configuration of the field access point. A single
//! control loop ([`AccessPoint::run`]) either applies the most recently
//! submitted station assignment or, when nothing is pending, polls network
//! status and bandwidth every [`AccessPoint::POLL_PERIOD`].
//!
//! Applying an assignment never gives up: failed station writes are retried
//! after [`AccessPoint::CONFIG_RETRY_INTERVAL`] and a failed verification
//! restarts the pass from station 1. [`AccessPoint::metrics`] exposes the
//! retry counters so a stuck cycle is visible.

use crate::{
    error::ApError,
    services::{
        bandwidth::parse_btu,
        wifi_config::{
            COMMIT_COMMAND, RELOAD_COMMAND, admin_settings_command, bandwidth_command,
            batch_command, generate_station_config,
        },
        wifi_status::decode_wifi_info,
    },
    ssh_client::{CommandRunner, DeviceTarget},
    types::{DeviceKind, STATION_COUNT, StationStatuses, TeamAssignment},
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::{
    fmt,
    sync::{
        Arc, Mutex, OnceLock, PoisonError, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::Notify,
    time::{Instant, sleep, timeout_at},
};

/// Connection and radio settings of the access point
#[derive(Clone, Deserialize, Serialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessPointSettings {
    pub kind: DeviceKind,
    #[validate(min_length = 1)]
    pub address: String,
    pub username: String,
    pub password: String,
    #[validate(minimum = 1)]
    #[validate(maximum = 233)]
    pub team_channel: u16,
    /// When false the controller leaves the device alone.
    pub network_security_enabled: bool,
}

impl AccessPointSettings {
    fn target(&self) -> DeviceTarget {
        DeviceTarget {
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for AccessPointSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPointSettings")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("team_channel", &self.team_channel)
            .field("network_security_enabled", &self.network_security_enabled)
            .finish()
    }
}

/// Counters for operators watching configuration cycles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationMetrics {
    /// Station writes that failed and were retried
    pub command_retries: u64,
    /// Passes whose result did not match the requested assignment
    pub verification_failures: u64,
    /// Configuration cycles that ended verified
    pub completed_cycles: u64,
    pub cycle_in_progress: bool,
}

#[derive(Default)]
struct PendingRequest {
    latest: Option<TeamAssignment>,
    submissions: usize,
}

/// Single-slot mailbox: a new submission replaces whatever is still pending.
struct RequestMailbox {
    pending: Mutex<PendingRequest>,
    notify: Notify,
    capacity: usize,
}

impl RequestMailbox {
    fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(PendingRequest::default()),
            notify: Notify::new(),
            capacity,
        }
    }

    fn submit(&self, teams: TeamAssignment) -> Result<(), ApError> {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.submissions >= self.capacity {
                return Err(ApError::QueueFull);
            }
            pending.latest = Some(teams);
            pending.submissions += 1;
        }
        self.notify.notify_one();
        Ok(())
    }

    fn take(&self) -> Option<TeamAssignment> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let latest = pending.latest.take();
        if pending.submissions > 1 {
            debug!(
                "discarding {} superseded WiFi config requests",
                pending.submissions - 1
            );
        }
        pending.submissions = 0;
        latest
    }

    /// Waits until a request arrives or `period` elapses.
    async fn wait(&self, period: Duration) -> Option<TeamAssignment> {
        let deadline = Instant::now() + period;
        loop {
            if let Some(teams) = self.take() {
                return Some(teams);
            }
            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                return self.take();
            }
        }
    }
}

/// Controller for the field access point
pub struct AccessPoint<R> {
    runner: R,
    settings: RwLock<Option<AccessPointSettings>>,
    requests: OnceLock<RequestMailbox>,
    statuses: RwLock<Arc<StationStatuses>>,
    initial_statuses_fetched: AtomicBool,
    command_retries: AtomicU64,
    verification_failures: AtomicU64,
    completed_cycles: AtomicU64,
    cycle_in_progress: AtomicBool,
}

impl<R: CommandRunner + Sync> AccessPoint<R> {
    pub const POLL_PERIOD: Duration = Duration::from_secs(3);
    pub const REQUEST_BUFFER_SIZE: usize = 10;
    pub const CONFIG_RETRY_INTERVAL: Duration = Duration::from_secs(30);

    pub fn new(runner: R) -> Self {
        Self {
            runner,
            settings: RwLock::new(None),
            requests: OnceLock::new(),
            statuses: RwLock::new(Arc::new(StationStatuses::default())),
            initial_statuses_fetched: AtomicBool::new(false),
            command_retries: AtomicU64::new(0),
            verification_failures: AtomicU64::new(0),
            completed_cycles: AtomicU64::new(0),
            cycle_in_progress: AtomicBool::new(false),
        }
    }

    /// Replaces the settings; takes effect with the next device command.
    pub fn update_settings(&self, settings: AccessPointSettings) {
        info!(
            "access point settings: {} at {} (channel {}, security {})",
            settings.kind,
            settings.address,
            settings.team_channel,
            if settings.network_security_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Some(settings);

        self.requests
            .get_or_init(|| RequestMailbox::new(Self::REQUEST_BUFFER_SIZE));
    }

    pub fn settings(&self) -> Option<AccessPointSettings> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Settings if the controller is allowed to touch the device
    fn active_settings(&self) -> Option<AccessPointSettings> {
        self.settings().filter(|s| s.network_security_enabled)
    }

    /// Queues a request to set up the team networks; never blocks.
    ///
    /// Only the most recent request pending at the time the control loop picks
    /// up work is applied.
    pub fn submit_assignment(&self, teams: TeamAssignment) -> Result<(), ApError> {
        self.requests
            .get()
            .ok_or(ApError::QueueFull)?
            .submit(teams)
    }

    /// Pushes the non-team radio settings to the device right away.
    pub async fn apply_admin_settings(&self) -> Result<(), ApError> {
        let Some(settings) = self.active_settings() else {
            return Ok(());
        };

        self.run_command(&settings, &admin_settings_command(settings.team_channel))
            .await
            .map(|_| ())
    }

    /// Latest observed station status, safe to call at any time
    pub fn status_snapshot(&self) -> StationStatuses {
        **self.statuses.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn metrics(&self) -> ConfigurationMetrics {
        ConfigurationMetrics {
            command_retries: self.command_retries.load(Ordering::Relaxed),
            verification_failures: self.verification_failures.load(Ordering::Relaxed),
            completed_cycles: self.completed_cycles.load(Ordering::Relaxed),
            cycle_in_progress: self.cycle_in_progress.load(Ordering::Relaxed),
        }
    }

    /// Runs the control loop forever.
    pub async fn run(&self) {
        loop {
            self.run_once().await;
        }
    }

    /// Handles the pending request, or polls once the poll period passes
    /// without one.
    pub async fn run_once(&self) {
        let request = match self.requests.get() {
            Some(requests) => requests.wait(Self::POLL_PERIOD).await,
            None => {
                sleep(Self::POLL_PERIOD).await;
                None
            }
        };

        match request {
            Some(teams) => self.handle_team_wifi_configuration(&teams).await,
            None => self.poll().await,
        }
    }

    async fn poll(&self) {
        if let Err(e) = self.update_team_wifi_statuses().await {
            warn!("failed to update WiFi status: {e}");
        }
        if let Err(e) = self.update_team_wifi_bandwidth().await {
            warn!("failed to update WiFi bandwidth: {e}");
        }
    }

    async fn handle_team_wifi_configuration(&self, teams: &TeamAssignment) {
        let Some(settings) = self.active_settings() else {
            return;
        };

        if self.update_team_wifi_statuses().await.is_ok() && self.config_is_correct_for_teams(teams)
        {
            info!("WiFi configuration is already correct; skipping configuration cycle");
            return;
        }

        info!("starting WiFi configuration cycle");
        self.cycle_in_progress.store(true, Ordering::Relaxed);
        let completed = (!settings.kind.blank_before_configure()
            || self.configure_teams(&TeamAssignment::default()).await)
            && self.configure_teams(teams).await;
        self.cycle_in_progress.store(false, Ordering::Relaxed);

        if completed {
            self.completed_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Writes all six stations and verifies the result, repeating until the
    /// device reports the requested teams. Stations whose configuration cannot
    /// be generated are left out of the verification. Returns false if network
    /// security was disabled in the meantime.
    async fn configure_teams(&self, teams: &TeamAssignment) -> bool {
        let mut attempts = 1;

        loop {
            let mut skipped = [false; STATION_COUNT];
            let mut position = 1;
            while position <= STATION_COUNT {
                let Some(settings) = self.active_settings() else {
                    warn!("network security disabled mid-cycle; abandoning WiFi configuration");
                    return false;
                };

                let config = match generate_station_config(
                    settings.kind,
                    teams[position - 1].as_ref(),
                    position,
                ) {
                    Ok(config) => config,
                    Err(e) => {
                        error!("failed to generate WiFi configuration for station {position}: {e}");
                        skipped[position - 1] = true;
                        position += 1;
                        continue;
                    }
                };

                debug!("writing station {position} configuration");
                if let Err(e) = self.run_command(&settings, &batch_command(&config)).await {
                    warn!("failed to write station {position} configuration to AP: {e}");
                    attempts += 1;
                    self.command_retries.fetch_add(1, Ordering::Relaxed);
                    sleep(Self::CONFIG_RETRY_INTERVAL).await;
                    continue;
                }

                position += 1;
            }

            if let Some(settings) = self.active_settings() {
                for command in [COMMIT_COMMAND, RELOAD_COMMAND] {
                    if let Err(e) = self.run_command(&settings, command).await {
                        warn!("'{command}' failed: {e}");
                    }
                }
            }

            match self.update_team_wifi_statuses().await {
                Ok(()) if self.config_matches(teams, &skipped) => {
                    info!("successfully configured WiFi after {attempts} attempts");
                    return true;
                }
                Ok(()) => {}
                Err(e) => warn!("failed to verify WiFi configuration: {e}"),
            }

            self.verification_failures.fetch_add(1, Ordering::Relaxed);
            warn!("WiFi configuration still incorrect after {attempts} attempts; trying again");
            attempts += 1;
            sleep(Self::POLL_PERIOD).await;
        }
    }

    /// True if the networks last read from the device carry exactly the given
    /// teams. Always false until status has been fetched once.
    pub(crate) fn config_is_correct_for_teams(&self, teams: &TeamAssignment) -> bool {
        self.config_matches(teams, &[false; STATION_COUNT])
    }

    fn config_matches(&self, teams: &TeamAssignment, skipped: &[bool; STATION_COUNT]) -> bool {
        if !self.initial_statuses_fetched.load(Ordering::Acquire) {
            return false;
        }

        let statuses = self.status_snapshot();
        teams
            .iter()
            .zip(statuses.iter())
            .zip(skipped)
            .filter(|(_, skipped)| !**skipped)
            .all(|((team, status), _)| {
                let expected_team_id = team.as_ref().map_or(0, |team| team.id);
                status.team_id == expected_team_id
            })
    }

    /// Reads network names and link state from the device.
    pub(crate) async fn update_team_wifi_statuses(&self) -> Result<(), ApError> {
        let Some(settings) = self.active_settings() else {
            return Ok(());
        };

        let output = self.run_command(&settings, "iwinfo").await?;
        debug!("access point status: {output}");
        let mut decoded = decode_wifi_info(&output, Some(settings.kind.station_interfaces()))?;

        let current = self.status_snapshot();
        for (status, previous) in decoded.iter_mut().zip(current.iter()) {
            status.megabits_per_second = previous.megabits_per_second;
        }
        self.publish_statuses(decoded);
        self.initial_statuses_fetched.store(true, Ordering::Release);

        Ok(())
    }

    /// Samples throughput of every station network.
    pub(crate) async fn update_team_wifi_bandwidth(&self) -> Result<(), ApError> {
        let Some(settings) = self.active_settings() else {
            return Ok(());
        };

        let mut megabits = [0.0; STATION_COUNT];
        for (mbits, interface) in megabits.iter_mut().zip(settings.kind.station_interfaces()) {
            let output = self
                .run_command(&settings, &bandwidth_command(interface))
                .await?;
            *mbits = parse_btu(&output);
        }

        let mut statuses = self.status_snapshot();
        for (status, mbits) in statuses.iter_mut().zip(megabits) {
            status.megabits_per_second = mbits;
        }
        self.publish_statuses(statuses);

        Ok(())
    }

    fn publish_statuses(&self, statuses: StationStatuses) {
        *self.statuses.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(statuses);
    }

    async fn run_command(
        &self,
        settings: &AccessPointSettings,
        command: &str,
    ) -> Result<String, ApError> {
        // batch bodies carry passphrases
        let summary = command.lines().next().unwrap_or_default();
        debug!("running access point command: {summary}");
        self.runner.run_command(&settings.target(), command).await
    }
}
