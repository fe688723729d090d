//! Error types for access point control

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to, configuring or decoding the access point
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApError {
    /// TCP connect, SSH handshake or authentication failed
    #[error("failed to connect to access point at {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// Channel could not be opened or the session broke down mid-command
    #[error("access point session failed: {0}")]
    SessionFailed(String),

    /// Command did not complete within the command timeout
    #[error("access point command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Remote shell reported a non-zero exit status
    #[error("access point command exited with status {exit_status}: {stderr}")]
    CommandError { exit_status: u32, stderr: String },

    /// Station position outside 1-6
    #[error("invalid team position {0}")]
    InvalidPosition(usize),

    /// WPA passphrase outside the 8-63 character bound
    #[error("invalid WPA key of length {key_length} configured for team {team_id}")]
    InvalidCredential { team_id: u32, key_length: usize },

    /// Diagnostic dump did not contain six networks
    #[error(
        "could not parse wifi info; expected 6 team networks, got {ssids} names and {link_qualities} link qualities"
    )]
    MalformedStatus { ssids: usize, link_qualities: usize },

    /// Pending request slot has been overwritten too often since the last drain
    #[error("WiFi config request buffer full")]
    QueueFull,
}

impl ApError {
    /// Transport level failures; the apply cycle retries these.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApError::ConnectFailed { .. }
                | ApError::SessionFailed(_)
                | ApError::Timeout(_)
                | ApError::CommandError { .. }
        )
    }
}
