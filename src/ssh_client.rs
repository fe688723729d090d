use crate::error::ApError;
use async_trait::async_trait;
use log::debug;
use russh::{ChannelMsg, Disconnect, client};
use russh_keys::key::PublicKey;
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use trait_variant::make;

/// Where and as whom to log in
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub address: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTarget")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runs one shell command on the access point and returns its stdout.
#[make(Send)]
pub trait CommandRunner {
    async fn run_command(&self, target: &DeviceTarget, command: &str) -> Result<String, ApError>;
}

/// [`CommandRunner`] opening a fresh SSH session for every command
#[derive(Clone, Debug)]
pub struct SshCommandRunner {
    port: u16,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SshCommandRunner {
    pub const SSH_PORT: u16 = 22;
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
    pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self {
            port: Self::SSH_PORT,
            connect_timeout: Self::CONNECT_TIMEOUT,
            command_timeout: Self::COMMAND_TIMEOUT,
        }
    }
}

impl Default for SshCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SshCommandRunner {
    async fn run_command(&self, target: &DeviceTarget, command: &str) -> Result<String, ApError> {
        let cancel = CancellationToken::new();
        let session = SshSession {
            target: target.clone(),
            port: self.port,
            connect_timeout: self.connect_timeout,
        };
        let mut task = tokio::spawn(session.exec(command.to_string(), cancel.clone()));

        match timeout(self.command_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ApError::SessionFailed(format!("command task failed: {e}"))),
            Err(_) => {
                // the task closes its connection once it sees the cancellation
                cancel.cancel();
                Err(ApError::Timeout(self.command_timeout))
            }
        }
    }
}

struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    // Field access points are re-flashed regularly; their host keys are not pinned.
    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

struct SshSession {
    target: DeviceTarget,
    port: u16,
    connect_timeout: Duration,
}

impl SshSession {
    async fn exec(self, command: String, cancel: CancellationToken) -> Result<String, ApError> {
        let handle = tokio::select! {
            _ = cancel.cancelled() => return Err(Self::cancelled()),
            handle = self.connect() => handle?,
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(Self::cancelled()),
            output = Self::run(&handle, &command) => output,
        };

        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!("failed to disconnect from {}: {e}", self.target.address);
        }

        result
    }

    async fn connect(&self) -> Result<client::Handle<AcceptAnyHostKey>, ApError> {
        let address = self.target.address.clone();
        let connect_failed = |reason: String| ApError::ConnectFailed {
            address: address.clone(),
            reason,
        };

        let config = Arc::new(client::Config::default());
        let login = async {
            let mut handle = client::connect(
                config,
                (self.target.address.as_str(), self.port),
                AcceptAnyHostKey,
            )
            .await
            .map_err(|e| connect_failed(e.to_string()))?;

            let authenticated = handle
                .authenticate_password(&self.target.username, &self.target.password)
                .await
                .map_err(|e| connect_failed(e.to_string()))?;
            if !authenticated {
                return Err(connect_failed(format!(
                    "password authentication rejected for user {}",
                    self.target.username
                )));
            }

            Ok::<_, ApError>(handle)
        };

        timeout(self.connect_timeout, login).await.map_err(|_| {
            connect_failed(format!(
                "no connection within {}s",
                self.connect_timeout.as_secs()
            ))
        })?
    }

    async fn run(
        handle: &client::Handle<AcceptAnyHostKey>,
        command: &str,
    ) -> Result<String, ApError> {
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ApError::SessionFailed(format!("failed to open session: {e}")))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| ApError::SessionFailed(format!("failed to start command: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }

        match exit_status {
            Some(0) => Ok(String::from_utf8_lossy(&stdout).into_owned()),
            Some(exit_status) => Err(ApError::CommandError {
                exit_status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            }),
            None => Err(ApError::SessionFailed(
                "session closed without exit status".to_string(),
            )),
        }
    }

    fn cancelled() -> ApError {
        ApError::SessionFailed("session cancelled after command timeout".to_string())
    }
}
