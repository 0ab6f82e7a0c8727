//! SSH transport: an interactive shell on a PTY, read until the prompt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex_lite::Regex;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::types::{CliDialect, DeviceConnector, DeviceSession, DeviceTarget, SessionError};
use crate::config::DeviceConfig;
use crate::metrics::{DEVICE_SESSIONS_CLOSED, DEVICE_SESSIONS_OPENED};

/// Terminal width requested for the PTY; wide enough that IOS does not wrap
/// `show vlan brief` port lists.
const PTY_COLUMNS: u32 = 511;
const PTY_ROWS: u32 = 24;

/// Host key policy for the SSH client.
struct HostKeyPolicy {
    host: String,
    port: u16,
    strict: bool,
}

#[async_trait]
impl client::Handler for HostKeyPolicy {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        if !self.strict {
            return Ok(true);
        }
        match russh_keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(known) => Ok(known),
            Err(e) => {
                warn!(host = %self.host, "Host key check failed: {}", e);
                Ok(false)
            }
        }
    }
}

/// Opens password-authenticated SSH sessions.
pub struct SshConnector {
    username: String,
    password: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    strict_host_keys: bool,
}

impl SshConnector {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            strict_host_keys: config.strict_host_keys,
        }
    }

    async fn connect(&self, target: &DeviceTarget) -> Result<Handle<HostKeyPolicy>, SessionError> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(self.command_timeout * 4),
            ..Default::default()
        });
        let policy = HostKeyPolicy {
            host: target.address.clone(),
            port: target.port,
            strict: self.strict_host_keys,
        };

        let connect = client::connect(config, (target.address.as_str(), target.port), policy);
        let mut handle = match timeout(self.connect_timeout, connect).await {
            Err(_) => {
                return Err(SessionError::Timeout(format!(
                    "no SSH handshake with {} within {:?}",
                    target, self.connect_timeout
                )))
            }
            Ok(Err(e)) => return Err(classify_connect_error(&e, target)),
            Ok(Ok(handle)) => handle,
        };

        let auth = handle.authenticate_password(self.username.clone(), self.password.clone());
        match timeout(self.connect_timeout, auth).await {
            Err(_) => Err(SessionError::Timeout(format!(
                "authentication with {} exceeded {:?}",
                target, self.connect_timeout
            ))),
            Ok(Err(e)) => Err(classify_connect_error(&e, target)),
            Ok(Ok(false)) => Err(SessionError::AuthFailure(format!(
                "{} rejected credentials for user {}",
                target, self.username
            ))),
            Ok(Ok(true)) => Ok(handle),
        }
    }
}

#[async_trait]
impl DeviceConnector for SshConnector {
    fn name(&self) -> &str {
        "ssh"
    }

    async fn open(
        &self,
        target: &DeviceTarget,
        dialect: &CliDialect,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        let prompt = Regex::new(dialect.prompt_pattern)
            .map_err(|e| SessionError::Unreachable(format!("bad prompt pattern: {}", e)))?;

        let handle = self.connect(target).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Unreachable(format!("{}: {}", target, e)))?;
        channel
            .request_pty(false, "vt100", PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
            .await
            .map_err(|e| SessionError::Unreachable(format!("{}: {}", target, e)))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| SessionError::Unreachable(format!("{}: {}", target, e)))?;

        DEVICE_SESSIONS_OPENED.inc();
        let mut session = SshSession {
            target: target.clone(),
            handle,
            channel,
            dialect: *dialect,
            prompt,
            command_timeout: self.command_timeout,
            buffer: String::new(),
            closed: false,
        };

        // Login banner up to the first prompt, then make output unpaginated.
        let ready = async {
            session.read_until_prompt().await?;
            if let Some(paging) = dialect.disable_paging {
                session.run(paging).await?;
            }
            Ok::<(), SessionError>(())
        }
        .await;
        if let Err(e) = ready {
            let _ = session.close().await;
            return Err(SessionError::Timeout(format!(
                "{} did not present a prompt: {}",
                target, e
            )));
        }

        info!(device = %target, "SSH session established");
        Ok(Box::new(session))
    }
}

fn classify_connect_error(err: &russh::Error, target: &DeviceTarget) -> SessionError {
    match err {
        russh::Error::UnknownKey => {
            SessionError::AuthFailure(format!("host key of {} is not trusted", target))
        }
        russh::Error::IO(io) if io.kind() == std::io::ErrorKind::TimedOut => {
            SessionError::Timeout(format!("{}: {}", target, io))
        }
        other => SessionError::Unreachable(format!("{}: {}", target, other)),
    }
}

/// One interactive shell on one device.
pub struct SshSession {
    target: DeviceTarget,
    handle: Handle<HostKeyPolicy>,
    channel: Channel<Msg>,
    dialect: CliDialect,
    prompt: Regex,
    command_timeout: Duration,
    buffer: String,
    closed: bool,
}

impl SshSession {
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let payload = format!("{}\n", line);
        self.channel
            .data(payload.as_bytes())
            .await
            .map_err(|e| SessionError::Transport(format!("{}: {}", self.target, e)))
    }

    /// Everything buffered up to and including the prompt, if the prompt has
    /// arrived.
    fn take_through_prompt(&mut self) -> Option<String> {
        let last_line = self.buffer.rsplit('\n').next().unwrap_or_default();
        if self.prompt.is_match(last_line.trim_end()) {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    async fn read_until_prompt(&mut self) -> Result<String, SessionError> {
        let limit = self.command_timeout;
        let target = self.target.clone();

        let read = async {
            loop {
                if let Some(output) = self.take_through_prompt() {
                    return Ok(output);
                }
                match self.channel.wait().await {
                    Some(ChannelMsg::Data { ref data }) => {
                        self.buffer
                            .push_str(&String::from_utf8_lossy(data).replace('\r', ""));
                    }
                    Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                        self.buffer
                            .push_str(&String::from_utf8_lossy(data).replace('\r', ""));
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        return Err(SessionError::Transport(format!(
                            "{} closed the channel",
                            target
                        )));
                    }
                    Some(_) => {}
                }
            }
        };

        timeout(limit, read).await.map_err(|_| {
            SessionError::Transport(format!("no prompt from {} within {:?}", target, limit))
        })?
    }

    /// Run a command and fail if the device flags it as an error.
    async fn run_checked(&mut self, command: &str) -> Result<String, SessionError> {
        let output = self.run(command).await?;
        if let Some(marker) = self.dialect.find_error(&output) {
            debug!(device = %self.target, command, marker, "Device rejected command");
            return Err(SessionError::CommandRejected {
                command: command.to_string(),
                output,
            });
        }
        Ok(output)
    }
}

/// Drop the echoed command line and the trailing prompt line.
fn strip_echo_and_prompt(raw: &str, command: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    if lines
        .first()
        .is_some_and(|first| first.trim_end().ends_with(command.trim()))
    {
        lines.remove(0);
    }
    lines.pop();
    lines.join("\n")
}

#[async_trait]
impl DeviceSession for SshSession {
    async fn run(&mut self, command: &str) -> Result<String, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        debug!(device = %self.target, command, "Sending command");
        self.send_line(command).await?;
        let raw = self.read_until_prompt().await?;
        Ok(strip_echo_and_prompt(&raw, command))
    }

    async fn apply_config(&mut self, lines: &[String]) -> Result<String, SessionError> {
        let mut transcript = self.run_checked(self.dialect.enter_config).await?;

        for line in lines {
            match self.run_checked(line).await {
                Ok(output) => {
                    transcript.push('\n');
                    transcript.push_str(&output);
                }
                Err(e) => {
                    // Leave config mode so the session stays usable for reads.
                    let _ = self.run(self.dialect.exit_config).await;
                    return Err(e);
                }
            }
        }

        let exit = self.run(self.dialect.exit_config).await?;
        transcript.push('\n');
        transcript.push_str(&exit);
        Ok(transcript)
    }

    async fn persist(&mut self) -> Result<(), SessionError> {
        self.run_checked(self.dialect.save_config).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        DEVICE_SESSIONS_CLOSED.inc();

        let _ = self.channel.eof().await;
        let _ = self.channel.close().await;
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| SessionError::Transport(format!("{}: {}", self.target, e)))?;
        debug!(device = %self.target, "SSH session closed");
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!(device = %self.target, "SSH session dropped without close");
        }
    }
}
