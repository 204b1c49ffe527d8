//! [`ShellChannel`] over an `ssh2` session.

use super::{ShellChannel, ShellOutput};
use crate::utils::{Result, SnapshotError};
use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Remote stderr is dropped as it arrives. Left unread, it would hold the
/// channel window and stall a chatty command such as `rm -r`.
const STDERR_MODE: ssh2::ExtendedData = ssh2::ExtendedData::Ignore;

/// An authenticated SSH session. Each [`ShellChannel::run`] opens a fresh
/// channel on it, so every call is exactly one round trip.
pub struct SshChannel {
    session: ssh2::Session,
    user_at_host: String,
}

impl SshChannel {
    /// Connect to `user@host` and authenticate with `identity_file` when
    /// given, otherwise through the running SSH agent.
    pub fn connect(user_at_host: &str, port: u16, identity_file: Option<&Path>) -> Result<Self> {
        let (user, host) = split_user_at_host(user_at_host)?;

        info!(host = %host, user = %user, port, "Opening SSH session");

        let tcp = TcpStream::connect((host.as_str(), port))
            .map_err(|e| SnapshotError::Connection(format!("{}:{}: {}", host, port, e)))?;
        let mut session = ssh2::Session::new().map_err(ssh_error)?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(ssh_error)?;

        match identity_file {
            Some(key) => session
                .userauth_pubkey_file(&user, None, key, None)
                .map_err(|e| {
                    SnapshotError::Connection(format!(
                        "SSH key authentication with {} failed: {}",
                        key.display(),
                        e
                    ))
                })?,
            None => session.userauth_agent(&user).map_err(|e| {
                SnapshotError::Connection(format!("SSH agent authentication failed: {}", e))
            })?,
        }

        if !session.authenticated() {
            return Err(SnapshotError::Connection(format!(
                "SSH authentication as {} failed",
                user
            )));
        }

        Ok(Self {
            session,
            user_at_host: format!("{}@{}", user, host),
        })
    }
}

impl ShellChannel for SshChannel {
    fn run(&self, command: &str) -> std::io::Result<ShellOutput> {
        debug!(host = %self.user_at_host, command, "ssh exec");
        let mut channel = self.session.channel_session()?;
        channel.handle_extended_data(STDERR_MODE)?;
        channel.exec(command)?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        channel.wait_close()?;
        let exit_status = channel.exit_status()?;

        Ok(ShellOutput {
            exit_status,
            stdout,
        })
    }

    fn user_at_host(&self) -> &str {
        &self.user_at_host
    }
}

fn ssh_error(e: ssh2::Error) -> SnapshotError {
    SnapshotError::Connection(format!("SSH session error: {}", e))
}

/// Split `user@host`; a bare `host` uses the local `$USER`.
fn split_user_at_host(user_at_host: &str) -> Result<(String, String)> {
    let (user, host) = match user_at_host.split_once('@') {
        Some((user, host)) => (user.to_string(), host.to_string()),
        None => (
            std::env::var("USER").map_err(|_| {
                SnapshotError::Connection(format!(
                    "no user in '{}' and $USER is not set",
                    user_at_host
                ))
            })?,
            user_at_host.to_string(),
        ),
    };

    if user.is_empty() || host.is_empty() {
        return Err(SnapshotError::Connection(format!(
            "expected user@host, got '{}'",
            user_at_host
        )));
    }

    Ok((user, host))
}
