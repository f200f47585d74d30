// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote session transport for the remediation stage.
//!
//! The remediation logic only needs to run commands on the target and read
//! their output, so the seam is a small [`CommandRunner`] trait. Production
//! runs use [`SshSession`], which drives libssh2 (blocking) from inside
//! `spawn_blocking`; tests substitute an in-memory runner.
//!
//! Sessions are scoped: [`CommandRunner::close`] is called on every exit
//! path, and [`SshSession`] additionally disconnects from `Drop`, so a
//! cancelled run cannot leak a connection.
//!
//! Credential handling: only the private-key *path* is carried; the key
//! material is read by libssh2 at authentication time and never enters this
//! process's logs or state.

use crate::errors::SessionError;
use async_trait::async_trait;
use std::io::Read;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Connection parameters for the remediation target.
///
/// Identity and key path come from configuration; the address is always the
/// freshly discovered one — a cached address from an earlier run would be
/// stale by the time it is used.
#[derive(Clone, Debug)]
pub struct ConnectionParams {
    /// Username to authenticate as
    pub username: String,
    /// Path to the private key file (the key itself is never loaded here)
    pub private_key_path: PathBuf,
    /// SSH port on the target
    pub port: u16,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

/// Output of a remote command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Remote exit status
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

/// A live session able to run commands on the remediation target.
#[async_trait]
pub trait CommandRunner: Send {
    /// Run a command and wait for it to finish.
    async fn run(&mut self, command: &str) -> Result<CommandOutput, SessionError>;

    /// Release the session. Idempotent; also invoked from drop paths.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// The remote configuration interface consumed by the workflow:
/// connect(address, credentials) → session.
///
/// Production runs use [`SshConnector`]; tests substitute an in-memory
/// implementation so the convergence pipeline can be driven without a guest.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Session type produced by this connector.
    type Runner: CommandRunner;

    /// Open a session to the discovered address.
    async fn connect(
        &self,
        address: IpAddr,
        params: &ConnectionParams,
    ) -> Result<Self::Runner, SessionError>;
}

/// SSH-backed [`Connector`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    type Runner = SshSession;

    async fn connect(
        &self,
        address: IpAddr,
        params: &ConnectionParams,
    ) -> Result<Self::Runner, SessionError> {
        SshSession::connect(address, params).await
    }
}

/// SSH-backed [`CommandRunner`] over libssh2.
///
/// libssh2 is a blocking library; every operation runs inside
/// `tokio::task::spawn_blocking` with the session behind a mutex.
pub struct SshSession {
    inner: Arc<Mutex<Option<ssh2::Session>>>,
    address: String,
}

impl SshSession {
    /// Connect and authenticate to `address` with the supplied parameters.
    ///
    /// # Errors
    ///
    /// [`SessionError::ConnectFailed`] for TCP/handshake failures and
    /// [`SessionError::AuthFailed`] when the target rejects the key.
    pub async fn connect(address: IpAddr, params: &ConnectionParams) -> Result<Self, SessionError> {
        let params = params.clone();
        let address_string = address.to_string();

        let session = tokio::task::spawn_blocking(move || connect_blocking(address, &params))
            .await
            .map_err(|e| SessionError::ConnectFailed {
                address: address_string.clone(),
                port: 0,
                reason: format!("connect task failed: {e}"),
            })??;

        debug!(address = %address_string, "SSH session established");

        Ok(Self {
            inner: Arc::new(Mutex::new(Some(session))),
            address: address_string,
        })
    }
}

#[async_trait]
impl CommandRunner for SshSession {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        let inner = Arc::clone(&self.inner);
        let command = command.to_string();

        tokio::task::spawn_blocking(move || {
            let guard = inner.lock().map_err(|_| SessionError::ExecFailed {
                command: command.clone(),
                reason: "session mutex poisoned".to_string(),
            })?;

            let Some(ref session) = *guard else {
                return Err(SessionError::ExecFailed {
                    command: command.clone(),
                    reason: "session already closed".to_string(),
                });
            };

            exec_blocking(session, &command)
        })
        .await
        .map_err(|e| SessionError::ExecFailed {
            command: "<spawn_blocking>".to_string(),
            reason: format!("exec task failed: {e}"),
        })?
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let inner = Arc::clone(&self.inner);
        let address = self.address.clone();

        let joined = tokio::task::spawn_blocking(move || disconnect_blocking(&inner)).await;
        if joined.is_err() {
            warn!(address = %address, "SSH disconnect task failed");
        }

        debug!(address = %self.address, "SSH session closed");
        Ok(())
    }
}

impl Drop for SshSession {
    /// Best-effort backstop so a cancelled run never leaks the session.
    fn drop(&mut self) {
        disconnect_blocking(&self.inner);
    }
}

/// Establish the TCP connection, handshake, and authenticate.
fn connect_blocking(
    address: IpAddr,
    params: &ConnectionParams,
) -> Result<ssh2::Session, SessionError> {
    let socket = SocketAddr::new(address, params.port);
    let connect_err = |reason: String| SessionError::ConnectFailed {
        address: address.to_string(),
        port: params.port,
        reason,
    };

    let tcp = TcpStream::connect_timeout(&socket, params.connect_timeout)
        .map_err(|e| connect_err(e.to_string()))?;

    let mut session = ssh2::Session::new().map_err(|e| connect_err(e.to_string()))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| connect_err(e.to_string()))?;

    session
        .userauth_pubkey_file(
            &params.username,
            None,
            &params.private_key_path,
            None,
        )
        .map_err(|e| SessionError::AuthFailed {
            address: address.to_string(),
            port: params.port,
            username: params.username.clone(),
            reason: e.to_string(),
        })?;

    if !session.authenticated() {
        return Err(SessionError::AuthFailed {
            address: address.to_string(),
            port: params.port,
            username: params.username.clone(),
            reason: "authentication did not complete".to_string(),
        });
    }

    Ok(session)
}

/// Run one command over a fresh channel and collect its output.
fn exec_blocking(session: &ssh2::Session, command: &str) -> Result<CommandOutput, SessionError> {
    let exec_err = |reason: String| SessionError::ExecFailed {
        command: command.to_string(),
        reason,
    };

    let mut channel = session
        .channel_session()
        .map_err(|e| exec_err(e.to_string()))?;
    channel.exec(command).map_err(|e| exec_err(e.to_string()))?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|e| exec_err(e.to_string()))?;

    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|e| exec_err(e.to_string()))?;

    channel.wait_close().map_err(|e| exec_err(e.to_string()))?;
    let exit_code = channel.exit_status().map_err(|e| exec_err(e.to_string()))?;

    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
    })
}

/// Take the session out of its slot and disconnect it, if still present.
fn disconnect_blocking(inner: &Arc<Mutex<Option<ssh2::Session>>>) {
    if let Ok(mut guard) = inner.lock() {
        if let Some(session) = guard.take() {
            let _ = session.disconnect(None, "remediation session closed", None);
        }
    }
}
