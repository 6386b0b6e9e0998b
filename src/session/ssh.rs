// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SSH transport to the appliance shell.
//!
//! Connects with russh, verifies the host key according to the configured
//! [`HostKeyPolicy`], authenticates with the configured private key and opens
//! a PTY shell channel.

use async_trait::async_trait;
use russh::client::{Handle, Handler, Msg};
use russh::{Channel, ChannelMsg};
use std::fmt::Display;
use std::sync::Arc;

use super::{Connector, ShellTransport};
use crate::config::{ApplianceConfig, HostKeyPolicy, TimingConfig};
use crate::error::SessionError;

const TERM_TYPE: &str = "vt100";
const TERM_WIDTH: u32 = 200;
const TERM_HEIGHT: u32 = 50;

/// Errors surfaced by the russh client handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Ssh(#[from] russh::Error),

    #[error("host key verification failed: {0}")]
    HostKey(String),
}

/// Host key verification for the appliance connection.
#[derive(Debug, Clone)]
pub struct ApplianceHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ApplianceHandler {
    pub fn new(host: String, port: u16, policy: HostKeyPolicy) -> Self {
        Self { host, port, policy }
    }
}

impl Handler for ApplianceHandler {
    type Error = HandlerError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAny => {
                tracing::debug!("Accepting host key of {} without verification", self.host);
                Ok(true)
            }
            HostKeyPolicy::KnownHosts => {
                russh::keys::check_known_hosts(&self.host, self.port, server_public_key)
                    .map_err(|e| HandlerError::HostKey(e.to_string()))
            }
            HostKeyPolicy::KnownHostsFile(path) => russh::keys::check_known_hosts_path(
                &self.host,
                self.port,
                server_public_key,
                path,
            )
            .map_err(|e| HandlerError::HostKey(e.to_string())),
        }
    }
}

/// Opens [`SshShell`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    type Transport = SshShell;

    async fn connect(
        &self,
        appliance: &ApplianceConfig,
        timing: &TimingConfig,
    ) -> Result<SshShell, SessionError> {
        SshShell::open(appliance, timing).await
    }
}

/// Interactive shell channel on an authenticated SSH connection.
pub struct SshShell {
    handle: Handle<ApplianceHandler>,
    channel: Channel<Msg>,
}

fn connect_error(e: impl Display) -> SessionError {
    SessionError::Connect(e.to_string())
}

fn transport_error(e: impl Display) -> SessionError {
    SessionError::Transport(e.to_string())
}

impl SshShell {
    pub async fn open(
        appliance: &ApplianceConfig,
        timing: &TimingConfig,
    ) -> Result<Self, SessionError> {
        let config = russh::client::Config {
            keepalive_interval: timing.keepalive_interval(),
            ..Default::default()
        };

        let handler = ApplianceHandler::new(
            appliance.host.clone(),
            appliance.port,
            appliance.host_key_policy.clone(),
        );

        tracing::debug!(
            "Connecting to {}@{}:{}",
            appliance.username,
            appliance.host,
            appliance.port
        );

        let mut handle = russh::client::connect(
            Arc::new(config),
            (appliance.host.as_str(), appliance.port),
            handler,
        )
        .await
        .map_err(connect_error)?;

        let key = russh::keys::load_secret_key(
            &appliance.key_path,
            appliance.key_passphrase.as_ref().map(|p| p.as_str()),
        )
        .map_err(|e| {
            SessionError::Connect(format!(
                "cannot load private key {:?}: {e}",
                appliance.key_path
            ))
        })?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(connect_error)?
            .flatten();
        let auth = handle
            .authenticate_publickey(
                &appliance.username,
                russh::keys::PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(connect_error)?;
        if !auth.success() {
            return Err(SessionError::Connect(format!(
                "public key authentication rejected for user '{}'",
                appliance.username
            )));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(connect_error)?;
        channel
            .request_pty(false, TERM_TYPE, TERM_WIDTH, TERM_HEIGHT, 0, 0, &[])
            .await
            .map_err(connect_error)?;
        channel.request_shell(false).await.map_err(connect_error)?;

        tracing::info!("Connected to {}:{}", appliance.host, appliance.port);
        Ok(Self { handle, channel })
    }
}

#[async_trait]
impl ShellTransport for SshShell {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.channel.data(data).await.map_err(transport_error)
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { ref data }) => return Ok(Some(data.to_vec())),
                // The appliance writes some menu messages to stderr
                Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    return Ok(Some(data.to_vec()))
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    tracing::debug!("Remote shell exited with status {}", exit_status);
                }
                Some(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Err(e) = self.channel.eof().await {
            tracing::trace!("Failed to send EOF: {}", e);
        }
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(transport_error)
    }
}
