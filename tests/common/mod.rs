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

//! Scripted appliance shell shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use ise_export::config::{ApplianceConfig, ExportConfig, TimingConfig};
use ise_export::error::{SessionError, UploadError};
use ise_export::relay::upload::ObjectUploader;
use ise_export::session::{Connector, ShellTransport};

pub const ROOT_PROMPT: &str = "ise-ppan/admin#";

/// How the simulated appliance answers.
#[derive(Debug, Clone)]
pub struct ApplianceScript {
    pub banner: String,
    pub report_started: String,
    pub report_completed: String,
    /// Delay between the report request and its completion; `None` never completes.
    pub completion_after: Option<Duration>,
    /// Exit option sends needed before the root prompt comes back.
    pub exit_sends_required: u32,
    /// Printed instead of a successful copy.
    pub copy_error: Option<String>,
    /// Receives the copied artifact, standing in for the repository mount.
    pub repository_dir: Option<PathBuf>,
    /// The channel closes right after this line is received.
    pub disconnect_on: Option<String>,
    /// Echo every received line back, as a PTY does.
    pub echo: bool,
    /// The root prompt after leaving the menu arrives this late.
    pub exit_prompt_delay: Option<Duration>,
    /// How long the repository copy runs before the prompt returns.
    pub copy_duration: Option<Duration>,
}

impl Default for ApplianceScript {
    fn default() -> Self {
        Self {
            banner: "Selection configuration option".to_string(),
            report_started: "Generation Started".to_string(),
            report_completed: "Completed generating All Endpoints report".to_string(),
            completion_after: Some(Duration::from_secs(85)),
            exit_sends_required: 1,
            copy_error: None,
            repository_dir: None,
            disconnect_on: None,
            echo: false,
            exit_prompt_delay: None,
            copy_duration: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ApplianceLog {
    pub sent: Vec<String>,
    pub closes: u32,
}

pub struct SimulatedShell {
    script: ApplianceScript,
    log: Arc<Mutex<ApplianceLog>>,
    pending: String,
    scheduled: Option<(Instant, String)>,
    exit_sends: u32,
    menu_open: bool,
    remote_closed: bool,
}

impl SimulatedShell {
    pub fn new(script: ApplianceScript, log: Arc<Mutex<ApplianceLog>>) -> Self {
        Self {
            script,
            log,
            pending: format!("Cisco ISE\r\n{ROOT_PROMPT} "),
            scheduled: None,
            exit_sends: 0,
            menu_open: false,
            remote_closed: false,
        }
    }

    /// Queue a reply. Input is processed in order, so a reply to a line sent
    /// while earlier output is still scheduled lands after that output.
    fn reply(&mut self, text: &str) {
        match &mut self.scheduled {
            Some((_, output)) => output.push_str(text),
            None => self.pending.push_str(text),
        }
    }

    fn schedule(&mut self, after: Option<Duration>, text: String) {
        match after {
            Some(after) if self.scheduled.is_none() => {
                self.scheduled = Some((Instant::now() + after, text));
            }
            _ => self.reply(&text),
        }
    }

    fn respond(&mut self, line: &str) {
        self.log.lock().unwrap().sent.push(line.to_string());

        if self.script.disconnect_on.as_deref() == Some(line) {
            self.remote_closed = true;
            return;
        }
        if self.script.echo {
            self.pending.push_str(&format!("{line}\r\n"));
        }

        if line == "application configure ise" {
            self.menu_open = true;
            self.reply(&format!(
                "\r\n{}:\r\n[16]Generate All Endpoints Report\r\n[0]Exit\r\n",
                self.script.banner
            ));
        } else if line == "16" {
            self.reply(&format!("{}\r\n", self.script.report_started));
            if let Some(after) = self.script.completion_after {
                self.scheduled = Some((
                    Instant::now() + after,
                    format!("{}\r\n", self.script.report_completed),
                ));
            }
        } else if line == "0" && self.menu_open {
            self.exit_sends += 1;
            if self.exit_sends >= self.script.exit_sends_required {
                self.menu_open = false;
                self.schedule(
                    self.script.exit_prompt_delay,
                    format!("\r\n{ROOT_PROMPT} "),
                );
            }
        } else if line == "0" {
            self.reply(&format!(
                "% Invalid input detected at '^' marker.\r\n{ROOT_PROMPT} "
            ));
        } else if let Some(artifact) = line
            .strip_prefix("copy disk:/")
            .and_then(|rest| rest.split_whitespace().next())
        {
            let output = match &self.script.copy_error {
                Some(message) => format!("{message}\r\n{ROOT_PROMPT} "),
                None => {
                    if let Some(dir) = &self.script.repository_dir {
                        std::fs::write(dir.join(artifact), "MACAddress,EndPointPolicy\r\n")
                            .unwrap();
                    }
                    format!("Done.\r\n{ROOT_PROMPT} ")
                }
            };
            self.schedule(self.script.copy_duration, output);
        } else {
            self.reply(&format!("\r\n{ROOT_PROMPT} "));
        }
    }
}

#[async_trait]
impl ShellTransport for SimulatedShell {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if self.remote_closed {
            return Err(SessionError::Closed);
        }
        let text = String::from_utf8_lossy(data).into_owned();
        for line in text.split_terminator('\n') {
            self.respond(line.trim_end_matches('\r'));
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        if !self.pending.is_empty() {
            return Ok(Some(std::mem::take(&mut self.pending).into_bytes()));
        }
        if self.remote_closed {
            return Ok(None);
        }
        if let Some((at, _)) = &self.scheduled {
            tokio::time::sleep_until(*at).await;
            if let Some((_, output)) = self.scheduled.take() {
                return Ok(Some(output.into_bytes()));
            }
        }
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.log.lock().unwrap().closes += 1;
        self.remote_closed = true;
        Ok(())
    }
}

/// Hands out simulated shells and counts connection attempts.
pub struct SimulatedConnector {
    pub script: ApplianceScript,
    pub log: Arc<Mutex<ApplianceLog>>,
    pub connects: Arc<AtomicU32>,
    pub refuse: bool,
}

impl SimulatedConnector {
    pub fn new(script: ApplianceScript) -> Self {
        Self {
            script,
            log: Arc::new(Mutex::new(ApplianceLog::default())),
            connects: Arc::new(AtomicU32::new(0)),
            refuse: false,
        }
    }

    pub fn handles(&self) -> (Arc<Mutex<ApplianceLog>>, Arc<AtomicU32>) {
        (self.log.clone(), self.connects.clone())
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    type Transport = SimulatedShell;

    async fn connect(
        &self,
        _appliance: &ApplianceConfig,
        _timing: &TimingConfig,
    ) -> Result<SimulatedShell, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(SessionError::Connect("connection refused".to_string()));
        }
        Ok(SimulatedShell::new(self.script.clone(), self.log.clone()))
    }
}

/// Uploader that records keys and optionally rejects every upload.
#[derive(Default)]
pub struct RecordingUploader {
    pub reject: bool,
    pub uploaded: Mutex<Vec<(PathBuf, String)>>,
}

#[async_trait]
impl ObjectUploader for RecordingUploader {
    fn target(&self) -> String {
        "s3://ise-exports".to_string()
    }

    async fn preflight(&self) -> Result<(), UploadError> {
        Ok(())
    }

    async fn upload(&self, path: &Path, key: &str) -> Result<String, UploadError> {
        if self.reject {
            return Err(UploadError::Rejected("AccessDenied".to_string()));
        }
        if !path.is_file() {
            return Err(UploadError::MissingArtifact {
                path: path.to_path_buf(),
            });
        }
        self.uploaded
            .lock()
            .unwrap()
            .push((path.to_path_buf(), key.to_string()));
        Ok(format!("https://ise-exports.s3.eu-west-1.amazonaws.com/{key}"))
    }
}

/// Staging configuration: 10s polls, ISO-dated artifacts, no upload.
pub fn staging_yaml(extra: &str) -> String {
    format!(
        r#"
environment: staging
appliance:
  host: ise-staging.example.net
  username: admin
  key_path: /keys/ise_ed25519
menu:
  root_prompt: "{ROOT_PROMPT}"
  banner: "Selection configuration option"
  report_started: "Generation Started"
timing:
  report_poll_interval_secs: 10
  report_max_wait_secs: 1800
  exit_attempts: 3
relay:
  repository: NFS
  date_format: "%Y-%m-%d"
{extra}"#
    )
}

pub fn staging_config() -> ExportConfig {
    ExportConfig::from_yaml_str(&staging_yaml(""), "staging").unwrap()
}
