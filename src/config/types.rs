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

//! Configuration type definitions.
//!
//! `Raw*` types mirror the YAML file and keep every required field optional so
//! that validation can report all missing settings at once. The validated
//! [`ExportConfig`] is what the rest of the crate consumes.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::session::Pattern;

/// Validated settings for one export run. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Per-environment tag (prod, staging, dev, ...).
    pub environment: String,
    pub appliance: ApplianceConfig,
    pub menu: MenuConfig,
    pub timing: TimingConfig,
    pub relay: RelayConfig,
    /// `None` when cloud upload is disabled.
    pub upload: Option<UploadConfig>,
    pub logging: LoggingConfig,
}

/// SSH access to the appliance.
#[derive(Debug, Clone)]
pub struct ApplianceConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key_path: PathBuf,
    pub key_passphrase: Option<Zeroizing<String>>,
    pub host_key_policy: HostKeyPolicy,
    /// Appended to every line sent to the shell.
    pub line_ending: String,
}

/// How the appliance's host key is verified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept whatever key the appliance presents.
    #[default]
    AcceptAny,
    /// Check against `~/.ssh/known_hosts`.
    KnownHosts,
    /// Check against a specific known_hosts file.
    KnownHostsFile(PathBuf),
}

impl HostKeyPolicy {
    pub(crate) fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "no" | "accept_any" | "accept-any" => HostKeyPolicy::AcceptAny,
            "yes" | "known_hosts" | "known-hosts" => HostKeyPolicy::KnownHosts,
            path => HostKeyPolicy::KnownHostsFile(PathBuf::from(path)),
        }
    }
}

/// Appliance menu strings. All of them are version specific, so every one is
/// overridable.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MenuConfig {
    pub root_prompt: Pattern,
    /// Sent once at the root prompt before entering the menu.
    pub setup_commands: Vec<String>,
    pub entry_command: String,
    pub banner: Pattern,
    pub report_option: String,
    pub report_started: Pattern,
    pub report_completed: Pattern,
    pub exit_option: String,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            root_prompt: Pattern::literal("/admin#"),
            setup_commands: Vec::new(),
            entry_command: "application configure ise".to_string(),
            banner: Pattern::literal("Selection configuration option"),
            report_option: "16".to_string(),
            report_started: Pattern::literal("Starting to generate All Endpoints report"),
            report_completed: Pattern::literal("Completed generating All Endpoints report"),
            exit_option: "0".to_string(),
        }
    }
}

/// Timeouts and retry bounds, in seconds in the file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub connect_timeout_secs: u64,
    pub prompt_timeout_secs: u64,
    pub banner_timeout_secs: u64,
    pub report_poll_interval_secs: u64,
    pub report_max_wait_secs: u64,
    /// Total number of times the exit option may be sent.
    pub exit_attempts: u32,
    pub copy_timeout_secs: u64,
    pub keepalive_interval_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            prompt_timeout_secs: 30,
            banner_timeout_secs: 10,
            report_poll_interval_secs: 10,
            report_max_wait_secs: 1800,
            exit_attempts: 3,
            copy_timeout_secs: 300,
            keepalive_interval_secs: 30,
        }
    }
}

impl TimingConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    pub fn banner_timeout(&self) -> Duration {
        Duration::from_secs(self.banner_timeout_secs)
    }

    pub fn report_poll_interval(&self) -> Duration {
        Duration::from_secs(self.report_poll_interval_secs)
    }

    pub fn report_max_wait(&self) -> Duration {
        Duration::from_secs(self.report_max_wait_secs)
    }

    pub fn copy_timeout(&self) -> Duration {
        Duration::from_secs(self.copy_timeout_secs)
    }

    /// `None` disables keepalive.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_secs > 0).then(|| Duration::from_secs(self.keepalive_interval_secs))
    }
}

/// Where the appliance copies the artifact, and how it is named.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub repository: String,
    /// Template with `{artifact}` and `{repository}` placeholders.
    pub copy_command: String,
    /// Template with a `{date}` placeholder.
    pub artifact_pattern: String,
    /// chrono format string for `{date}`.
    pub date_format: String,
    /// Local mount point of the repository, used to find the artifact for upload.
    pub local_path: Option<PathBuf>,
    /// Any of these in the copy output marks the copy as failed.
    pub error_markers: Vec<String>,
}

pub(crate) const DEFAULT_COPY_COMMAND: &str = "copy disk:/{artifact} repository {repository}";
pub(crate) const DEFAULT_ARTIFACT_PATTERN: &str = "FullReport_{date}.csv";
pub(crate) const DEFAULT_DATE_FORMAT: &str = "%d-%b-%Y";
pub(crate) const DEFAULT_UPLOAD_PREFIX: &str = "ise-reports/";

pub(crate) fn default_error_markers() -> Vec<String> {
    ["% Error", "% Invalid", "not reachable", "No such file", "failed"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

/// Cloud upload settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub target: UploadTarget,
    /// Prepended to the artifact name to build the object key.
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// Upload through the AWS SDK default credential chain.
    S3 {
        bucket: String,
        region: String,
        /// Named profile from the shared AWS config, if not the default.
        profile: Option<String>,
    },
    /// HTTP PUT to a pre-signed object URL.
    PresignedUrl { url: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// JSON Lines audit trail, appended to on every run.
    pub audit_file: Option<PathBuf>,
    /// Directory receiving one session transcript per run.
    pub transcript_dir: Option<PathBuf>,
}

// Raw file layout.

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub appliance: RawAppliance,
    #[serde(default)]
    pub menu: MenuConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub relay: RawRelay,
    #[serde(default)]
    pub upload: Option<RawUpload>,
    #[serde(default)]
    pub logging: RawLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawAppliance {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub key_path: Option<String>,
    pub key_passphrase: Option<String>,
    pub host_key_check: Option<String>,
    pub line_ending: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawRelay {
    pub repository: Option<String>,
    pub copy_command: Option<String>,
    pub artifact_pattern: Option<String>,
    pub date_format: Option<String>,
    pub local_path: Option<String>,
    pub error_markers: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawUpload {
    pub enabled: Option<bool>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub prefix: Option<String>,
    pub profile: Option<String>,
    pub presigned_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawLogging {
    pub audit_file: Option<String>,
    pub transcript_dir: Option<String>,
}
