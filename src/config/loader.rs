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

//! Configuration loading and validation.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokio::fs;
use zeroize::Zeroizing;

use super::types::{
    default_error_markers, ApplianceConfig, ExportConfig, HostKeyPolicy, LoggingConfig, RawConfig,
    RelayConfig, UploadConfig, UploadTarget, DEFAULT_ARTIFACT_PATTERN, DEFAULT_COPY_COMMAND,
    DEFAULT_DATE_FORMAT, DEFAULT_UPLOAD_PREFIX,
};
use super::utils::{expand_env_vars, expand_tilde, is_valid_environment_name};
use crate::artifact::is_valid_date_format;
use crate::error::ConfigError;

/// Environment tag used when none is selected on the command line.
pub const DEFAULT_ENVIRONMENT: &str = "default";

impl ExportConfig {
    /// Load and validate the configuration file at `path`.
    ///
    /// `environment` is used as the run's environment tag unless the file sets
    /// its own `environment`.
    pub async fn load(path: &Path, environment: &str) -> Result<Self, ConfigError> {
        let expanded_path = expand_tilde(path);

        if !expanded_path.exists() {
            return Err(ConfigError::NotFound {
                path: expanded_path,
            });
        }

        let content =
            fs::read_to_string(&expanded_path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: expanded_path.clone(),
                    source,
                })?;

        tracing::debug!("Loaded configuration from {:?}", expanded_path);
        Self::parse(&content, &expanded_path, environment)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(content: &str, environment: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new("<inline>"), environment)
    }

    fn parse(content: &str, path: &Path, environment: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        raw.validate(environment)
    }

    /// Path of the configuration file for `environment` inside `config_dir`.
    ///
    /// `config.<environment>.yaml` when an environment is given, `config.yaml`
    /// otherwise.
    pub fn resolve_path(config_dir: &Path, environment: Option<&str>) -> Result<PathBuf, ConfigError> {
        match environment {
            Some(name) if !is_valid_environment_name(name) => Err(ConfigError::invalid(
                "environment",
                format!("'{name}' may only contain letters, digits, '-' and '_'"),
            )),
            Some(name) => Ok(config_dir.join(format!("config.{name}.yaml"))),
            None => Ok(config_dir.join("config.yaml")),
        }
    }

    /// Platform configuration directory (`~/.config/ise-export` on Linux).
    pub fn default_config_dir() -> PathBuf {
        ProjectDirs::from("", "", "ise-export")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Collects missing required settings while validating.
#[derive(Default)]
struct Missing(Vec<String>);

impl Missing {
    /// Expand `value`; record `field` as missing when absent, blank, or
    /// dependent on an unset environment variable.
    fn require(&mut self, field: &str, value: Option<String>) -> String {
        match setting(value) {
            Ok(Some(value)) => value,
            Ok(None) => {
                self.0.push(field.to_string());
                String::new()
            }
            Err(unset) => {
                self.0.push(format!("{field} (unset ${unset})"));
                String::new()
            }
        }
    }

    /// Like [`Missing::require`] but absence is fine.
    fn optional(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match setting(value) {
            Ok(value) => value,
            Err(unset) => {
                self.0.push(format!("{field} (unset ${unset})"));
                None
            }
        }
    }
}

fn setting(value: Option<String>) -> Result<Option<String>, String> {
    let Some(value) = value else {
        return Ok(None);
    };
    let (expanded, unresolved) = expand_env_vars(&value);
    if let Some(name) = unresolved.into_iter().next() {
        return Err(name);
    }
    let trimmed = expanded.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn path_setting(value: String) -> PathBuf {
    expand_tilde(Path::new(&value))
}

impl RawConfig {
    pub(crate) fn validate(self, environment: &str) -> Result<ExportConfig, ConfigError> {
        let mut missing = Missing::default();

        let environment = missing
            .optional("environment", self.environment)
            .unwrap_or_else(|| environment.to_string());
        if !is_valid_environment_name(&environment) {
            return Err(ConfigError::invalid(
                "environment",
                format!("'{environment}' may only contain letters, digits, '-' and '_'"),
            ));
        }

        let appliance = self.appliance;
        let host = missing.require("appliance.host", appliance.host);
        let username = missing.require("appliance.username", appliance.username);
        let key_path = missing.require("appliance.key_path", appliance.key_path);
        let key_passphrase = missing.optional("appliance.key_passphrase", appliance.key_passphrase);
        let host_key_check = missing.optional("appliance.host_key_check", appliance.host_key_check);

        let relay = self.relay;
        let repository = missing.require("relay.repository", relay.repository);
        let local_path = missing.optional("relay.local_path", relay.local_path);

        let upload = match self.upload {
            Some(raw) if raw.enabled.unwrap_or(true) => {
                let prefix = missing
                    .optional("upload.prefix", raw.prefix)
                    .unwrap_or_else(|| DEFAULT_UPLOAD_PREFIX.to_string());
                let target = match missing.optional("upload.presigned_url", raw.presigned_url) {
                    Some(url) => UploadTarget::PresignedUrl { url },
                    None => UploadTarget::S3 {
                        bucket: missing.require("upload.bucket", raw.bucket),
                        region: missing.require("upload.region", raw.region),
                        profile: missing.optional("upload.profile", raw.profile),
                    },
                };
                if local_path.is_none() {
                    // The artifact is read from the repository's local mount.
                    missing.0.push("relay.local_path (required for upload)".to_string());
                }
                Some(UploadConfig { target, prefix })
            }
            _ => None,
        };

        let logging = LoggingConfig {
            audit_file: missing
                .optional("logging.audit_file", self.logging.audit_file)
                .map(path_setting),
            transcript_dir: missing
                .optional("logging.transcript_dir", self.logging.transcript_dir)
                .map(path_setting),
        };

        if !missing.0.is_empty() {
            return Err(ConfigError::Missing { fields: missing.0 });
        }

        let timing = self.timing;
        if timing.exit_attempts == 0 {
            return Err(ConfigError::invalid("timing.exit_attempts", "must be at least 1"));
        }
        if timing.report_poll_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "timing.report_poll_interval_secs",
                "must be greater than 0",
            ));
        }
        if timing.report_max_wait_secs < timing.report_poll_interval_secs {
            return Err(ConfigError::invalid(
                "timing.report_max_wait_secs",
                "must not be shorter than the poll interval",
            ));
        }

        let menu = self.menu;
        for (field, pattern) in [
            ("menu.root_prompt", &menu.root_prompt),
            ("menu.banner", &menu.banner),
            ("menu.report_started", &menu.report_started),
            ("menu.report_completed", &menu.report_completed),
        ] {
            if pattern.is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }

        let artifact_pattern = relay
            .artifact_pattern
            .unwrap_or_else(|| DEFAULT_ARTIFACT_PATTERN.to_string());
        if artifact_pattern.contains('/') {
            return Err(ConfigError::invalid(
                "relay.artifact_pattern",
                "must be a file name, not a path",
            ));
        }

        let date_format = relay
            .date_format
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        if !is_valid_date_format(&date_format) {
            return Err(ConfigError::invalid(
                "relay.date_format",
                format!("'{date_format}' is not a valid strftime format"),
            ));
        }

        Ok(ExportConfig {
            environment,
            appliance: ApplianceConfig {
                host,
                port: appliance.port.unwrap_or(22),
                username,
                key_path: path_setting(key_path),
                key_passphrase: key_passphrase.map(Zeroizing::new),
                host_key_policy: host_key_check
                    .map(|value| match HostKeyPolicy::parse(&value) {
                        HostKeyPolicy::KnownHostsFile(path) => {
                            HostKeyPolicy::KnownHostsFile(expand_tilde(&path))
                        }
                        policy => policy,
                    })
                    .unwrap_or_default(),
                line_ending: appliance.line_ending.unwrap_or_else(|| "\n".to_string()),
            },
            menu,
            timing,
            relay: RelayConfig {
                repository,
                copy_command: relay
                    .copy_command
                    .unwrap_or_else(|| DEFAULT_COPY_COMMAND.to_string()),
                artifact_pattern,
                date_format,
                local_path: local_path.map(path_setting),
                error_markers: relay.error_markers.unwrap_or_else(default_error_markers),
            },
            upload,
            logging,
        })
    }
}
