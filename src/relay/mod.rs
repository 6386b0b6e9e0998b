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

//! Moving the generated artifact off the appliance.
//!
//! The appliance itself copies the artifact to the configured repository;
//! [`upload`] then optionally pushes the relayed file to object storage.

pub mod upload;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{RelayConfig, UploadConfig};
use crate::error::{ExportError, SessionError, UploadError};
use crate::report::{Reporter, Step, StepRecord};
use crate::session::{Pattern, Session, ShellTransport};
use upload::ObjectUploader;

pub use upload::{object_key, uploader_for, PresignedUrlUploader, S3Uploader};

/// Issues the appliance-side copy and the optional cloud upload.
pub struct FileRelay<'a> {
    relay: &'a RelayConfig,
    root_prompt: &'a Pattern,
    copy_timeout: Duration,
}

impl<'a> FileRelay<'a> {
    pub fn new(relay: &'a RelayConfig, root_prompt: &'a Pattern, copy_timeout: Duration) -> Self {
        Self {
            relay,
            root_prompt,
            copy_timeout,
        }
    }

    /// Copy command for `artifact_name` to `repository_name`.
    pub fn copy_command(&self, artifact_name: &str, repository_name: &str) -> String {
        self.relay
            .copy_command
            .replace("{artifact}", artifact_name)
            .replace("{repository}", repository_name)
    }

    /// Ask the appliance to copy the artifact to the repository.
    ///
    /// Succeeds when the root prompt returns within the copy timeout and the
    /// copy output carries none of the configured error markers. Output left
    /// over from earlier commands is dropped first.
    pub async fn copy_to_repository<T: ShellTransport>(
        &self,
        session: &mut Session<T>,
        reporter: &mut Reporter,
        artifact_name: &str,
        repository_name: &str,
    ) -> Result<(), ExportError> {
        let command = self.copy_command(artifact_name, repository_name);
        let pending = StepRecord::begin(Step::CopyToRepository)
            .sent(command.as_str())
            .expected(self.root_prompt);
        let started = pending.started();

        let stale = session.discard_buffered();
        if !stale.trim().is_empty() {
            tracing::debug!("Discarding output left before copy: {:?}", stale);
        }

        let result = match session.send_line(&command).await {
            Ok(()) => session.expect(self.root_prompt, self.copy_timeout).await,
            Err(e) => Err(e),
        };

        let error = match result {
            Ok(output) => {
                // The echoed command line must not trip the markers.
                let output = output.replace(&command, "");
                match self
                    .relay
                    .error_markers
                    .iter()
                    .find(|marker| !marker.is_empty() && output.contains(marker.as_str()))
                {
                    None => {
                        reporter.record(pending.succeed(format!(
                            "{artifact_name} copied to repository {repository_name}"
                        )));
                        return Ok(());
                    }
                    Some(marker) => ExportError::Relay {
                        repository: repository_name.to_string(),
                        reason: format!("appliance reported '{marker}'"),
                        context: session.context(Some(self.root_prompt), started),
                    },
                }
            }
            Err(SessionError::Timeout { waited, .. }) => ExportError::Relay {
                repository: repository_name.to_string(),
                reason: format!("root prompt did not return within {}s", waited.as_secs()),
                context: session.context(Some(self.root_prompt), started),
            },
            Err(SessionError::Transport(reason)) => {
                tracing::warn!("Transport failure during copy: {}", reason);
                ExportError::ConnectionLost {
                    step: Step::CopyToRepository,
                    context: session.context(Some(self.root_prompt), started),
                }
            }
            Err(SessionError::Closed) | Err(SessionError::Connect(_)) => {
                ExportError::ConnectionLost {
                    step: Step::CopyToRepository,
                    context: session.context(Some(self.root_prompt), started),
                }
            }
        };

        reporter.record(pending.fail(&error));
        Err(error)
    }

    /// Local path of the relayed artifact on the repository mount.
    pub fn local_artifact_path(&self, artifact_name: &str) -> Option<PathBuf> {
        self.relay
            .local_path
            .as_deref()
            .map(|dir| dir.join(artifact_name))
    }

    /// Upload the relayed artifact and return the object URL.
    pub async fn upload_to_cloud(
        &self,
        uploader: &dyn ObjectUploader,
        upload: &UploadConfig,
        reporter: &mut Reporter,
        artifact_name: &str,
    ) -> Result<String, ExportError> {
        let key = object_key(&upload.prefix, artifact_name);
        let pending = StepRecord::begin(Step::UploadToCloud);

        let result = match self.local_artifact_path(artifact_name) {
            Some(path) => {
                tracing::info!("Uploading {:?} to {} as {}", path, uploader.target(), key);
                uploader.upload(&path, &key).await
            }
            None => Err(UploadError::MissingArtifact {
                path: PathBuf::from(artifact_name),
            }),
        };

        match result {
            Ok(url) => {
                reporter.record(pending.succeed(format!("uploaded to {url}")));
                Ok(url)
            }
            Err(source) => {
                let error = ExportError::Upload {
                    target: uploader.target(),
                    source,
                };
                reporter.record(pending.fail(&error));
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;

    fn config(extra: &str) -> ExportConfig {
        let yaml = format!(
            "appliance:\n  host: ise\n  username: admin\n  key_path: /k\nrelay:\n  repository: NFS\n{extra}"
        );
        ExportConfig::from_yaml_str(&yaml, "test").unwrap()
    }

    #[test]
    fn test_copy_command_substitution() {
        let config = config("");
        let relay = FileRelay::new(&config.relay, &config.menu.root_prompt, Duration::from_secs(1));
        assert_eq!(
            relay.copy_command("FullReport_01-Jan-2024.csv", "NFS"),
            "copy disk:/FullReport_01-Jan-2024.csv repository NFS"
        );
    }

    #[test]
    fn test_custom_copy_command() {
        let config = config("  copy_command: \"copy disk:/{artifact} repository {repository} overwrite\"\n");
        let relay = FileRelay::new(&config.relay, &config.menu.root_prompt, Duration::from_secs(1));
        assert_eq!(
            relay.copy_command("a.csv", "BACKUP"),
            "copy disk:/a.csv repository BACKUP overwrite"
        );
    }

    #[test]
    fn test_local_artifact_path() {
        let config = config("  local_path: /mnt/nfs/ise\n");
        let relay = FileRelay::new(&config.relay, &config.menu.root_prompt, Duration::from_secs(1));
        assert_eq!(
            relay.local_artifact_path("a.csv"),
            Some(PathBuf::from("/mnt/nfs/ise/a.csv"))
        );

        let config = self::config("");
        let relay = FileRelay::new(&config.relay, &config.menu.root_prompt, Duration::from_secs(1));
        assert_eq!(relay.local_artifact_path("a.csv"), None);
    }
}
