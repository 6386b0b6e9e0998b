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

//! End-to-end export run.
//!
//! Configuration, upload preflight, connect, menu navigation, copy to the
//! repository, session close, optional upload. Errors before the copy has
//! succeeded fail the run; an upload error only downgrades it to a partial
//! success.

use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::artifact::Artifact;
use crate::config::{ExportConfig, UploadConfig};
use crate::error::ExportError;
use crate::navigator::MenuNavigator;
use crate::relay::upload::{uploader_for, ObjectUploader};
use crate::relay::FileRelay;
use crate::report::audit::{self, AuditExporter, NullExporter};
use crate::report::{Reporter, RunOutcome, RunReport, Step, StepRecord};
use crate::session::{Connector, Session, ShellTransport, Transcript};

/// Runs exports against appliances reached through `C`.
pub struct ExportRunner<C: Connector> {
    connector: C,
    uploader: Option<Arc<dyn ObjectUploader>>,
    audit: Option<Arc<dyn AuditExporter>>,
    skip_upload: bool,
}

impl<C: Connector> ExportRunner<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            uploader: None,
            audit: None,
            skip_upload: false,
        }
    }

    /// Use `uploader` instead of the one built from the upload settings.
    #[must_use]
    pub fn with_uploader(mut self, uploader: Arc<dyn ObjectUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Use `exporter` instead of the configured audit file.
    #[must_use]
    pub fn with_audit_exporter(mut self, exporter: Arc<dyn AuditExporter>) -> Self {
        self.audit = Some(exporter);
        self
    }

    #[must_use]
    pub fn skip_upload(mut self, skip: bool) -> Self {
        self.skip_upload = skip;
        self
    }

    /// Load the configuration at `path` and run. A configuration error fails
    /// the run before any connection is attempted.
    pub async fn run_from_file(
        &self,
        path: &Path,
        environment: &str,
        run_date: NaiveDate,
    ) -> RunReport {
        match ExportConfig::load(path, environment).await {
            Ok(config) => self.run(&config, run_date).await,
            Err(e) => {
                let error = ExportError::from(e);
                let audit = self
                    .audit
                    .clone()
                    .unwrap_or_else(|| Arc::new(NullExporter::new()));
                let mut reporter = Reporter::new(environment, audit);
                reporter.record(StepRecord::begin(Step::Configuration).fail(&error));
                reporter.finish(RunOutcome::failure(&error)).await
            }
        }
    }

    /// Run one export for `run_date`.
    pub async fn run(&self, config: &ExportConfig, run_date: NaiveDate) -> RunReport {
        let audit = match &self.audit {
            Some(exporter) => exporter.clone(),
            None => audit::exporter_for(config.logging.audit_file.as_deref()).unwrap_or_else(|e| {
                tracing::error!("Audit trail unavailable: {:#}", e);
                Arc::new(NullExporter::new())
            }),
        };

        let mut reporter = Reporter::new(config.environment.as_str(), audit);
        let outcome = self.execute(config, run_date, &mut reporter).await;
        reporter.finish(outcome).await
    }

    async fn execute(
        &self,
        config: &ExportConfig,
        run_date: NaiveDate,
        reporter: &mut Reporter,
    ) -> RunOutcome {
        let artifact = match Artifact::for_date(
            &config.relay.artifact_pattern,
            &config.relay.date_format,
            run_date,
        ) {
            Ok(artifact) => artifact,
            Err(e) => {
                let error = ExportError::from(e);
                reporter.record(StepRecord::begin(Step::Configuration).fail(&error));
                return RunOutcome::failure(&error);
            }
        };
        reporter.set_artifact(artifact.name());

        tracing::info!(
            run_id = %reporter.run_id(),
            environment = %config.environment,
            "Starting export of {} from {}",
            artifact,
            config.appliance.host
        );

        let upload = self.upload_target(config);
        if let Some((_, uploader)) = &upload {
            let pending = StepRecord::begin(Step::Preflight);
            match uploader.preflight().await {
                Ok(()) => reporter.record(
                    pending.succeed(format!("credentials available for {}", uploader.target())),
                ),
                Err(source) => {
                    let error = ExportError::Upload {
                        target: uploader.target(),
                        source,
                    };
                    reporter.record(pending.fail(&error));
                    return RunOutcome::Failure {
                        step: Step::Preflight,
                        reason: error.to_string(),
                    };
                }
            }
        }

        let mut session = match self.connect(config, reporter).await {
            Ok(transport) => Session::new(transport, config.appliance.line_ending.as_str()),
            Err(error) => return RunOutcome::failure(&error),
        };

        let result = export_and_copy(config, &artifact, &mut session, reporter).await;
        session.close().await;
        save_transcript(config, reporter.run_id(), session.transcript()).await;

        if let Err(error) = result {
            return RunOutcome::failure(&error);
        }

        if let Some((upload, uploader)) = upload {
            let relay = FileRelay::new(
                &config.relay,
                &config.menu.root_prompt,
                config.timing.copy_timeout(),
            );
            if let Err(error) = relay
                .upload_to_cloud(uploader.as_ref(), upload, reporter, artifact.name())
                .await
            {
                return RunOutcome::partial(&error);
            }
        }

        RunOutcome::Success
    }

    fn upload_target<'c>(
        &self,
        config: &'c ExportConfig,
    ) -> Option<(&'c UploadConfig, Arc<dyn ObjectUploader>)> {
        if self.skip_upload {
            if config.upload.is_some() {
                tracing::info!("Cloud upload skipped");
            }
            return None;
        }
        config.upload.as_ref().map(|upload| {
            let uploader = self
                .uploader
                .clone()
                .unwrap_or_else(|| uploader_for(upload));
            (upload, uploader)
        })
    }

    async fn connect(
        &self,
        config: &ExportConfig,
        reporter: &mut Reporter,
    ) -> Result<C::Transport, ExportError> {
        let appliance = &config.appliance;
        let timeout = config.timing.connect_timeout();
        let pending = StepRecord::begin(Step::Connect);

        let reason = match tokio::time::timeout(
            timeout,
            self.connector.connect(appliance, &config.timing),
        )
        .await
        {
            Ok(Ok(transport)) => {
                reporter.record(pending.succeed(format!(
                    "connected to {}@{}:{}",
                    appliance.username, appliance.host, appliance.port
                )));
                return Ok(transport);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", timeout.as_secs()),
        };

        let error = ExportError::Connection {
            host: format!("{}:{}", appliance.host, appliance.port),
            reason,
        };
        reporter.record(pending.fail(&error));
        Err(error)
    }
}

async fn export_and_copy<T: ShellTransport>(
    config: &ExportConfig,
    artifact: &Artifact,
    session: &mut Session<T>,
    reporter: &mut Reporter,
) -> Result<(), ExportError> {
    MenuNavigator::new(session, &config.menu, &config.timing, reporter)
        .generate_export()
        .await?;

    FileRelay::new(
        &config.relay,
        &config.menu.root_prompt,
        config.timing.copy_timeout(),
    )
    .copy_to_repository(session, reporter, artifact.name(), &config.relay.repository)
    .await
}

async fn save_transcript(config: &ExportConfig, run_id: Uuid, transcript: &Transcript) {
    let Some(dir) = &config.logging.transcript_dir else {
        return;
    };
    let name = format!("{}-{}", config.environment, run_id);
    match transcript.write_to(dir, &name).await {
        Ok(path) => tracing::info!("Session transcript written to {:?}", path),
        Err(e) => tracing::error!("Failed to write session transcript to {:?}: {}", dir, e),
    }
}
