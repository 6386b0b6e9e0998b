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

//! Run reporting.
//!
//! Every step of a run is recorded as a [`StepRecord`]; the run ends with a
//! single [`RunOutcome`] entry. The finished [`RunReport`] is mirrored to the
//! audit trail.

pub mod audit;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::ExportError;
use audit::{AuditEvent, AuditExporter, EventResult, EventType};

/// A unit of work in an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Configuration,
    Preflight,
    Connect,
    AwaitRootPrompt,
    ShellSetup,
    EnterMenu,
    RequestReport,
    AwaitReport,
    ExitMenu,
    CopyToRepository,
    UploadToCloud,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Configuration => "configuration",
            Step::Preflight => "preflight",
            Step::Connect => "connect",
            Step::AwaitRootPrompt => "await_root_prompt",
            Step::ShellSetup => "shell_setup",
            Step::EnterMenu => "enter_menu",
            Step::RequestReport => "request_report",
            Step::AwaitReport => "await_report",
            Step::ExitMenu => "exit_menu",
            Step::CopyToRepository => "copy_to_repository",
            Step::UploadToCloud => "upload_to_cloud",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// What happened during one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Command sent to the appliance, if any.
    pub sent: Option<String>,
    /// Pattern waited for, if any.
    pub expected: Option<String>,
    pub status: StepStatus,
    pub detail: String,
}

impl StepRecord {
    /// Start timing a step.
    pub fn begin(step: Step) -> PendingStep {
        PendingStep {
            step,
            started_at: Utc::now(),
            started: Instant::now(),
            sent: None,
            expected: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// A step that has started but not finished.
#[derive(Debug)]
pub struct PendingStep {
    step: Step,
    started_at: DateTime<Utc>,
    started: Instant,
    sent: Option<String>,
    expected: Option<String>,
}

impl PendingStep {
    #[must_use]
    pub fn sent(mut self, command: impl Into<String>) -> Self {
        self.sent = Some(command.into());
        self
    }

    #[must_use]
    pub fn expected(mut self, pattern: impl fmt::Display) -> Self {
        self.expected = Some(pattern.to_string());
        self
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn succeed(self, detail: impl Into<String>) -> StepRecord {
        self.finish(StepStatus::Succeeded, detail.into())
    }

    pub fn fail(self, error: &ExportError) -> StepRecord {
        self.finish(StepStatus::Failed, error.to_string())
    }

    fn finish(self, status: StepStatus, detail: String) -> StepRecord {
        StepRecord {
            step: self.step,
            started_at: self.started_at,
            elapsed: self.started.elapsed(),
            sent: self.sent,
            expected: self.expected,
            status,
            detail,
        }
    }
}

/// Final status of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Export and copy succeeded but an optional step failed.
    PartialSuccess { step: Step, reason: String },
    Failure { step: Step, reason: String },
}

impl RunOutcome {
    pub fn failure(error: &ExportError) -> Self {
        RunOutcome::Failure {
            step: error.step(),
            reason: error.to_string(),
        }
    }

    pub fn partial(error: &ExportError) -> Self {
        RunOutcome::PartialSuccess {
            step: error.step(),
            reason: error.to_string(),
        }
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Failure { .. } => 1,
            RunOutcome::PartialSuccess { .. } => 2,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    fn audit_result(&self) -> EventResult {
        match self {
            RunOutcome::Success => EventResult::Success,
            RunOutcome::PartialSuccess { .. } => EventResult::PartialSuccess,
            RunOutcome::Failure { .. } => EventResult::Failure,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => f.write_str("success"),
            RunOutcome::PartialSuccess { step, reason } => {
                write!(f, "partial success ({step}: {reason})")
            }
            RunOutcome::Failure { step, reason } => write!(f, "failure ({step}: {reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEntry {
    Step(StepRecord),
    Outcome(RunOutcome),
}

/// Ordered record of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub environment: String,
    /// Set once the artifact name is known.
    pub artifact: Option<String>,
    pub started_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            environment: environment.into(),
            artifact: None,
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.entries.iter().filter_map(|entry| match entry {
            ReportEntry::Step(record) => Some(record),
            ReportEntry::Outcome(_) => None,
        })
    }

    /// First record for `step`.
    pub fn step(&self, step: Step) -> Option<&StepRecord> {
        self.steps().find(|record| record.step == step)
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.entries.iter().rev().find_map(|entry| match entry {
            ReportEntry::Outcome(outcome) => Some(outcome),
            ReportEntry::Step(_) => None,
        })
    }

    /// Exit code of the run; an unfinished report counts as a failure.
    pub fn exit_code(&self) -> i32 {
        self.outcome().map(RunOutcome::exit_code).unwrap_or(1)
    }

    fn audit_events(&self) -> Vec<AuditEvent> {
        let run_id = self.run_id.to_string();
        self.entries
            .iter()
            .map(|entry| {
                let event = match entry {
                    ReportEntry::Step(record) => {
                        let result = match record.status {
                            StepStatus::Succeeded => EventResult::Success,
                            StepStatus::Failed => EventResult::Failure,
                        };
                        let mut event = AuditEvent::new(
                            EventType::StepCompleted,
                            run_id.clone(),
                            self.environment.clone(),
                        )
                        .with_step(record.step)
                        .with_result(result)
                        .with_elapsed(record.elapsed)
                        .with_details(record.detail.clone());
                        event.timestamp = record.started_at;
                        if let Some(sent) = &record.sent {
                            event = event.with_sent(sent.clone());
                        }
                        if let Some(expected) = &record.expected {
                            event = event.with_expected(expected.clone());
                        }
                        event
                    }
                    ReportEntry::Outcome(outcome) => AuditEvent::new(
                        EventType::RunFinished,
                        run_id.clone(),
                        self.environment.clone(),
                    )
                    .with_result(outcome.audit_result())
                    .with_details(outcome.to_string()),
                };
                match &self.artifact {
                    Some(artifact) => event.with_artifact(artifact.clone()),
                    None => event,
                }
            })
            .collect()
    }
}

/// Collects step records for a run and writes the audit trail.
pub struct Reporter {
    report: RunReport,
    audit: Arc<dyn AuditExporter>,
}

impl Reporter {
    pub fn new(environment: impl Into<String>, audit: Arc<dyn AuditExporter>) -> Self {
        Self {
            report: RunReport::new(environment),
            audit,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.report.run_id
    }

    pub fn set_artifact(&mut self, artifact: impl Into<String>) {
        self.report.artifact = Some(artifact.into());
    }

    pub fn record(&mut self, record: StepRecord) {
        match record.status {
            StepStatus::Succeeded => tracing::info!(
                step = %record.step,
                elapsed_ms = record.elapsed.as_millis() as u64,
                sent = record.sent.as_deref().unwrap_or(""),
                expected = record.expected.as_deref().unwrap_or(""),
                "{}",
                record.detail
            ),
            StepStatus::Failed => tracing::error!(
                step = %record.step,
                elapsed_ms = record.elapsed.as_millis() as u64,
                sent = record.sent.as_deref().unwrap_or(""),
                expected = record.expected.as_deref().unwrap_or(""),
                "{}",
                record.detail
            ),
        }
        self.report.entries.push(ReportEntry::Step(record));
    }

    /// Append the outcome entry, export the audit trail and hand back the report.
    ///
    /// Audit export failures are logged; they never change the outcome.
    pub async fn finish(mut self, outcome: RunOutcome) -> RunReport {
        match &outcome {
            RunOutcome::Success => tracing::info!(run_id = %self.report.run_id, "Run succeeded"),
            RunOutcome::PartialSuccess { .. } => {
                tracing::warn!(run_id = %self.report.run_id, "Run finished with {}", outcome)
            }
            RunOutcome::Failure { .. } => {
                tracing::error!(run_id = %self.report.run_id, "Run finished with {}", outcome)
            }
        }
        self.report.entries.push(ReportEntry::Outcome(outcome));

        let events = self.report.audit_events();
        if let Err(e) = self.audit.export_batch(&events).await {
            tracing::error!("Failed to write audit trail: {:#}", e);
        }
        if let Err(e) = self.audit.flush().await {
            tracing::error!("Failed to flush audit trail: {:#}", e);
        }

        self.report
    }
}
