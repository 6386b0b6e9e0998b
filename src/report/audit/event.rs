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

//! Audit event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::report::Step;

/// One line of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier
    pub id: String,

    /// When the step started, or when the run finished
    pub timestamp: DateTime<Utc>,

    pub event_type: EventType,

    /// Run the event belongs to
    pub run_id: String,

    pub environment: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,

    /// Command sent to the appliance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<String>,

    /// Pattern waited for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,

    pub result: EventResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A run step finished, successfully or not
    StepCompleted,
    /// Final outcome of a run
    RunFinished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventResult {
    Success,
    PartialSuccess,
    Failure,
}

impl AuditEvent {
    /// Create a new audit event with the minimum required fields.
    pub fn new(event_type: EventType, run_id: String, environment: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            run_id,
            environment,
            step: None,
            artifact: None,
            sent: None,
            expected: None,
            elapsed_ms: None,
            result: EventResult::Success,
            details: None,
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_artifact(mut self, artifact: String) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_sent(mut self, sent: String) -> Self {
        self.sent = Some(sent);
        self
    }

    pub fn with_expected(mut self, expected: String) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = Some(elapsed.as_millis() as u64);
        self
    }

    pub fn with_result(mut self, result: EventResult) -> Self {
        self.result = result;
        self
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}
