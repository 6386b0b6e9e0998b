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

//! Error types for an export run.
//!
//! # Error Categories
//!
//! - [`ConfigError`]: settings could not be loaded or are incomplete
//! - [`SessionError`]: transport-level failures of the remote shell
//! - [`UploadError`]: cloud upload failures
//! - [`ExportError`]: the run-level taxonomy every step reports with

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::report::Step;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Every missing required field is listed, not only the first one.
    #[error("missing required settings: {}", fields.join(", "))]
    Missing { fields: Vec<String> },

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors produced by the remote shell session.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Host unreachable, authentication rejected or handshake timed out.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("pattern '{pattern}' not seen within {waited:?}")]
    Timeout { pattern: String, waited: Duration },

    #[error("session closed by remote host")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors produced by the cloud upload back-ends.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("artifact not found at {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("failed to read artifact {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Diagnostic context attached to navigation and relay failures.
///
/// Carries enough to diagnose a failed run from the log alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub last_sent: Option<String>,
    pub expected: Option<String>,
    pub elapsed: Duration,
    pub received_tail: String,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "last sent: {}, expected: {}, elapsed: {:.1}s",
            self.last_sent.as_deref().unwrap_or("<nothing>"),
            self.expected.as_deref().unwrap_or("<nothing>"),
            self.elapsed.as_secs_f64()
        )?;
        if !self.received_tail.is_empty() {
            write!(f, ", last output: {:?}", self.received_tail)?;
        }
        Ok(())
    }
}

/// Run-level error taxonomy.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("cannot connect to {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("connection lost during {step} ({context})")]
    ConnectionLost { step: Step, context: ErrorContext },

    #[error("navigation failed during {step}: {reason} ({context})")]
    Navigation {
        step: Step,
        reason: String,
        context: ErrorContext,
    },

    #[error("report not completed within {max_wait:?} after {polls} polls ({context})")]
    ReportTimeout {
        max_wait: Duration,
        polls: u32,
        context: ErrorContext,
    },

    #[error("copy to repository '{repository}' failed: {reason} ({context})")]
    Relay {
        repository: String,
        reason: String,
        context: ErrorContext,
    },

    #[error("upload to {target} failed: {source}")]
    Upload {
        target: String,
        #[source]
        source: UploadError,
    },
}

impl ExportError {
    /// The step the error is attributed to in the run report.
    pub fn step(&self) -> Step {
        match self {
            ExportError::Configuration(_) => Step::Configuration,
            ExportError::Connection { .. } => Step::Connect,
            ExportError::ConnectionLost { step, .. } => *step,
            ExportError::Navigation { step, .. } => *step,
            ExportError::ReportTimeout { .. } => Step::AwaitReport,
            ExportError::Relay { .. } => Step::CopyToRepository,
            ExportError::Upload { .. } => Step::UploadToCloud,
        }
    }

    /// Whether re-running later may succeed without any change.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExportError::ReportTimeout { .. }
                | ExportError::ConnectionLost { .. }
                | ExportError::Connection { .. }
        )
    }
}
