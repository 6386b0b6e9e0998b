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

//! Durable audit trail of export runs.
//!
//! - [`AuditEvent`]: one step or run outcome
//! - [`AuditExporter`]: destination for audit events
//! - [`FileExporter`]: JSON Lines file, append only
//! - [`NullExporter`]: used when no audit file is configured

pub mod event;
pub mod exporter;
pub mod file;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

pub use event::{AuditEvent, EventResult, EventType};
pub use exporter::{AuditExporter, NullExporter};
pub use file::FileExporter;

/// Build the exporter for an optional audit file path.
pub fn exporter_for(audit_file: Option<&Path>) -> Result<Arc<dyn AuditExporter>> {
    match audit_file {
        Some(path) => {
            tracing::debug!("Writing audit trail to {:?}", path);
            Ok(Arc::new(FileExporter::new(path)?))
        }
        None => Ok(Arc::new(NullExporter::new())),
    }
}
