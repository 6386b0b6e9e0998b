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

//! Audit exporter trait and the null exporter.

use super::event::AuditEvent;
use anyhow::Result;
use async_trait::async_trait;

/// Destination for audit events.
#[async_trait]
pub trait AuditExporter: Send + Sync {
    async fn export(&self, event: AuditEvent) -> Result<()>;

    /// Export multiple events in order.
    ///
    /// The default implementation calls `export()` for each event.
    async fn export_batch(&self, events: &[AuditEvent]) -> Result<()> {
        for event in events {
            self.export(event.clone()).await?;
        }
        Ok(())
    }

    /// Make every exported event durable.
    async fn flush(&self) -> Result<()>;
}

/// Exporter that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NullExporter;

impl NullExporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditExporter for NullExporter {
    async fn export(&self, _event: AuditEvent) -> Result<()> {
        Ok(())
    }

    async fn export_batch(&self, _events: &[AuditEvent]) -> Result<()> {
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
