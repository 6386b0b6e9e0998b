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

//! Remote shell session.
//!
//! A [`Session`] wraps a [`ShellTransport`] with line sending, pattern
//! expectation over buffered output and a transcript of all traffic. The SSH
//! transport lives in [`ssh`]; anything else implementing the trait (for
//! example a simulated appliance) can be driven the same way.

pub mod pattern;
pub mod ssh;
pub mod transcript;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{ApplianceConfig, TimingConfig};
use crate::error::{ErrorContext, SessionError};

pub use pattern::Pattern;
pub use ssh::{SshConnector, SshShell};
pub use transcript::{Direction, Transcript, TranscriptEntry};

/// Oldest output is dropped once the unconsumed buffer grows past this.
const MAX_BUFFER_BYTES: usize = 256 * 1024;

/// Characters of received output attached to error contexts.
const CONTEXT_TAIL_CHARS: usize = 400;

/// Deadline used when a timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Byte stream to and from an interactive shell.
#[async_trait]
pub trait ShellTransport: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError>;

    /// Next chunk of output, or `None` once the remote side has closed.
    ///
    /// Must be cancel safe: a read dropped before completion loses no data.
    async fn read(&mut self) -> Result<Option<Vec<u8>>, SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens shell transports to the appliance.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: ShellTransport;

    async fn connect(
        &self,
        appliance: &ApplianceConfig,
        timing: &TimingConfig,
    ) -> Result<Self::Transport, SessionError>;
}

/// An open shell on the appliance, owned by a single run.
pub struct Session<T: ShellTransport> {
    transport: T,
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    partial: Vec<u8>,
    transcript: Transcript,
    last_sent: Option<String>,
    line_ending: String,
    remote_closed: bool,
    released: bool,
}

impl<T: ShellTransport> Session<T> {
    pub fn new(transport: T, line_ending: impl Into<String>) -> Self {
        Self {
            transport,
            buffer: String::new(),
            partial: Vec::new(),
            transcript: Transcript::new(),
            last_sent: None,
            line_ending: line_ending.into(),
            remote_closed: false,
            released: false,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.remote_closed && !self.released
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Send `text` followed by the configured line ending.
    pub async fn send_line(&mut self, text: &str) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::Closed);
        }

        self.transcript.record_sent(text);
        self.last_sent = Some(text.to_string());

        let line = format!("{text}{}", self.line_ending);
        if let Err(e) = self.transport.write(line.as_bytes()).await {
            if matches!(e, SessionError::Closed) {
                self.remote_closed = true;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Wait until `pattern` appears in the output.
    ///
    /// Returns everything up to and including the match. Output after the
    /// match stays buffered for the next call.
    pub async fn expect(
        &mut self,
        pattern: &Pattern,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        let deadline = deadline_after(timeout);

        loop {
            if let Some((_, end)) = pattern.find(&self.buffer) {
                let captured: String = self.buffer.drain(..end).collect();
                return Ok(captured);
            }

            if !self.is_open() {
                return Err(SessionError::Closed);
            }

            match tokio::time::timeout_at(deadline, self.transport.read()).await {
                Err(_) => {
                    return Err(SessionError::Timeout {
                        pattern: pattern.to_string(),
                        waited: timeout,
                    })
                }
                Ok(Ok(Some(chunk))) => self.push_output(&chunk),
                Ok(Ok(None)) => {
                    tracing::debug!("Remote shell closed while waiting for '{}'", pattern);
                    self.remote_closed = true;
                }
                Ok(Err(e)) => {
                    self.remote_closed = true;
                    return Err(e);
                }
            }
        }
    }

    fn push_output(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);

        let text = match std::str::from_utf8(&self.partial) {
            Ok(text) => {
                let text = text.to_string();
                self.partial.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.partial[..valid]).into_owned();
                self.partial.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                text
            }
        };

        if text.is_empty() {
            return;
        }

        self.transcript.record_received(&text);
        self.buffer.push_str(&text);

        if self.buffer.len() > MAX_BUFFER_BYTES {
            let mut cut = self.buffer.len() - MAX_BUFFER_BYTES;
            while !self.buffer.is_char_boundary(cut) {
                cut += 1;
            }
            self.buffer.drain(..cut);
        }
    }

    /// Drop output received but not yet consumed by [`Session::expect`].
    ///
    /// Returns the discarded text so callers can log it.
    pub fn discard_buffered(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    /// Diagnostic context for a failure that started at `started`.
    pub fn context(&self, expected: Option<&Pattern>, started: Instant) -> ErrorContext {
        ErrorContext {
            last_sent: self.last_sent.clone(),
            expected: expected.map(|p| p.to_string()),
            elapsed: started.elapsed(),
            received_tail: self.transcript.received_tail(CONTEXT_TAIL_CHARS),
        }
    }

    /// Close the transport. Safe to call more than once and after failures.
    pub async fn close(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = self.transport.close().await {
            tracing::debug!("Error while closing session: {}", e);
        }
    }

    /// Consume the session, keeping only its transcript.
    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }
}
