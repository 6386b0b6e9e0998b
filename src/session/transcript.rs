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

//! Session transcript: everything sent to and received from the appliance.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Time since the session was opened.
    pub offset: Duration,
    pub direction: Direction,
    pub text: String,
}

#[derive(Debug)]
pub struct Transcript {
    started: Instant,
    entries: Vec<TranscriptEntry>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            entries: Vec::new(),
        }
    }

    pub fn record_sent(&mut self, text: &str) {
        tracing::debug!(target: "ise_export::transcript", ">> {}", text);
        self.push(Direction::Sent, text.to_string());
    }

    pub fn record_received(&mut self, text: &str) {
        tracing::debug!(target: "ise_export::transcript", "<< {:?}", text);
        self.push(Direction::Received, text.to_string());
    }

    fn push(&mut self, direction: Direction, text: String) {
        self.entries.push(TranscriptEntry {
            offset: self.started.elapsed(),
            direction,
            text,
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Commands sent, in order.
    pub fn sent(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.direction == Direction::Sent)
            .map(|e| e.text.as_str())
    }

    /// Last `max_chars` characters of received output.
    pub fn received_tail(&self, max_chars: usize) -> String {
        let mut pieces = Vec::new();
        let mut remaining = max_chars;
        for entry in self.entries.iter().rev() {
            if remaining == 0 {
                break;
            }
            if entry.direction != Direction::Received {
                continue;
            }
            let count = entry.text.chars().count();
            if count <= remaining {
                pieces.push(entry.text.as_str());
                remaining -= count;
            } else {
                let skip = entry
                    .text
                    .char_indices()
                    .nth(count - remaining)
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                pieces.push(&entry.text[skip..]);
                remaining = 0;
            }
        }
        pieces.reverse();
        pieces.concat()
    }

    /// Human-readable rendering, one entry per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let marker = match entry.direction {
                Direction::Sent => ">>",
                Direction::Received => "<<",
            };
            let _ = writeln!(
                out,
                "[{:>9.3}s] {} {}",
                entry.offset.as_secs_f64(),
                marker,
                entry.text.escape_debug()
            );
        }
        out
    }

    /// Write the transcript into `dir` as `<name>.log`.
    pub async fn write_to(&self, dir: &Path, name: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{name}.log"));
        tokio::fs::write(&path, self.render()).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_tail_spans_entries() {
        let mut transcript = Transcript::new();
        transcript.record_received("ise-ppan/admin# ");
        transcript.record_sent("application configure ise");
        transcript.record_received("Selection configuration option [0-31]: ");

        assert_eq!(transcript.received_tail(8), "[0-31]: ");
        assert_eq!(
            transcript.received_tail(1000),
            "ise-ppan/admin# Selection configuration option [0-31]: "
        );
        assert_eq!(transcript.sent().collect::<Vec<_>>(), ["application configure ise"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_and_write() {
        let mut transcript = Transcript::new();
        transcript.record_sent("16");
        tokio::time::sleep(Duration::from_secs(2)).await;
        transcript.record_received("Starting\r\n");

        let rendered = transcript.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "[    0.000s] >> 16");
        assert_eq!(lines[1], "[    2.000s] << Starting\\r\\n");

        let dir = tempfile::tempdir().unwrap();
        let path = transcript.write_to(dir.path(), "run-1").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), rendered);
    }
}
