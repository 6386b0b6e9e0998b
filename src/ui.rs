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

use crate::report::{RunOutcome, RunReport, StepStatus};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Format a Duration into a human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs_f64();

    if total_seconds < 1.0 {
        format!("{:.1} ms", total_seconds * 1000.0)
    } else if total_seconds < 60.0 {
        format!("{total_seconds:.2} s")
    } else {
        let minutes = duration.as_secs() / 60;
        let seconds = duration.as_secs() % 60;

        if seconds == 0 {
            format!("{minutes}m")
        } else {
            format!("{minutes}m {seconds}s")
        }
    }
}

/// Console summary of a finished run.
pub fn format_summary(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{} {} ({})\n",
        "Export".bold(),
        report.artifact.as_deref().unwrap_or("<no artifact>"),
        report.environment.dimmed()
    ));

    for record in report.steps() {
        let symbol = match record.status {
            StepStatus::Succeeded => "●".green().to_string(),
            StepStatus::Failed => "✗".red().to_string(),
        };
        output.push_str(&format!(
            "  {} {:<20} {:>10}  {}\n",
            symbol,
            record.step.as_str(),
            format_duration(record.elapsed),
            record.detail.dimmed()
        ));
    }

    let outcome = match report.outcome() {
        Some(RunOutcome::Success) => "Success".green().bold().to_string(),
        Some(RunOutcome::PartialSuccess { step, reason }) => {
            format!("Partial success at {step}: {reason}").yellow().to_string()
        }
        Some(RunOutcome::Failure { step, reason }) => {
            format!("Failed at {step}: {reason}").red().to_string()
        }
        None => "Unfinished".red().to_string(),
    };
    output.push_str(&format!("{} {}\n", "Result:".bold(), outcome));

    output
}
