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

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ise-export",
    version,
    about = "Generate the ISE All Endpoints report over SSH and relay it to a repository",
    long_about = "ise-export connects to an identity services appliance over SSH, drives its\napplication configuration menu to generate the All Endpoints report, copies the\nreport to a configured repository and optionally uploads it to S3.\n\nExit codes: 0 (success), 2 (partial success: upload failed), 1 (failure)",
    after_help = "EXAMPLES:\n  Run the production export:        ise-export prod\n  Use an explicit config file:      ise-export --config ./staging.yaml\n  Validate configuration only:      ise-export prod --check-config\n  Re-run for a past date, no S3:    ise-export prod --date 2024-01-01 --skip-upload"
)]
pub struct Cli {
    #[arg(
        help = "Environment name; selects config.<ENVIRONMENT>.yaml in the config directory\nUses config.yaml when omitted"
    )]
    pub environment: Option<String>,

    #[arg(
        short = 'c',
        long,
        env = "ISE_EXPORT_CONFIG",
        help = "Configuration file path (overrides the environment lookup)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "ISE_EXPORT_CONFIG_DIR",
        help = "Directory holding per-environment configuration files [default: ~/.config/ise-export]"
    )]
    pub config_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        help = "Run date used to name the report artifact [default: today]"
    )]
    pub date: Option<NaiveDate>,

    #[arg(long, help = "Skip the cloud upload even when configured")]
    pub skip_upload: bool,

    #[arg(long, help = "Validate the configuration and exit without connecting")]
    pub check_config: bool,

    #[arg(long, help = "Append log output to this file (no colors)")]
    pub log_file: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}
