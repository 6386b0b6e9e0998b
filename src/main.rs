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

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use ise_export::{
    cli::Cli,
    config::{ExportConfig, DEFAULT_ENVIRONMENT},
    runner::ExportRunner,
    session::SshConnector,
    ui::format_summary,
    utils::init_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
    let config_path = resolve_config_path(&cli)?;
    tracing::debug!("Using configuration {:?} for environment '{}'", config_path, environment);

    if cli.check_config {
        return match ExportConfig::load(&config_path, &environment).await {
            Ok(config) => {
                println!(
                    "{} {} ({} -> {})",
                    "Configuration OK:".green().bold(),
                    config_path.display(),
                    config.appliance.host,
                    config.relay.repository
                );
                Ok(())
            }
            Err(e) => {
                eprintln!("{} {}", "Configuration invalid:".red().bold(), e);
                std::process::exit(1);
            }
        };
    }

    let run_date = cli
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let report = ExportRunner::new(SshConnector)
        .skip_upload(cli.skip_upload)
        .run_from_file(&config_path, &environment, run_date)
        .await;

    print!("{}", format_summary(&report));

    let exit_code = report.exit_code();
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn resolve_config_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }
    let dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(ExportConfig::default_config_dir);
    ExportConfig::resolve_path(&dir, cli.environment.as_deref())
        .context("Failed to resolve configuration path")
}
