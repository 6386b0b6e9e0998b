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

//! Configuration tests.

use serial_test::serial;
use std::path::{Path, PathBuf};

use super::types::{ExportConfig, HostKeyPolicy, UploadTarget};
use super::utils::{expand_env_vars, expand_tilde, is_valid_environment_name};
use crate::error::ConfigError;

const MINIMAL: &str = r#"
appliance:
  host: ise-ppan.example.net
  username: admin
  key_path: /keys/ise_ed25519
relay:
  repository: NFS
"#;

#[test]
#[serial]
fn test_expand_env_vars() {
    std::env::set_var("ISE_EXPORT_TEST_VAR", "test_value");
    std::env::set_var("ISE_EXPORT_TEST_USER", "testuser");

    // ${VAR} syntax
    let (out, unresolved) = expand_env_vars("Hello ${ISE_EXPORT_TEST_VAR}!");
    assert_eq!(out, "Hello test_value!");
    assert!(unresolved.is_empty());

    // $VAR syntax
    let (out, _) = expand_env_vars("$ISE_EXPORT_TEST_USER@host");
    assert_eq!(out, "testuser@host");

    // Mixed
    let (out, _) = expand_env_vars("${ISE_EXPORT_TEST_USER}:$ISE_EXPORT_TEST_VAR");
    assert_eq!(out, "testuser:test_value");

    // Unset variables stay in place and are reported
    let (out, unresolved) = expand_env_vars("${ISE_EXPORT_NONEXISTENT}/x");
    assert_eq!(out, "${ISE_EXPORT_NONEXISTENT}/x");
    assert_eq!(unresolved, vec!["ISE_EXPORT_NONEXISTENT".to_string()]);

    // Lone dollar signs are literal
    let (out, unresolved) = expand_env_vars("cost: $ 5 and ${}");
    assert_eq!(out, "cost: $ 5 and ${}");
    assert!(unresolved.is_empty());

    std::env::remove_var("ISE_EXPORT_TEST_VAR");
    std::env::remove_var("ISE_EXPORT_TEST_USER");
}

#[test]
#[serial]
fn test_expand_tilde() {
    let original_home = std::env::var("HOME").ok();
    std::env::set_var("HOME", "/home/user");

    let expanded = expand_tilde(Path::new("~/.ssh/id_ed25519"));
    let untouched = expand_tilde(Path::new("/etc/~backup"));

    if let Some(home) = original_home {
        std::env::set_var("HOME", home);
    } else {
        std::env::remove_var("HOME");
    }

    assert_eq!(expanded, PathBuf::from("/home/user/.ssh/id_ed25519"));
    assert_eq!(untouched, PathBuf::from("/etc/~backup"));
}

#[test]
fn test_environment_names() {
    assert!(is_valid_environment_name("prod"));
    assert!(is_valid_environment_name("staging-eu_2"));
    assert!(!is_valid_environment_name(""));
    assert!(!is_valid_environment_name("../prod"));
    assert!(!is_valid_environment_name("prod.yaml"));
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config = ExportConfig::from_yaml_str(MINIMAL, "staging").unwrap();

    assert_eq!(config.environment, "staging");
    assert_eq!(config.appliance.host, "ise-ppan.example.net");
    assert_eq!(config.appliance.port, 22);
    assert_eq!(config.appliance.host_key_policy, HostKeyPolicy::AcceptAny);
    assert_eq!(config.appliance.line_ending, "\n");
    assert_eq!(config.menu.entry_command, "application configure ise");
    assert_eq!(config.menu.report_option, "16");
    assert_eq!(config.menu.exit_option, "0");
    assert_eq!(config.timing.exit_attempts, 3);
    assert_eq!(config.timing.report_max_wait_secs, 1800);
    assert_eq!(config.relay.repository, "NFS");
    assert_eq!(config.relay.artifact_pattern, "FullReport_{date}.csv");
    assert_eq!(config.relay.date_format, "%d-%b-%Y");
    assert!(config.upload.is_none());
    assert!(config.logging.audit_file.is_none());
}

#[test]
fn test_full_config_parsing() {
    let yaml = r#"
environment: prod
appliance:
  host: 10.0.0.5
  port: 2222
  username: admin
  key_path: /keys/id_rsa
  key_passphrase: hunter2
  host_key_check: /etc/ise-export/known_hosts
  line_ending: "\r\n"
menu:
  root_prompt: "re:ise-ppan-\\w+/admin#"
  setup_commands: ["terminal length 0"]
  banner: "Selection ISE configuration option"
  report_started: "Generation Started"
timing:
  report_poll_interval_secs: 5
  report_max_wait_secs: 600
  exit_attempts: 2
relay:
  repository: NFS
  local_path: /mnt/nfs/ise
  error_markers: ["% Error"]
upload:
  bucket: ise-exports
  region: eu-west-1
  prefix: reports/
  profile: exporter
logging:
  audit_file: /var/log/ise-export/audit.jsonl
"#;

    let config = ExportConfig::from_yaml_str(yaml, "ignored").unwrap();

    assert_eq!(config.environment, "prod");
    assert_eq!(config.appliance.port, 2222);
    assert_eq!(
        config.appliance.key_passphrase.as_deref().map(String::as_str),
        Some("hunter2")
    );
    assert_eq!(
        config.appliance.host_key_policy,
        HostKeyPolicy::KnownHostsFile(PathBuf::from("/etc/ise-export/known_hosts"))
    );
    assert_eq!(config.appliance.line_ending, "\r\n");
    assert!(config.menu.root_prompt.is_match("ise-ppan-cx/admin#"));
    assert_eq!(config.menu.setup_commands, vec!["terminal length 0"]);
    assert_eq!(config.menu.report_started.to_string(), "Generation Started");
    // Unset menu fields keep their defaults
    assert_eq!(config.menu.report_option, "16");
    assert_eq!(config.timing.report_poll_interval_secs, 5);
    assert_eq!(config.timing.exit_attempts, 2);
    assert_eq!(config.timing.prompt_timeout_secs, 30);
    assert_eq!(config.relay.error_markers, vec!["% Error"]);

    let upload = config.upload.unwrap();
    assert_eq!(upload.prefix, "reports/");
    assert_eq!(
        upload.target,
        UploadTarget::S3 {
            bucket: "ise-exports".to_string(),
            region: "eu-west-1".to_string(),
            profile: Some("exporter".to_string()),
        }
    );
}

#[test]
fn test_all_missing_fields_reported() {
    let yaml = r#"
appliance:
  host: ise-ppan.example.net
upload:
  bucket: ise-exports
"#;

    let err = ExportConfig::from_yaml_str(yaml, "dev").unwrap_err();
    match err {
        ConfigError::Missing { fields } => {
            assert_eq!(
                fields,
                vec![
                    "appliance.username",
                    "appliance.key_path",
                    "relay.repository",
                    "upload.region",
                    "relay.local_path (required for upload)",
                ]
            );
        }
        other => panic!("expected missing fields, got {other:?}"),
    }
}

#[test]
fn test_blank_values_count_as_missing() {
    let yaml = r#"
appliance:
  host: "  "
  username: admin
  key_path: /keys/id_rsa
relay:
  repository: NFS
"#;

    let err = ExportConfig::from_yaml_str(yaml, "dev").unwrap_err();
    assert!(matches!(err, ConfigError::Missing { ref fields } if fields == &["appliance.host"]));
}

#[test]
#[serial]
fn test_env_var_expansion_in_settings() {
    std::env::set_var("ISE_EXPORT_TEST_HOST", "ise-ppan-cx.corp");
    std::env::remove_var("ISE_EXPORT_TEST_KEY");

    let yaml = r#"
appliance:
  host: ${ISE_EXPORT_TEST_HOST}
  username: admin
  key_path: ${ISE_EXPORT_TEST_KEY}
relay:
  repository: NFS
"#;

    let err = ExportConfig::from_yaml_str(yaml, "dev").unwrap_err();
    assert!(
        matches!(err, ConfigError::Missing { ref fields } if fields == &["appliance.key_path (unset $ISE_EXPORT_TEST_KEY)"])
    );

    std::env::set_var("ISE_EXPORT_TEST_KEY", "/keys/from_env");
    let config = ExportConfig::from_yaml_str(yaml, "dev").unwrap();
    assert_eq!(config.appliance.host, "ise-ppan-cx.corp");
    assert_eq!(config.appliance.key_path, PathBuf::from("/keys/from_env"));

    std::env::remove_var("ISE_EXPORT_TEST_HOST");
    std::env::remove_var("ISE_EXPORT_TEST_KEY");
}

#[test]
fn test_presigned_url_needs_no_bucket() {
    let yaml = format!(
        "{MINIMAL}  local_path: /mnt/nfs\nupload:\n  presigned_url: https://s3.example.com/obj?sig=abc\n"
    );

    let config = ExportConfig::from_yaml_str(&yaml, "dev").unwrap();
    let upload = config.upload.unwrap();
    assert_eq!(
        upload.target,
        UploadTarget::PresignedUrl {
            url: "https://s3.example.com/obj?sig=abc".to_string()
        }
    );
    assert_eq!(upload.prefix, "ise-reports/");
}

#[test]
fn test_disabled_upload_is_ignored() {
    let yaml = format!("{MINIMAL}upload:\n  enabled: false\n");
    let config = ExportConfig::from_yaml_str(&yaml, "dev").unwrap();
    assert!(config.upload.is_none());
}

#[test]
fn test_invalid_timing_rejected() {
    let yaml = format!("{MINIMAL}timing:\n  exit_attempts: 0\n");
    let err = ExportConfig::from_yaml_str(&yaml, "dev").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "timing.exit_attempts"));

    let yaml = format!("{MINIMAL}timing:\n  report_poll_interval_secs: 0\n");
    let err = ExportConfig::from_yaml_str(&yaml, "dev").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));

    let yaml =
        format!("{MINIMAL}timing:\n  report_poll_interval_secs: 60\n  report_max_wait_secs: 30\n");
    let err = ExportConfig::from_yaml_str(&yaml, "dev").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "timing.report_max_wait_secs"));
}

#[test]
fn test_unknown_fields_rejected() {
    let yaml = format!("{MINIMAL}menu:\n  report_optoin: \"16\"\n");
    let err = ExportConfig::from_yaml_str(&yaml, "dev").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_invalid_regex_rejected() {
    let yaml = format!("{MINIMAL}menu:\n  banner: \"re:([\"\n");
    let err = ExportConfig::from_yaml_str(&yaml, "dev").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_resolve_path() {
    let dir = Path::new("/etc/ise-export");
    assert_eq!(
        ExportConfig::resolve_path(dir, Some("prod")).unwrap(),
        PathBuf::from("/etc/ise-export/config.prod.yaml")
    );
    assert_eq!(
        ExportConfig::resolve_path(dir, None).unwrap(),
        PathBuf::from("/etc/ise-export/config.yaml")
    );
    assert!(ExportConfig::resolve_path(dir, Some("../secrets")).is_err());
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.staging.yaml");
    std::fs::write(&path, MINIMAL).unwrap();

    let config = ExportConfig::load(&path, "staging").await.unwrap();
    assert_eq!(config.environment, "staging");

    let err = ExportConfig::load(&dir.path().join("config.prod.yaml"), "prod")
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}
