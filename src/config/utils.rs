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

//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Expand a leading `~` in a path to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if path_str == "~" || path_str.starts_with("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(path_str.replacen('~', &home, 1));
            }
        }
    }
    path.to_path_buf()
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR`. Unset variables are left in place and their
/// names are returned alongside the expanded text, so callers can treat a
/// setting that depends on an unset variable as missing.
pub fn expand_env_vars(input: &str) -> (String, Vec<String>) {
    let mut output = String::with_capacity(input.len());
    let mut unresolved = Vec::new();
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        output.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed, original) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_var_name(&braced[..end]) => {
                    (&braced[..end], end + 2, &rest[pos..pos + end + 3])
                }
                _ => {
                    output.push('$');
                    rest = after;
                    continue;
                }
            }
        } else {
            let len = after
                .char_indices()
                .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
                .map(|(i, _)| i)
                .unwrap_or(after.len());
            if len == 0 {
                output.push('$');
                rest = after;
                continue;
            }
            (&after[..len], len, &rest[pos..pos + len + 1])
        };

        match std::env::var(name) {
            Ok(value) => output.push_str(&value),
            Err(_) => {
                tracing::debug!("Environment variable {} not set", name);
                unresolved.push(name.to_string());
                output.push_str(original);
            }
        }
        rest = &after[consumed..];
    }

    output.push_str(rest);
    (output, unresolved)
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Environment names select a file on disk, so only a safe character set is allowed.
pub fn is_valid_environment_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
