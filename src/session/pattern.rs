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

//! Expected-output patterns.
//!
//! A pattern is written in configuration as a plain string. Plain strings match
//! as substrings; a `re:` prefix compiles the remainder as a regular expression.

use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::fmt;

const REGEX_PREFIX: &str = "re:";

#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Parse a configured pattern string.
    pub fn parse(spec: &str) -> Result<Self, regex::Error> {
        match spec.strip_prefix(REGEX_PREFIX) {
            Some(expr) => Ok(Self::Regex(Regex::new(expr)?)),
            None => Ok(Self::Literal(spec.to_string())),
        }
    }

    /// Byte range of the first match in `haystack`.
    pub fn find(&self, haystack: &str) -> Option<(usize, usize)> {
        match self {
            Pattern::Literal(text) => {
                if text.is_empty() {
                    return None;
                }
                haystack
                    .find(text.as_str())
                    .map(|start| (start, start + text.len()))
            }
            Pattern::Regex(re) => re.find(haystack).map(|m| (m.start(), m.end())),
        }
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.find(haystack).is_some()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Pattern::Literal(text) => text.is_empty(),
            Pattern::Regex(re) => re.as_str().is_empty(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => f.write_str(text),
            Pattern::Regex(re) => write!(f, "{REGEX_PREFIX}{}", re.as_str()),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let spec = String::deserialize(deserializer)?;
        Pattern::parse(&spec).map_err(serde::de::Error::custom)
    }
}
