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

//! Export artifact naming.

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use std::fmt::{self, Write as _};

use crate::error::ConfigError;

/// The report file the appliance generates for a given run date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: String,
    date: NaiveDate,
}

impl Artifact {
    /// Name the artifact by substituting `{date}` in `pattern`.
    pub fn for_date(pattern: &str, date_format: &str, date: NaiveDate) -> Result<Self, ConfigError> {
        if !is_valid_date_format(date_format) {
            return Err(ConfigError::invalid(
                "relay.date_format",
                format!("'{date_format}' is not a valid strftime format"),
            ));
        }

        let mut formatted = String::new();
        write!(formatted, "{}", date.format(date_format)).map_err(|_| {
            ConfigError::invalid("relay.date_format", format!("cannot format date with '{date_format}'"))
        })?;

        Ok(Self {
            name: pattern.replace("{date}", &formatted),
            date,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub(crate) fn is_valid_date_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
