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

use std::fmt;

/// Position of the appliance shell in the configuration menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    /// Root prompt not (or no longer) confirmed
    Disconnected,
    /// At the admin shell prompt
    AtRootPrompt,
    /// Configuration menu banner seen
    InConfigMenu,
    /// Report option sent
    ReportRequested,
    /// Appliance confirmed the report started
    ReportRunning,
    /// Completion marker seen
    ReportComplete,
}

impl fmt::Display for MenuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MenuState::Disconnected => "disconnected",
            MenuState::AtRootPrompt => "at root prompt",
            MenuState::InConfigMenu => "in configuration menu",
            MenuState::ReportRequested => "report requested",
            MenuState::ReportRunning => "report running",
            MenuState::ReportComplete => "report complete",
        };
        f.write_str(name)
    }
}
