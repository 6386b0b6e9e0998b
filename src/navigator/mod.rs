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

//! Menu navigation state machine.
//!
//! ```text
//! Disconnected -> AtRootPrompt -> InConfigMenu -> ReportRequested
//!     -> ReportRunning -> ReportComplete -> AtRootPrompt
//! ```
//!
//! Every transition records exactly one step in the run report. A transition
//! invoked from the wrong state fails with a navigation error. Losing the
//! connection in any state moves the navigator to `Disconnected`.

mod state;

pub use state::MenuState;

use tokio::time::Instant;

use crate::config::{MenuConfig, TimingConfig};
use crate::error::{ExportError, SessionError};
use crate::report::{PendingStep, Reporter, Step, StepRecord};
use crate::session::{Pattern, Session, ShellTransport};

pub struct MenuNavigator<'a, T: ShellTransport> {
    session: &'a mut Session<T>,
    menu: &'a MenuConfig,
    timing: &'a TimingConfig,
    reporter: &'a mut Reporter,
    state: MenuState,
}

impl<'a, T: ShellTransport> MenuNavigator<'a, T> {
    /// Start navigating a freshly connected session.
    pub fn new(
        session: &'a mut Session<T>,
        menu: &'a MenuConfig,
        timing: &'a TimingConfig,
        reporter: &'a mut Reporter,
    ) -> Self {
        Self {
            session,
            menu,
            timing,
            reporter,
            state: MenuState::Disconnected,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    /// Drive the whole menu sequence, ending back at the root prompt.
    pub async fn generate_export(&mut self) -> Result<(), ExportError> {
        self.await_root_prompt().await?;
        self.prepare_shell().await?;
        self.enter_config_menu().await?;
        self.request_report().await?;
        self.await_report().await?;
        self.exit_menu().await
    }

    /// `Disconnected -> AtRootPrompt`
    pub async fn await_root_prompt(&mut self) -> Result<(), ExportError> {
        self.require(MenuState::Disconnected, Step::AwaitRootPrompt)?;
        let menu = self.menu;

        let pending = StepRecord::begin(Step::AwaitRootPrompt).expected(&menu.root_prompt);
        match self
            .session
            .expect(&menu.root_prompt, self.timing.prompt_timeout())
            .await
        {
            Ok(_) => {
                self.transition(MenuState::AtRootPrompt);
                self.reporter.record(pending.succeed("root prompt received"));
                Ok(())
            }
            Err(e) => Err(self.fail(pending, e, &menu.root_prompt)),
        }
    }

    /// Run the configured setup commands at the root prompt.
    pub async fn prepare_shell(&mut self) -> Result<(), ExportError> {
        let menu = self.menu;
        for command in &menu.setup_commands {
            self.require(MenuState::AtRootPrompt, Step::ShellSetup)?;
            let pending = StepRecord::begin(Step::ShellSetup)
                .sent(command.as_str())
                .expected(&menu.root_prompt);

            if let Err(e) = self.session.send_line(command).await {
                return Err(self.fail(pending, e, &menu.root_prompt));
            }
            match self
                .session
                .expect(&menu.root_prompt, self.timing.prompt_timeout())
                .await
            {
                Ok(_) => self
                    .reporter
                    .record(pending.succeed(format!("'{command}' accepted"))),
                Err(e) => return Err(self.fail(pending, e, &menu.root_prompt)),
            }
        }
        Ok(())
    }

    /// `AtRootPrompt -> InConfigMenu`. Never retried.
    pub async fn enter_config_menu(&mut self) -> Result<(), ExportError> {
        self.require(MenuState::AtRootPrompt, Step::EnterMenu)?;
        let menu = self.menu;

        let pending = StepRecord::begin(Step::EnterMenu)
            .sent(menu.entry_command.as_str())
            .expected(&menu.banner);

        if let Err(e) = self.session.send_line(&menu.entry_command).await {
            return Err(self.fail(pending, e, &menu.banner));
        }
        match self
            .session
            .expect(&menu.banner, self.timing.banner_timeout())
            .await
        {
            Ok(_) => {
                self.transition(MenuState::InConfigMenu);
                self.reporter.record(pending.succeed("configuration menu opened"));
                Ok(())
            }
            Err(e) => Err(self.fail(pending, e, &menu.banner)),
        }
    }

    /// `InConfigMenu -> ReportRequested -> ReportRunning`
    pub async fn request_report(&mut self) -> Result<(), ExportError> {
        self.require(MenuState::InConfigMenu, Step::RequestReport)?;
        let menu = self.menu;

        let pending = StepRecord::begin(Step::RequestReport)
            .sent(menu.report_option.as_str())
            .expected(&menu.report_started);

        if let Err(e) = self.session.send_line(&menu.report_option).await {
            return Err(self.fail(pending, e, &menu.report_started));
        }
        self.transition(MenuState::ReportRequested);

        match self
            .session
            .expect(&menu.report_started, self.timing.prompt_timeout())
            .await
        {
            Ok(_) => {
                self.transition(MenuState::ReportRunning);
                self.reporter.record(pending.succeed("report generation started"));
                Ok(())
            }
            Err(e) => Err(self.fail(pending, e, &menu.report_started)),
        }
    }

    /// `ReportRunning -> ReportComplete`
    ///
    /// Polls for the completion marker every poll interval. Each poll waits
    /// for the interval or the remaining budget, whichever is shorter, so the
    /// total wait never exceeds the configured maximum.
    pub async fn await_report(&mut self) -> Result<(), ExportError> {
        self.require(MenuState::ReportRunning, Step::AwaitReport)?;
        let menu = self.menu;
        let interval = self.timing.report_poll_interval();
        let max_wait = self.timing.report_max_wait();

        let pending = StepRecord::begin(Step::AwaitReport).expected(&menu.report_completed);
        let started = pending.started();
        let mut polls: u32 = 0;

        loop {
            let elapsed = started.elapsed();
            if elapsed >= max_wait {
                let error = ExportError::ReportTimeout {
                    max_wait,
                    polls,
                    context: self.session.context(Some(&menu.report_completed), started),
                };
                self.reporter.record(pending.fail(&error));
                return Err(error);
            }

            let wait = interval.min(max_wait - elapsed);
            polls += 1;

            match self.session.expect(&menu.report_completed, wait).await {
                Ok(_) => {
                    self.transition(MenuState::ReportComplete);
                    let detail = format!(
                        "report completed after {} poll(s), {:.0}s",
                        polls,
                        started.elapsed().as_secs_f64()
                    );
                    self.reporter.record(pending.succeed(detail));
                    return Ok(());
                }
                Err(SessionError::Timeout { .. }) => {
                    tracing::debug!(
                        "Report still running (poll {}, {:.0}s elapsed)",
                        polls,
                        started.elapsed().as_secs_f64()
                    );
                }
                Err(e) => return Err(self.fail(pending, e, &menu.report_completed)),
            }
        }
    }

    /// `ReportComplete -> AtRootPrompt`
    ///
    /// The only retried transition: the exit option is re-sent until the root
    /// prompt appears, at most `exit_attempts` times in total.
    ///
    /// A resent exit option can reach the root shell after a late prompt. Its
    /// reply is consumed here so the next command only sees its own output.
    pub async fn exit_menu(&mut self) -> Result<(), ExportError> {
        self.require(MenuState::ReportComplete, Step::ExitMenu)?;
        let menu = self.menu;
        let attempts = self.timing.exit_attempts;

        let pending = StepRecord::begin(Step::ExitMenu)
            .sent(menu.exit_option.as_str())
            .expected(&menu.root_prompt);

        for attempt in 1..=attempts {
            if let Err(e) = self.session.send_line(&menu.exit_option).await {
                return Err(self.fail(pending, e, &menu.root_prompt));
            }
            match self
                .session
                .expect(&menu.root_prompt, self.timing.prompt_timeout())
                .await
            {
                Ok(_) => {
                    self.transition(MenuState::AtRootPrompt);
                    let settled = match self.settle_extra_exits(attempt - 1).await {
                        Ok(settled) => settled,
                        Err(e) => return Err(self.fail(pending, e, &menu.root_prompt)),
                    };
                    let detail = if settled > 0 {
                        format!(
                            "returned to root prompt after {attempt} attempt(s), {settled} late reply(ies) discarded"
                        )
                    } else {
                        format!("returned to root prompt after {attempt} attempt(s)")
                    };
                    self.reporter.record(pending.succeed(detail));
                    return Ok(());
                }
                Err(SessionError::Timeout { .. }) => {
                    tracing::warn!(
                        "Root prompt not seen after exit attempt {}/{}",
                        attempt,
                        attempts
                    );
                }
                Err(e) => return Err(self.fail(pending, e, &menu.root_prompt)),
            }
        }

        let error = ExportError::Navigation {
            step: Step::ExitMenu,
            reason: format!("root prompt not seen after {attempts} exit attempt(s)"),
            context: self
                .session
                .context(Some(&menu.root_prompt), pending.started()),
        };
        self.reporter.record(pending.fail(&error));
        Err(error)
    }

    /// Wait for the root shell's reply to each of `extra` exit options sent
    /// before the prompt came back. Stops at the first reply that does not
    /// arrive within the prompt timeout.
    async fn settle_extra_exits(&mut self, extra: u32) -> Result<u32, SessionError> {
        let menu = self.menu;
        let mut settled = 0;
        for _ in 0..extra {
            match self
                .session
                .expect(&menu.root_prompt, self.timing.prompt_timeout())
                .await
            {
                Ok(reply) => {
                    tracing::debug!("Discarding reply to extra exit option: {:?}", reply);
                    settled += 1;
                }
                Err(SessionError::Timeout { .. }) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(settled)
    }

    fn transition(&mut self, next: MenuState) {
        tracing::debug!("Menu state: {} -> {}", self.state, next);
        self.state = next;
    }

    fn require(&mut self, expected: MenuState, step: Step) -> Result<(), ExportError> {
        if self.state == expected {
            return Ok(());
        }
        let error = ExportError::Navigation {
            step,
            reason: format!(
                "{step} requires state '{expected}' but navigator is {}",
                self.state
            ),
            context: self.session.context(None, Instant::now()),
        };
        self.reporter.record(StepRecord::begin(step).fail(&error));
        Err(error)
    }

    /// Classify a session failure, record it and return the run error.
    fn fail(&mut self, pending: PendingStep, error: SessionError, expected: &Pattern) -> ExportError {
        let step = pending.step();
        let context = self.session.context(Some(expected), pending.started());

        let error = match error {
            SessionError::Closed => {
                self.transition(MenuState::Disconnected);
                ExportError::ConnectionLost { step, context }
            }
            SessionError::Transport(reason) => {
                tracing::warn!("Transport failure during {}: {}", step, reason);
                self.transition(MenuState::Disconnected);
                ExportError::ConnectionLost { step, context }
            }
            SessionError::Timeout { pattern, waited } => ExportError::Navigation {
                step,
                reason: format!("'{pattern}' not seen within {}s", waited.as_secs()),
                context,
            },
            SessionError::Connect(reason) => ExportError::Navigation {
                step,
                reason,
                context,
            },
        };

        self.reporter.record(pending.fail(&error));
        error
    }
}
