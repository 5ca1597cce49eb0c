// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Playback engine for compiled macros
//!
//! Runs a program on its own task, tapping buttons and sleeping through
//! delays. Cancellation is cooperative: the flag and the session's
//! connection are checked before every action, so a delay already in
//! progress always runs to completion.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::session::Session;
use crate::types::{Action, PlaybackConfig, Program};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Cancelled,
    Finished,
}

impl RunStatus {
    pub fn is_done(self) -> bool {
        matches!(self, RunStatus::Cancelled | RunStatus::Finished)
    }
}

struct PlaybackEngine {
    session: Session,
    // Connection the run was started on
    generation: u64,
    config: PlaybackConfig,
    running: Arc<AtomicBool>,
}

impl PlaybackEngine {
    fn should_continue(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn execute_action(&self, action: &Action) {
        match action {
            Action::Press(button) => {
                self.session
                    .tap(self.generation, *button, self.config.tap_hold)
                    .await;
            }
            Action::Delay(duration) => {
                sleep(*duration).await;
            }
        }
    }

    async fn execute(&self, program: Program) -> RunStatus {
        for (step, action) in program.actions.iter().enumerate() {
            if !self.should_continue() {
                info!(step, "script cancelled");
                return RunStatus::Cancelled;
            }
            if !self.session.is_connected_on(self.generation).await {
                info!(step, "session disconnected, stopping script");
                return RunStatus::Cancelled;
            }

            debug!(step, %action, "executing");
            self.execute_action(action).await;
        }

        info!(actions = program.len(), "script finished");
        RunStatus::Finished
    }
}

/// One in-flight execution of a program.
pub struct ScriptRun {
    running: Arc<AtomicBool>,
    status: watch::Receiver<RunStatus>,
    task: JoinHandle<()>,
}

impl ScriptRun {
    pub(crate) fn start(
        program: Program,
        session: Session,
        generation: u64,
        config: PlaybackConfig,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let (status_tx, status) = watch::channel(RunStatus::Pending);

        let engine = PlaybackEngine {
            session,
            generation,
            config,
            running: running.clone(),
        };

        let task = tokio::spawn(async move {
            status_tx.send_replace(RunStatus::Running);
            let outcome = engine.execute(program).await;
            status_tx.send_replace(outcome);
        });

        Self {
            running,
            status,
            task,
        }
    }

    /// Takes effect at the next action boundary.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn status(&self) -> RunStatus {
        let status = *self.status.borrow();
        // A task that died without reporting is not running
        if !status.is_done() && self.task.is_finished() {
            RunStatus::Cancelled
        } else {
            status
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status().is_done()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.clone()
    }
}

/// Resolves once the run behind `status` has stopped.
pub async fn wait_for_completion(mut status: watch::Receiver<RunStatus>) -> RunStatus {
    match status.wait_for(|s| s.is_done()).await {
        Ok(done) => *done,
        Err(_) => RunStatus::Cancelled,
    }
}
