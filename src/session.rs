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

//! Controller session
//!
//! Owns the connection lifecycle (Disconnected -> Connecting -> Connected)
//! and the controller state. Every operation that touches the device is a
//! silent no-op unless the session is connected to a live transport.
//!
//! Interactive calls and a running script share the same state without
//! any ordering between them beyond the point where the script is
//! suspended.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, MutexGuard};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::device::{DeviceConnector, DeviceTransport, OpenRequest};
use crate::error::{CompileError, SessionError};
use crate::parser::compile;
use crate::runner::{RunStatus, ScriptRun, wait_for_completion};
use crate::state::{ControllerState, StatusSnapshot};
use crate::types::{Axis, Button, ControllerKind, PlaybackConfig, Stick};
use crate::vocabulary::CommandVocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Outcome of a `run_script` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStart {
    Started,
    AlreadyRunning,
    NotConnected,
}

struct Connection {
    transport: Box<dyn DeviceTransport>,
    vocabulary: CommandVocabulary,
    state: ControllerState,
    peer: String,
    generation: u64,
}

impl Connection {
    async fn push(&self) {
        if let Err(e) = self.transport.push_state(&self.state).await {
            warn!(peer = %self.peer, error = %e, "state push failed");
        }
    }
}

enum Link {
    Disconnected,
    // Holds the attempt number so a superseded attempt can tell
    Connecting(u64),
    Connected(Connection),
}

struct Shared {
    connector: Arc<dyn DeviceConnector>,
    config: PlaybackConfig,
    link: tokio::sync::Mutex<Link>,
    run: Mutex<Option<ScriptRun>>,
    attempts: AtomicU64,
}

/// Handle to one emulated controller. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    pub fn new(connector: Arc<dyn DeviceConnector>, config: PlaybackConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                link: tokio::sync::Mutex::new(Link::Disconnected),
                run: Mutex::new(None),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    fn cancel_active_run(&self) {
        if let Some(run) = self.shared.run.lock().as_ref() {
            run.cancel();
        }
    }

    // Locks the live connection, demoting the session if the link has died
    async fn connection(&self) -> Option<MappedMutexGuard<'_, Connection>> {
        let mut link = self.shared.link.lock().await;

        let lost = match &*link {
            Link::Connected(conn) if !conn.transport.is_live() => Some(conn.peer.clone()),
            _ => None,
        };
        if let Some(peer) = lost {
            warn!(%peer, "device link lost, marking session disconnected");
            *link = Link::Disconnected;
            self.cancel_active_run();
            return None;
        }

        MutexGuard::try_map(link, |link| match link {
            Link::Connected(conn) => Some(conn),
            _ => None,
        })
        .ok()
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        if self.connection().await.is_some() {
            return ConnectionStatus::Connected;
        }
        match *self.shared.link.lock().await {
            Link::Connecting(_) => ConnectionStatus::Connecting,
            _ => ConnectionStatus::Disconnected,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection().await.is_some()
    }

    // Like `connection`, but only for the link a script run started on
    async fn connection_on(&self, generation: u64) -> Option<MappedMutexGuard<'_, Connection>> {
        self.connection()
            .await
            .filter(|conn| conn.generation == generation)
    }

    pub(crate) async fn is_connected_on(&self, generation: u64) -> bool {
        self.connection_on(generation).await.is_some()
    }

    pub async fn vocabulary(&self) -> Option<CommandVocabulary> {
        self.connection().await.map(|conn| conn.vocabulary.clone())
    }

    /// Opens a device link, replacing any existing one.
    ///
    /// Returns the address of the connected peer.
    pub async fn connect(
        &self,
        kind: ControllerKind,
        reconnect_address: Option<String>,
        firmware: Option<Vec<u8>>,
    ) -> Result<String, SessionError> {
        self.disconnect().await;

        let attempt = self.shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.link.lock().await = Link::Connecting(attempt);
        info!(%kind, reconnect = ?reconnect_address, "connecting");

        let opened = self
            .shared
            .connector
            .open(OpenRequest {
                kind,
                reconnect_address,
                firmware,
            })
            .await;

        let mut link = self.shared.link.lock().await;
        if !matches!(*link, Link::Connecting(a) if a == attempt) {
            if let Ok(device) = opened {
                if let Err(e) = device.transport.close().await {
                    warn!(error = %e, "error closing superseded transport");
                }
            }
            return Err(SessionError::ConnectAborted);
        }

        let device = match opened {
            Ok(device) => device,
            Err(e) => {
                warn!(error = %e, "connection failed");
                *link = Link::Disconnected;
                return Err(e.into());
            }
        };

        let peer = match device.transport.peer_address() {
            Ok(peer) => peer,
            Err(e) => {
                warn!(error = %e, "link dropped during negotiation");
                *link = Link::Disconnected;
                return Err(e.into());
            }
        };

        info!(%peer, %kind, "connected");
        *link = Link::Connected(Connection {
            transport: device.transport,
            vocabulary: device.vocabulary,
            state: device.initial_state,
            peer: peer.clone(),
            generation: attempt,
        });

        Ok(peer)
    }

    /// Closes the link and stops any running script.
    pub async fn disconnect(&self) {
        self.cancel_active_run();

        let previous = std::mem::replace(&mut *self.shared.link.lock().await, Link::Disconnected);
        if let Link::Connected(conn) = previous {
            if conn.transport.is_live() {
                if let Err(e) = conn.transport.close().await {
                    warn!(peer = %conn.peer, error = %e, "error closing transport");
                }
            }
            info!(peer = %conn.peer, "disconnected");
        }
    }

    pub async fn get_status(&self) -> StatusSnapshot {
        match self.connection().await {
            Some(conn) => StatusSnapshot::connected(&conn.peer, &conn.state),
            None => StatusSnapshot::disconnected(),
        }
    }

    async fn set_button(&self, button: Button, pushed: bool) {
        let Some(conn) = self.connection().await else {
            debug!(%button, "not connected, ignoring button");
            return;
        };
        Self::apply_button(conn, button, pushed).await;
    }

    async fn apply_button(mut conn: MappedMutexGuard<'_, Connection>, button: Button, pushed: bool) {
        if !conn.state.set_button(button, pushed) {
            debug!(%button, "button not on this controller, ignoring");
            return;
        }
        conn.push().await;
    }

    pub async fn press_button(&self, name: &str) {
        match name.parse::<Button>() {
            Ok(button) => self.set_button(button, true).await,
            Err(e) => debug!(error = %e, "ignoring press"),
        }
    }

    pub async fn release_button(&self, name: &str) {
        match name.parse::<Button>() {
            Ok(button) => self.set_button(button, false).await,
            Err(e) => debug!(error = %e, "ignoring release"),
        }
    }

    /// Press, hold, release, on the connection `generation` only.
    pub(crate) async fn tap(&self, generation: u64, button: Button, hold: Duration) {
        for (pushed, hold) in [(true, hold), (false, Duration::ZERO)] {
            let Some(conn) = self.connection_on(generation).await else {
                debug!(%button, "run's connection is gone, ignoring tap");
                return;
            };
            Self::apply_button(conn, button, pushed).await;
            if !hold.is_zero() {
                sleep(hold).await;
            }
        }
    }

    pub async fn set_stick_axis(&self, stick: Stick, axis: Axis, value: i64) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let Some(position) = conn.state.stick_mut(stick) else {
            debug!(?stick, "stick not on this controller, ignoring");
            return;
        };
        position.set_axis(axis, value);
        conn.push().await;
    }

    pub async fn center_stick(&self, stick: Stick) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let Some(position) = conn.state.stick_mut(stick) else {
            debug!(?stick, "stick not on this controller, ignoring");
            return;
        };
        position.set_center();
        conn.push().await;
    }

    /// Sets or clears the NFC tag. Clearing an absent tag sends nothing.
    pub async fn set_nfc_data(&self, data: Option<Vec<u8>>) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        if conn.state.nfc.is_none() && data.is_none() {
            return;
        }
        conn.state.nfc = data;
        conn.push().await;
    }

    /// Compiles `source` and starts running it on a background task.
    ///
    /// Does nothing if a script is already running or there is no device.
    /// A script that fails to compile is not run at all.
    pub async fn run_script(&self, source: &str) -> Result<ScriptStart, CompileError> {
        if self.script_status() {
            info!("script already running");
            return Ok(ScriptStart::AlreadyRunning);
        }

        let Some((vocabulary, generation)) = self
            .connection()
            .await
            .map(|conn| (conn.vocabulary.clone(), conn.generation))
        else {
            info!("not connected, script not started");
            return Ok(ScriptStart::NotConnected);
        };

        let program =
            compile(source, &vocabulary).inspect_err(|e| warn!(error = %e, "script rejected"))?;

        let mut slot = self.shared.run.lock();
        if slot.as_ref().is_some_and(ScriptRun::is_active) {
            return Ok(ScriptStart::AlreadyRunning);
        }

        info!(
            actions = program.len(),
            skipped = program.skipped.len(),
            "starting script"
        );
        *slot = Some(ScriptRun::start(
            program,
            self.clone(),
            generation,
            self.shared.config.clone(),
        ));
        Ok(ScriptStart::Started)
    }

    pub fn cancel_script(&self) {
        self.cancel_active_run();
    }

    /// True while a script is running and not finished.
    pub fn script_status(&self) -> bool {
        self.shared
            .run
            .lock()
            .as_ref()
            .is_some_and(ScriptRun::is_active)
    }

    /// Waits for the current script, if any, to stop.
    pub async fn wait_script(&self) -> Option<RunStatus> {
        let status = self.shared.run.lock().as_ref().map(ScriptRun::subscribe)?;
        Some(wait_for_completion(status).await)
    }
}
