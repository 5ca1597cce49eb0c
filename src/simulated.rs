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

//! In-process loopback device
//!
//! Accepts every link it is asked for and records each pushed state, so
//! scripts can be dry-run and sessions tested without a console.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::device::{DeviceConnector, DeviceLink, DeviceTransport, FLASH_SIZE, OpenRequest};
use crate::error::DeviceError;
use crate::state::ControllerState;
use crate::vocabulary::CommandVocabulary;

#[derive(Default)]
struct Recorder {
    pushes: Mutex<Vec<ControllerState>>,
    link: Mutex<Option<Arc<AtomicBool>>>,
    refuse: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Loopback connector; clones share the same recorded history.
#[derive(Clone, Default)]
pub struct SimulatedDevice {
    recorder: Arc<Recorder>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `open` fail with the given reason.
    pub fn refuse_next(&self, reason: &str) {
        *self.recorder.refuse.lock() = Some(reason.to_string());
    }

    /// Makes every `open` wait until [`SimulatedDevice::release_opens`].
    pub fn hold_opens(&self) {
        *self.recorder.gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release_opens(&self) {
        if let Some(gate) = self.recorder.gate.lock().take() {
            gate.notify_waiters();
            // An open that has not reached the gate yet still gets through
            gate.notify_one();
        }
    }

    /// Severs the current link as if the console went away.
    pub fn drop_link(&self) {
        if let Some(live) = self.recorder.link.lock().as_ref() {
            live.store(false, Ordering::SeqCst);
        }
    }

    pub fn pushes(&self) -> Vec<ControllerState> {
        self.recorder.pushes.lock().clone()
    }

    pub fn push_count(&self) -> usize {
        self.recorder.pushes.lock().len()
    }

    pub fn last_state(&self) -> Option<ControllerState> {
        self.recorder.pushes.lock().last().cloned()
    }

    pub fn opened(&self) -> usize {
        self.recorder.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.recorder.closed.load(Ordering::SeqCst)
    }
}

fn random_address() -> String {
    let mut bytes: [u8; 6] = rand::thread_rng().r#gen();
    // Locally administered, unicast
    bytes[0] = (bytes[0] & 0xFC) | 0x02;
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[async_trait]
impl DeviceConnector for SimulatedDevice {
    async fn open(&self, request: OpenRequest) -> Result<DeviceLink, DeviceError> {
        let gate = self.recorder.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let refused = self.recorder.refuse.lock().take();
        if let Some(reason) = refused {
            return Err(DeviceError::Refused(reason));
        }

        if let Some(firmware) = &request.firmware {
            if firmware.len() != FLASH_SIZE {
                return Err(DeviceError::InvalidFirmware {
                    expected: FLASH_SIZE,
                    actual: firmware.len(),
                });
            }
        }

        let peer = request.reconnect_address.clone().unwrap_or_else(random_address);
        let live = Arc::new(AtomicBool::new(true));
        *self.recorder.link.lock() = Some(live.clone());
        self.recorder.opened.fetch_add(1, Ordering::SeqCst);

        let vocabulary = CommandVocabulary::for_controller(request.kind);
        let initial_state = ControllerState::new(request.kind, &vocabulary);
        info!(%peer, kind = %request.kind, "simulated device linked");

        Ok(DeviceLink {
            transport: Box::new(SimulatedTransport {
                peer,
                live,
                recorder: self.recorder.clone(),
            }),
            vocabulary,
            initial_state,
        })
    }
}

struct SimulatedTransport {
    peer: String,
    live: Arc<AtomicBool>,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl DeviceTransport for SimulatedTransport {
    fn peer_address(&self) -> Result<String, DeviceError> {
        if self.is_live() {
            Ok(self.peer.clone())
        } else {
            Err(DeviceError::LinkLost)
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn push_state(&self, state: &ControllerState) -> Result<(), DeviceError> {
        if !self.is_live() {
            return Err(DeviceError::LinkLost);
        }
        let pressed: Vec<_> = state
            .buttons
            .iter()
            .filter(|(_, pushed)| **pushed)
            .map(|(b, _)| b.name())
            .collect();
        debug!(peer = %self.peer, ?pressed, nfc = state.nfc.is_some(), "push");
        self.recorder.pushes.lock().push(state.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), DeviceError> {
        if !self.live.swap(false, Ordering::SeqCst) {
            return Err(DeviceError::Closed);
        }
        self.recorder.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
