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

//! Controller input state and status snapshots

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{Axis, Button, ControllerKind, Stick};
use crate::vocabulary::CommandVocabulary;

// Stick axes are 12-bit
pub const STICK_MAX: u16 = 0x0FFF;
pub const STICK_CENTER: u16 = 0x0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickPosition {
    pub h: u16,
    pub v: u16,
}

impl Default for StickPosition {
    fn default() -> Self {
        Self {
            h: STICK_CENTER,
            v: STICK_CENTER,
        }
    }
}

impl StickPosition {
    pub fn is_center(&self) -> bool {
        self.h == STICK_CENTER && self.v == STICK_CENTER
    }

    pub fn set_center(&mut self) {
        *self = Self::default();
    }

    /// Sets one axis, clamping into the 12-bit range.
    pub fn set_axis(&mut self, axis: Axis, value: i64) {
        let clamped = value.clamp(0, i64::from(STICK_MAX));
        if clamped != value {
            warn!(value, clamped, "stick value out of range");
        }
        // clamped fits in 12 bits
        let clamped = clamped as u16;
        match axis {
            Axis::X => self.h = clamped,
            Axis::Y => self.v = clamped,
        }
    }
}

/// Everything pushed to the device on each update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub kind: ControllerKind,
    pub buttons: BTreeMap<Button, bool>,
    pub left_stick: Option<StickPosition>,
    pub right_stick: Option<StickPosition>,
    pub nfc: Option<Vec<u8>>,
}

impl ControllerState {
    pub fn new(kind: ControllerKind, vocabulary: &CommandVocabulary) -> Self {
        Self {
            kind,
            buttons: vocabulary.buttons().map(|b| (b, false)).collect(),
            left_stick: vocabulary
                .has_stick(Stick::Left)
                .then(StickPosition::default),
            right_stick: vocabulary
                .has_stick(Stick::Right)
                .then(StickPosition::default),
            nfc: None,
        }
    }

    /// Returns false if the controller has no such button.
    pub fn set_button(&mut self, button: Button, pushed: bool) -> bool {
        match self.buttons.get_mut(&button) {
            Some(state) => {
                *state = pushed;
                true
            }
            None => false,
        }
    }

    pub fn button(&self, button: Button) -> bool {
        self.buttons.get(&button).copied().unwrap_or(false)
    }

    pub fn stick_mut(&mut self, stick: Stick) -> Option<&mut StickPosition> {
        match stick {
            Stick::Left => self.left_stick.as_mut(),
            Stick::Right => self.right_stick.as_mut(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StickStatus {
    pub x_axis: u16,
    pub y_axis: u16,
    pub is_center: bool,
}

impl From<&StickPosition> for StickStatus {
    fn from(stick: &StickPosition) -> Self {
        Self {
            x_axis: stick.h,
            y_axis: stick.v,
            is_center: stick.is_center(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub peer: String,
    pub controller_type: ControllerKind,
    pub buttons: BTreeMap<Button, bool>,
    pub nfc_active: bool,
    pub left_stick: Option<StickStatus>,
    pub right_stick: Option<StickStatus>,
}

/// Read-only copy of a session, as reported to callers.
///
/// Serializes to `{"connected": false}` when there is no live device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    #[serde(flatten)]
    pub device: Option<DeviceStatus>,
}

impl StatusSnapshot {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            device: None,
        }
    }

    pub fn connected(peer: &str, state: &ControllerState) -> Self {
        Self {
            connected: true,
            device: Some(DeviceStatus {
                peer: peer.to_string(),
                controller_type: state.kind,
                buttons: state.buttons.clone(),
                nfc_active: state.nfc.is_some(),
                left_stick: state.left_stick.as_ref().map(StickStatus::from),
                right_stick: state.right_stick.as_ref().map(StickStatus::from),
            }),
        }
    }
}
