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

//! Device transport seam
//!
//! Pairing, HID framing, flash emulation and NFC encoding all live behind
//! these traits. A session only opens a link, pushes state through it and
//! closes it.

use async_trait::async_trait;

use crate::error::DeviceError;
use crate::state::ControllerState;
use crate::types::ControllerKind;
use crate::vocabulary::CommandVocabulary;

/// Size of an emulated SPI flash image
pub const FLASH_SIZE: usize = 0x80000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub kind: ControllerKind,
    // Resume a previous pairing instead of advertising
    pub reconnect_address: Option<String>,
    // Persisted SPI flash contents, FLASH_SIZE bytes
    pub firmware: Option<Vec<u8>>,
}

/// A freshly negotiated device link.
pub struct DeviceLink {
    pub transport: Box<dyn DeviceTransport>,
    pub vocabulary: CommandVocabulary,
    pub initial_state: ControllerState,
}

/// Opens device links.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn open(&self, request: OpenRequest) -> Result<DeviceLink, DeviceError>;
}

/// A live link to the host console.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Address of the connected peer
    fn peer_address(&self) -> Result<String, DeviceError>;

    /// Check if the link is still up
    fn is_live(&self) -> bool;

    /// Best-effort send of the full controller state
    async fn push_state(&self, state: &ControllerState) -> Result<(), DeviceError>;

    async fn close(&self) -> Result<(), DeviceError>;
}
