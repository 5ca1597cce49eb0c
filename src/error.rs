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

//! Error types

use thiserror::Error;

/// Script problems that make the whole macro unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Line {line}: 'for' block is never closed with 'next'")]
    UnterminatedLoop { line: usize },

    #[error("Line {line}: invalid loop count in '{text}'")]
    InvalidLoopCount { line: usize, text: String },

    #[error("Expanded program exceeds {limit} actions")]
    ProgramTooLarge { limit: usize },
}

/// Failures reported by the device transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Firmware image must be {expected} bytes, got {actual}")]
    InvalidFirmware { expected: usize, actual: usize },

    #[error("Device link lost")]
    LinkLost,

    #[error("Transport closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Connection failed: {0}")]
    Connection(#[from] DeviceError),

    #[error("Connection attempt was superseded by a disconnect")]
    ConnectAborted,
}
