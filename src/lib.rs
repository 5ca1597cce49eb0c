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

//! padcast: drive an emulated game controller interactively or from
//! timed macro scripts.

pub mod device;
pub mod error;
pub mod parser;
pub mod runner;
pub mod session;
pub mod shell;
pub mod simulated;
pub mod state;
pub mod types;
pub mod vocabulary;

pub use device::{DeviceConnector, DeviceLink, DeviceTransport, OpenRequest};
pub use error::{CompileError, DeviceError, SessionError};
pub use parser::compile;
pub use runner::RunStatus;
pub use session::{ConnectionStatus, ScriptStart, Session};
pub use simulated::SimulatedDevice;
pub use state::{ControllerState, StatusSnapshot};
pub use types::{Action, Axis, Button, ControllerKind, PlaybackConfig, Program, Stick};
pub use vocabulary::CommandVocabulary;
