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

//! Core types for padcast controller sessions and macro programs

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Every button identifier any supported controller can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Y,
    X,
    B,
    A,
    R,
    Zr,
    Minus,
    Plus,
    RStick,
    LStick,
    Home,
    Capture,
    Down,
    Up,
    Right,
    Left,
    L,
    Zl,
    Sr,
    Sl,
}

impl Button {
    pub const ALL: [Button; 20] = [
        Button::Y,
        Button::X,
        Button::B,
        Button::A,
        Button::R,
        Button::Zr,
        Button::Minus,
        Button::Plus,
        Button::RStick,
        Button::LStick,
        Button::Home,
        Button::Capture,
        Button::Down,
        Button::Up,
        Button::Right,
        Button::Left,
        Button::L,
        Button::Zl,
        Button::Sr,
        Button::Sl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Button::Y => "y",
            Button::X => "x",
            Button::B => "b",
            Button::A => "a",
            Button::R => "r",
            Button::Zr => "zr",
            Button::Minus => "minus",
            Button::Plus => "plus",
            Button::RStick => "r_stick",
            Button::LStick => "l_stick",
            Button::Home => "home",
            Button::Capture => "capture",
            Button::Down => "down",
            Button::Up => "up",
            Button::Right => "right",
            Button::Left => "left",
            Button::L => "l",
            Button::Zl => "zl",
            Button::Sr => "sr",
            Button::Sl => "sl",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIdentifier(pub String);

impl fmt::Display for UnknownIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown identifier '{}'", self.0)
    }
}

impl std::error::Error for UnknownIdentifier {}

impl FromStr for Button {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Button::ALL
            .into_iter()
            .find(|b| b.name() == lowered)
            .ok_or(UnknownIdentifier(lowered))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stick {
    Left,
    Right,
}

impl FromStr for Stick {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "ls" | "left" | "l_stick" => Ok(Stick::Left),
            "r" | "rs" | "right" | "r_stick" => Ok(Stick::Right),
            other => Err(UnknownIdentifier(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

impl FromStr for Axis {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" | "x_axis" | "h" => Ok(Axis::X),
            "y" | "y_axis" | "v" => Ok(Axis::Y),
            other => Err(UnknownIdentifier(other.to_string())),
        }
    }
}

/// The kind of controller a session emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerKind {
    JoyconL,
    JoyconR,
    ProController,
}

impl ControllerKind {
    pub fn name(self) -> &'static str {
        match self {
            ControllerKind::JoyconL => "JOYCON_L",
            ControllerKind::JoyconR => "JOYCON_R",
            ControllerKind::ProController => "PRO_CONTROLLER",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControllerKind {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "joycon_l" => Ok(ControllerKind::JoyconL),
            "joycon_r" => Ok(ControllerKind::JoyconR),
            "pro_controller" | "pro" => Ok(ControllerKind::ProController),
            other => Err(UnknownIdentifier(other.to_string())),
        }
    }
}

/// One primitive step of a compiled macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Press then release
    Press(Button),
    Delay(Duration),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Press(button) => write!(f, "press {button}"),
            Action::Delay(d) => write!(f, "wait {}ms", d.as_millis()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unrecognized,
    // Known button, but not on this controller
    Unavailable(Button),
    UnmatchedNext,
}

/// A script line that was reported and dropped during compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: usize,
    pub text: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            SkipReason::Unrecognized => {
                write!(f, "line {}: command '{}' not found", self.line, self.text)
            }
            SkipReason::Unavailable(button) => write!(
                f,
                "line {}: button '{}' is not available on this controller",
                self.line, button
            ),
            SkipReason::UnmatchedNext => {
                write!(f, "line {}: 'next' without a matching 'for'", self.line)
            }
        }
    }
}

/// A fully expanded macro, ready to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub actions: Vec<Action>,
    pub skipped: Vec<SkippedLine>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    // Time a tap holds its button before releasing
    pub tap_hold: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tap_hold: Duration::from_millis(100),
        }
    }
}
