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

//! Interactive control console
//!
//! Reads one command per line from stdin and applies it to a session.

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::session::{ScriptStart, Session};
use crate::state::{StatusSnapshot, StickStatus};
use crate::types::{Axis, ControllerKind, Stick, UnknownIdentifier};

const HELP: &str = "\
connect [KIND] [ADDR]     connect (pro-controller, joycon-l, joycon-r)
disconnect                drop the connection
status                    show controller state
press BUTTON              hold a button down
release BUTTON            let a button go
stick l|r x|y VALUE       move one stick axis (0-4095)
center l|r                center a stick
nfc FILE | nfc clear      load or remove an NFC tag dump
run FILE                  run a macro script in the background
cancel                    stop the running script
script                    show whether a script is running
quit                      disconnect and exit";

#[derive(Error, Debug, PartialEq)]
pub enum ShellParseError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Identifier(#[from] UnknownIdentifier),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Connect {
        kind: Option<ControllerKind>,
        reconnect: Option<String>,
    },
    Disconnect,
    Status,
    Press(String),
    Release(String),
    Stick { stick: Stick, axis: Axis, value: i64 },
    Center(Stick),
    Nfc(Option<PathBuf>),
    Run(PathBuf),
    Cancel,
    Script,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = ShellParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Err(ShellParseError::Unknown(String::new()));
        };
        let args: Vec<&str> = words.collect();

        let command = match (keyword.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("connect", [rest @ ..]) if rest.len() <= 2 => ShellCommand::Connect {
                kind: rest.first().map(|k| k.parse()).transpose()?,
                reconnect: rest.get(1).map(|a| a.to_string()),
            },
            ("connect", _) => return Err(ShellParseError::Usage("connect [KIND] [ADDR]")),
            ("disconnect", []) => ShellCommand::Disconnect,
            ("status", []) => ShellCommand::Status,
            ("press", [button]) => ShellCommand::Press(button.to_string()),
            ("press", _) => return Err(ShellParseError::Usage("press BUTTON")),
            ("release", [button]) => ShellCommand::Release(button.to_string()),
            ("release", _) => return Err(ShellParseError::Usage("release BUTTON")),
            ("stick", [stick, axis, value]) => ShellCommand::Stick {
                stick: stick.parse()?,
                axis: axis.parse()?,
                value: value
                    .parse()
                    .map_err(|_| ShellParseError::Usage("stick l|r x|y VALUE"))?,
            },
            ("stick", _) => return Err(ShellParseError::Usage("stick l|r x|y VALUE")),
            ("center", [stick]) => ShellCommand::Center(stick.parse()?),
            ("center", _) => return Err(ShellParseError::Usage("center l|r")),
            ("nfc", ["clear"]) => ShellCommand::Nfc(None),
            ("nfc", [path]) => ShellCommand::Nfc(Some(PathBuf::from(path))),
            ("nfc", _) => return Err(ShellParseError::Usage("nfc FILE | nfc clear")),
            ("run", [path]) => ShellCommand::Run(PathBuf::from(path)),
            ("run", _) => return Err(ShellParseError::Usage("run FILE")),
            ("cancel", []) => ShellCommand::Cancel,
            ("script", []) => ShellCommand::Script,
            ("help" | "?", _) => ShellCommand::Help,
            ("quit" | "exit", _) => ShellCommand::Quit,
            _ => return Err(ShellParseError::Unknown(line.trim().to_string())),
        };
        Ok(command)
    }
}

/// Defaults used by `connect` and at startup.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub kind: ControllerKind,
    pub reconnect: Option<String>,
    pub firmware: Option<Vec<u8>>,
}

fn render_stick(name: &str, stick: Option<&StickStatus>) -> String {
    match stick {
        Some(s) if s.is_center => format!("{name}: centered"),
        Some(s) => format!("{name}: x={} y={}", s.x_axis, s.y_axis),
        None => format!("{name}: -"),
    }
}

pub fn render_status(status: &StatusSnapshot) -> String {
    let Some(device) = &status.device else {
        return format!("{}", "disconnected".red());
    };

    let pressed: Vec<_> = device
        .buttons
        .iter()
        .filter(|(_, pushed)| **pushed)
        .map(|(b, _)| b.name())
        .collect();

    format!(
        "{} {} {}\n  pressed: {}\n  {}\n  {}\n  nfc: {}",
        "connected".green(),
        device.controller_type.to_string().bold(),
        device.peer,
        if pressed.is_empty() {
            "none".to_string()
        } else {
            pressed.join(" ")
        },
        render_stick("left stick", device.left_stick.as_ref()),
        render_stick("right stick", device.right_stick.as_ref()),
        if device.nfc_active { "tag present" } else { "none" },
    )
}

pub enum Flow {
    Continue,
    Quit,
}

pub async fn execute(
    session: &Session,
    defaults: &ConnectOptions,
    command: ShellCommand,
) -> Result<Flow> {
    match command {
        ShellCommand::Connect { kind, reconnect } => {
            let kind = kind.unwrap_or(defaults.kind);
            let reconnect = reconnect.or_else(|| defaults.reconnect.clone());
            let peer = session
                .connect(kind, reconnect, defaults.firmware.clone())
                .await?;
            println!("{} {peer}", "connected to".green());
        }
        ShellCommand::Disconnect => session.disconnect().await,
        ShellCommand::Status => println!("{}", render_status(&session.get_status().await)),
        ShellCommand::Press(button) => session.press_button(&button).await,
        ShellCommand::Release(button) => session.release_button(&button).await,
        ShellCommand::Stick { stick, axis, value } => {
            session.set_stick_axis(stick, axis, value).await
        }
        ShellCommand::Center(stick) => session.center_stick(stick).await,
        ShellCommand::Nfc(path) => {
            let data = match path {
                Some(path) => Some(
                    tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("Failed to read NFC dump {}", path.display()))?,
                ),
                None => None,
            };
            session.set_nfc_data(data).await;
        }
        ShellCommand::Run(path) => {
            let source = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read script {}", path.display()))?;
            match session.run_script(&source).await? {
                ScriptStart::Started => println!("script started"),
                ScriptStart::AlreadyRunning => println!("{}", "a script is already running".yellow()),
                ScriptStart::NotConnected => println!("{}", "not connected".yellow()),
            }
        }
        ShellCommand::Cancel => session.cancel_script(),
        ShellCommand::Script => println!(
            "{}",
            if session.script_status() { "running" } else { "idle" }
        ),
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn prompt() {
    print!("padcast> ");
    let _ = std::io::stdout().flush();
}

pub async fn run_shell(session: Session, defaults: ConnectOptions) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            match line.parse::<ShellCommand>() {
                Ok(command) => match execute(&session, &defaults, command).await {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => eprintln!("{} {e:#}", "error:".red()),
                },
                Err(e) => eprintln!("{} {e}", "error:".red()),
            }
        }
        prompt();
    }

    session.disconnect().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ControllerState;
    use crate::vocabulary::CommandVocabulary;

    #[test]
    fn test_parse_connect() {
        assert_eq!(
            "connect".parse::<ShellCommand>(),
            Ok(ShellCommand::Connect {
                kind: None,
                reconnect: None
            })
        );
        assert_eq!(
            "connect joycon-r 98:B6:E9:00:00:01".parse::<ShellCommand>(),
            Ok(ShellCommand::Connect {
                kind: Some(ControllerKind::JoyconR),
                reconnect: Some("98:B6:E9:00:00:01".to_string()),
            })
        );
        assert!("connect gamecube".parse::<ShellCommand>().is_err());
    }

    #[test]
    fn test_parse_stick() {
        assert_eq!(
            "stick l x 4095".parse::<ShellCommand>(),
            Ok(ShellCommand::Stick {
                stick: Stick::Left,
                axis: Axis::X,
                value: 4095
            })
        );
        assert_eq!(
            "stick l x far".parse::<ShellCommand>(),
            Err(ShellParseError::Usage("stick l|r x|y VALUE"))
        );
    }

    #[test]
    fn test_parse_nfc() {
        assert_eq!("nfc clear".parse::<ShellCommand>(), Ok(ShellCommand::Nfc(None)));
        assert_eq!(
            "nfc amiibo.bin".parse::<ShellCommand>(),
            Ok(ShellCommand::Nfc(Some(PathBuf::from("amiibo.bin"))))
        );
    }

    #[test]
    fn test_parse_unknown_and_usage() {
        assert_eq!(
            "jump".parse::<ShellCommand>(),
            Err(ShellParseError::Unknown("jump".to_string()))
        );
        assert_eq!(
            "press".parse::<ShellCommand>(),
            Err(ShellParseError::Usage("press BUTTON"))
        );
        assert_eq!("QUIT".parse::<ShellCommand>(), Ok(ShellCommand::Quit));
    }

    #[test]
    fn test_render_status_lists_pressed_buttons() {
        let kind = ControllerKind::ProController;
        let mut state = ControllerState::new(kind, &CommandVocabulary::for_controller(kind));
        state.buttons.insert(crate::types::Button::A, true);
        let rendered = render_status(&StatusSnapshot::connected("AA:BB", &state));
        assert!(rendered.contains("pressed: a"));
        assert!(rendered.contains("left stick: centered"));
        assert!(rendered.contains("AA:BB"));
    }
}
