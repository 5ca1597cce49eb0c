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

//! Identifiers a connected controller accepts
//!
//! The vocabulary is fixed when a session connects and is what the macro
//! compiler validates button statements against.

use std::collections::BTreeSet;

use crate::types::{Button, ControllerKind, Stick};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandVocabulary {
    buttons: BTreeSet<Button>,
    sticks: BTreeSet<Stick>,
}

impl CommandVocabulary {
    pub fn new(
        buttons: impl IntoIterator<Item = Button>,
        sticks: impl IntoIterator<Item = Stick>,
    ) -> Self {
        Self {
            buttons: buttons.into_iter().collect(),
            sticks: sticks.into_iter().collect(),
        }
    }

    pub fn for_controller(kind: ControllerKind) -> Self {
        use Button::*;

        match kind {
            ControllerKind::ProController => Self::new(
                Button::ALL
                    .into_iter()
                    .filter(|b| !matches!(b, Sr | Sl)),
                [Stick::Left, Stick::Right],
            ),
            ControllerKind::JoyconL => Self::new(
                [Minus, LStick, Capture, Down, Up, Right, Left, Sr, Sl, L, Zl],
                [Stick::Left],
            ),
            ControllerKind::JoyconR => Self::new(
                [Y, X, B, A, Sr, Sl, R, Zr, Plus, RStick, Home],
                [Stick::Right],
            ),
        }
    }

    pub fn has_button(&self, button: Button) -> bool {
        self.buttons.contains(&button)
    }

    pub fn has_stick(&self, stick: Stick) -> bool {
        self.sticks.contains(&stick)
    }

    /// Resolves a button name, returning it only if this controller has it.
    pub fn button(&self, name: &str) -> Option<Button> {
        name.parse::<Button>()
            .ok()
            .filter(|b| self.has_button(*b))
    }

    pub fn buttons(&self) -> impl Iterator<Item = Button> + '_ {
        self.buttons.iter().copied()
    }

    pub fn sticks(&self) -> impl Iterator<Item = Stick> + '_ {
        self.sticks.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pro_controller_has_no_side_buttons() {
        let vocab = CommandVocabulary::for_controller(ControllerKind::ProController);
        assert_eq!(vocab.buttons().count(), 18);
        assert!(!vocab.has_button(Button::Sr));
        assert!(vocab.has_stick(Stick::Left) && vocab.has_stick(Stick::Right));
    }

    #[test]
    fn test_joycon_halves() {
        let left = CommandVocabulary::for_controller(ControllerKind::JoyconL);
        let right = CommandVocabulary::for_controller(ControllerKind::JoyconR);

        assert!(left.has_button(Button::Zl));
        assert!(!left.has_button(Button::A));
        assert!(!left.has_stick(Stick::Right));

        assert!(right.has_button(Button::Home));
        assert!(!right.has_button(Button::Capture));
        assert!(!right.has_stick(Stick::Left));
    }

    #[test]
    fn test_button_lookup_respects_controller() {
        let right = CommandVocabulary::for_controller(ControllerKind::JoyconR);
        assert_eq!(right.button("A"), Some(Button::A));
        assert_eq!(right.button("zl"), None);
        assert_eq!(right.button("foo"), None);
    }
}
