//! Pedal state tracking.
//!
//! Tracks which buttons are currently held. The matcher updates this before
//! rule scanning for each incoming event and consults it for the release-pop
//! decision and for history trimming (a held button's `Down` entry must stay
//! live to anchor future combination matches).

use crate::event::{Action, Button};
use std::collections::BTreeMap;
use std::fmt;

/// Current pressed/released state of every known button.
#[derive(Debug, Clone, Default)]
pub struct PedalState {
    states: BTreeMap<Button, bool>,
}

impl PedalState {
    /// Create a state with no known buttons.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state tracking buttons `1..=count`, all released.
    pub fn with_buttons(count: u32) -> Self {
        Self {
            states: (1..=count).map(|b| (b, false)).collect(),
        }
    }

    /// Is this button one we track?
    pub fn is_known(&self, button: Button) -> bool {
        self.states.contains_key(&button)
    }

    /// Is the button currently held?
    pub fn is_pressed(&self, button: Button) -> bool {
        self.states.get(&button).copied().unwrap_or(false)
    }

    /// Record a press or release.
    pub fn update(&mut self, button: Button, action: Action) {
        self.states.insert(button, action == Action::Down);
    }
}

impl fmt::Display for PedalState {
    /// Format: `B1:+ B2:-` where `+` means pressed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (button, pressed) in &self.states {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "B{}:{}", button, if *pressed { '+' } else { '-' })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_buttons_all_released() {
        let state = PedalState::with_buttons(3);
        for b in 1..=3 {
            assert!(state.is_known(b));
            assert!(!state.is_pressed(b));
        }
        assert!(!state.is_known(4));
    }

    #[test]
    fn test_update() {
        let mut state = PedalState::with_buttons(2);
        state.update(1, Action::Down);
        assert!(state.is_pressed(1));
        assert!(!state.is_pressed(2));

        state.update(1, Action::Up);
        assert!(!state.is_pressed(1));
    }

    #[test]
    fn test_display() {
        let mut state = PedalState::with_buttons(3);
        state.update(2, Action::Down);
        assert_eq!(state.to_string(), "B1:- B2:+ B3:-");
    }
}
