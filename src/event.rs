//! Button event types.
//!
//! The device layer flattens all configured devices into a single 1-based
//! button namespace and delivers [`ButtonEvent`]s into the matcher. Events
//! carry the timestamp assigned at read time; the matcher never consults the
//! clock itself, so identical event streams produce identical results.

use std::fmt;
use std::time::Instant;

/// Global button identifier, 1-based.
///
/// Assigned by flattening device bindings in config order, then event-code
/// specs in listed order. The pattern engine treats it as opaque.
pub type Button = u32;

/// Press or release of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// The button was pressed.
    Down,
    /// The button was released.
    Up,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Down => write!(f, "pressed"),
            Action::Up => write!(f, "released"),
        }
    }
}

/// A single normalized input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    /// Which button.
    pub button: Button,
    /// Press or release.
    pub action: Action,
    /// When the device layer read the event.
    pub t: Instant,
}

impl ButtonEvent {
    /// Create an event.
    pub fn new(button: Button, action: Action, t: Instant) -> Self {
        Self { button, action, t }
    }

    /// Create a press event.
    pub fn down(button: Button, t: Instant) -> Self {
        Self::new(button, Action::Down, t)
    }

    /// Create a release event.
    pub fn up(button: Button, t: Instant) -> Self {
        Self::new(button, Action::Up, t)
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{} {}", self.button, self.action)
    }
}
