//! # pedalmap
//!
//! Turn Linux evdev input devices (foot pedals, mice, keyboards) into a
//! programmable macro engine: button events are matched against a pattern
//! configuration and fire shell commands.
//!
//! ## Features
//!
//! - Multi-device: bind several devices, their buttons share one numbering
//! - Sequence patterns with press/release polarity (`1v,2v,2^`) and
//!   optional time limits (`1,2,3 < 0.5`)
//! - Usage accounting: a held modifier press stays live across matches, and
//!   the bare `N` shorthand fires only for an otherwise-unused cycle
//! - Exclusive device grab by default, `[shared]` to opt out
//! - Wheel and other relative-axis events bindable as auto-released buttons
//!
//! ## Configuration
//!
//! ```text
//! dev: /dev/input/event7 [256,257,258]
//! dev: /dev/input/event3 [EV_REL/REL_WHEEL=1, EV_REL/REL_WHEEL=-1] [shared]
//!
//! 1v,2: xdotool key space      # press 2 while holding 1
//! 1: xdotool key F5            # tap 1 on its own
//! 1,2,3 < 0.5: notify-send run
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use pedalmap::{ButtonEvent, Config, Matcher};
//! use std::time::Instant;
//!
//! let config = Config::parse("1v,2: echo combo\n1: echo tap\n", "inline").unwrap();
//! let mut matcher = Matcher::new(&config, |cmd: &str| println!("would run: {cmd}"));
//!
//! let t = Instant::now();
//! matcher.handle(ButtonEvent::down(1, t));
//! matcher.handle(ButtonEvent::down(2, t));
//! matcher.handle(ButtonEvent::up(2, t)); // "would run: echo combo"
//! ```
//!
//! The binary wires [`device::open_all`] to a [`Matcher`] over a
//! [`ShellSink`]; see `main.rs`.
//!
//! ## Permissions
//!
//! Reading `/dev/input` requires membership in the `input` group:
//! ```bash
//! sudo usermod -aG input $USER
//! # Then log out and back in
//! ```

pub mod config;
pub mod device;
pub mod ecodes;
pub mod error;
pub mod event;
pub mod history;
pub mod matcher;
pub mod sink;
pub mod state;

// Re-exports
pub use config::{ActionFilter, Config, DeviceBinding, EventCodeSpec, PatternElement, Rule};
pub use device::{open_all, DeviceSetHandle};
pub use error::{Error, Result};
pub use event::{Action, Button, ButtonEvent};
pub use history::{History, HistoryEntry};
pub use matcher::{Matcher, DEFAULT_HISTORY_CAP};
pub use sink::{CommandSink, ShellSink};
pub use state::PedalState;

#[cfg(not(target_os = "linux"))]
compile_error!("pedalmap only supports Linux (evdev)");
