//! Symbolic evdev event type and code names.
//!
//! Configuration files may spell event codes either numerically or by their
//! kernel mnemonic (`EV_REL`, `REL_WHEEL`, `BTN_LEFT`, ...). This module
//! resolves the mnemonics; numeric forms are handled by the parser directly.

/// Synchronization events (ignored by the device layer).
pub const EV_SYN: u16 = 0x00;
/// Key and button events.
pub const EV_KEY: u16 = 0x01;
/// Relative axis events (wheels, mouse motion).
pub const EV_REL: u16 = 0x02;
/// Absolute axis events.
pub const EV_ABS: u16 = 0x03;
/// Miscellaneous events (ignored by the device layer).
pub const EV_MSC: u16 = 0x04;

/// Resolve an event type mnemonic.
pub fn event_type_by_name(name: &str) -> Option<u16> {
    match name {
        "EV_SYN" => Some(EV_SYN),
        "EV_KEY" => Some(EV_KEY),
        "EV_REL" => Some(EV_REL),
        "EV_ABS" => Some(EV_ABS),
        "EV_MSC" => Some(EV_MSC),
        _ => None,
    }
}

/// Resolve an event code mnemonic.
///
/// Covers the codes seen on the devices this tool targets: generic buttons
/// (`BTN_0`..), mouse buttons, relative axes, and a handful of keyboard keys.
/// Anything else can be written numerically.
pub fn code_by_name(name: &str) -> Option<u16> {
    let code = match name {
        // Generic buttons (footpedals commonly report these)
        "BTN_0" => 0x100,
        "BTN_1" => 0x101,
        "BTN_2" => 0x102,
        "BTN_3" => 0x103,
        "BTN_4" => 0x104,
        "BTN_5" => 0x105,
        "BTN_6" => 0x106,
        "BTN_7" => 0x107,
        "BTN_8" => 0x108,
        "BTN_9" => 0x109,

        // Mouse buttons
        "BTN_LEFT" => 0x110,
        "BTN_RIGHT" => 0x111,
        "BTN_MIDDLE" => 0x112,
        "BTN_SIDE" => 0x113,
        "BTN_EXTRA" => 0x114,
        "BTN_FORWARD" => 0x115,
        "BTN_BACK" => 0x116,
        "BTN_TASK" => 0x117,

        // Relative axes
        "REL_X" => 0x00,
        "REL_Y" => 0x01,
        "REL_Z" => 0x02,
        "REL_HWHEEL" => 0x06,
        "REL_DIAL" => 0x07,
        "REL_WHEEL" => 0x08,

        // Keyboard keys
        "KEY_ESC" => 1,
        "KEY_TAB" => 15,
        "KEY_ENTER" => 28,
        "KEY_LEFTCTRL" => 29,
        "KEY_LEFTSHIFT" => 42,
        "KEY_LEFTALT" => 56,
        "KEY_SPACE" => 57,
        "KEY_CAPSLOCK" => 58,
        "KEY_F1" => 59,
        "KEY_F2" => 60,
        "KEY_F3" => 61,
        "KEY_F4" => 62,
        "KEY_F5" => 63,
        "KEY_F6" => 64,
        "KEY_F7" => 65,
        "KEY_F8" => 66,
        "KEY_F9" => 67,
        "KEY_F10" => 68,
        "KEY_F11" => 87,
        "KEY_F12" => 88,
        "KEY_MUTE" => 113,
        "KEY_VOLUMEDOWN" => 114,
        "KEY_VOLUMEUP" => 115,
        "KEY_NEXTSONG" => 163,
        "KEY_PLAYPAUSE" => 164,
        "KEY_PREVIOUSSONG" => 165,

        _ => return None,
    };
    Some(code)
}
