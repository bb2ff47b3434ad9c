use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// One low-level event from the OS input hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInputEvent {
    Click {
        button: MouseButton,
        pressed: bool,
        x: f64,
        y: f64,
        time: SystemTime,
    },
    Scroll {
        dx: i64,
        dy: i64,
        x: f64,
        y: f64,
        time: SystemTime,
    },
    Key {
        key: RawKey,
        time: SystemTime,
    },
    /// Only used to keep the pointer position current
    PointerMoved { x: f64, y: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

impl MouseButton {
    pub fn name(&self) -> String {
        match self {
            MouseButton::Left => "left".to_string(),
            MouseButton::Right => "right".to_string(),
            MouseButton::Middle => "middle".to_string(),
            MouseButton::Other(code) => format!("button{}", code),
        }
    }

    /// Label stored in the record, e.g. `left.press`
    pub fn label(&self, pressed: bool) -> String {
        format!("{}.{}", self.name(), if pressed { "press" } else { "release" })
    }
}

/// A key as reported by the hook, before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKey {
    /// The character the key produced, possibly a control byte
    Char(char),
    Named(NamedKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedKey {
    Shift,
    Ctrl,
    Alt,
    AltGr,
    Cmd,
    Function,
    Esc,
    Delete,
    Backspace,
    Enter,
    Tab,
    Space,
    CapsLock,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    PrintScreen,
    ScrollLock,
    Pause,
    NumLock,
    F(u8),
    /// Anything else, carrying the platform's own name for it
    Other(String),
}
