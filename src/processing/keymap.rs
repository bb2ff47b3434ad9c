//! Canonical key symbols
//!
//! One table shared by the keystroke coalescer and the screenshot annotator.
//! The fallback rule for characters is: printable passthrough, then the
//! modifier-chord label for control bytes the platform produces for
//! `<primary modifier>+<letter>`, then a `U+XXXX` escape.

use crate::capture::input::types::{NamedKey, RawKey};

#[cfg(target_os = "macos")]
const PRIMARY_MODIFIER: &str = "Cmd";

#[cfg(not(target_os = "macos"))]
const PRIMARY_MODIFIER: &str = "Ctrl";

/// Translate a raw key into its canonical symbol.
pub fn canonical_symbol(raw: &RawKey) -> String {
    match raw {
        RawKey::Char(c) => canonical_char(*c),
        RawKey::Named(named) => named_symbol(named),
    }
}

fn canonical_char(c: char) -> String {
    if c.is_ascii_graphic() || (!c.is_ascii() && !c.is_control() && !c.is_whitespace()) {
        return c.to_string();
    }
    if let Some(label) = control_chord(c) {
        return label;
    }
    format!("U+{:04X}", c as u32)
}

/// Control bytes 0x01..=0x1A are what the hook reports for a primary-modifier
/// chord with the letters A..Z.
fn control_chord(c: char) -> Option<String> {
    match c as u32 {
        0x01..=0x1A => {
            let letter = (b'A' + (c as u8 - 1)) as char;
            Some(format!("{}+{}", PRIMARY_MODIFIER, letter))
        }
        0x1B => Some("esc".to_string()),
        0x7F => Some("delete".to_string()),
        _ => None,
    }
}

fn named_symbol(named: &NamedKey) -> String {
    let name = match named {
        NamedKey::Shift => "shift",
        NamedKey::Ctrl => "ctrl",
        NamedKey::Alt => "alt",
        NamedKey::AltGr => "alt_gr",
        NamedKey::Cmd => "cmd",
        NamedKey::Function => "fn",
        NamedKey::Esc => "esc",
        NamedKey::Delete => "delete",
        NamedKey::Backspace => "backspace",
        NamedKey::Enter => "enter",
        NamedKey::Tab => "tab",
        NamedKey::Space => "space",
        NamedKey::CapsLock => "caps_lock",
        NamedKey::Insert => "insert",
        NamedKey::Home => "home",
        NamedKey::End => "end",
        NamedKey::PageUp => "page_up",
        NamedKey::PageDown => "page_down",
        NamedKey::Up => "up",
        NamedKey::Down => "down",
        NamedKey::Left => "left",
        NamedKey::Right => "right",
        NamedKey::PrintScreen => "print_screen",
        NamedKey::ScrollLock => "scroll_lock",
        NamedKey::Pause => "pause",
        NamedKey::NumLock => "num_lock",
        NamedKey::F(n) => return format!("f{}", n),
        NamedKey::Other(raw) => return normalize_other(raw),
    };
    name.to_string()
}

/// `ShiftLeft` -> `shift_left`, `Unknown(42)` -> `unknown_42`
fn normalize_other(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
            prev_lower = false;
        }
    }
    let trimmed = out.trim_end_matches('_').to_string();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed
    }
}
