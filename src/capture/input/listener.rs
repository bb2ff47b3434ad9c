//! OS input hook
//!
//! `rdev::listen` blocks its thread for the life of the process and cannot be
//! cancelled, so the listener thread is detached and installed once per
//! process through [`InputRoute`](super::route::InputRoute). Button and wheel
//! events carry no coordinates; they are stamped with the last reported
//! pointer position.

use crate::capture::input::types::{MouseButton, NamedKey, RawInputEvent, RawKey};
use crate::recorder::channel::{RecordingError, RecordingResult};
use rdev::{Button, Event, EventType, Key};

/// Spawn the detached listener thread, forwarding every translated event.
pub fn spawn_listener<F>(mut on_event: F) -> RecordingResult<()>
where
    F: FnMut(RawInputEvent) + Send + 'static,
{
    std::thread::Builder::new()
        .name("input-listener".to_string())
        .spawn(move || {
            tracing::info!("Input listener started");
            let mut last_position = (0.0, 0.0);
            let result = rdev::listen(move |event: Event| {
                if let Some(raw) = translate(&event, &mut last_position) {
                    on_event(raw);
                }
            });
            if let Err(e) = result {
                tracing::error!("Input listener failed: {:?}", e);
            }
        })
        .map_err(|e| RecordingError::PlatformError(format!("Failed to spawn input listener: {}", e)))?;
    Ok(())
}

/// Map one hook event; `last_position` is updated by pointer moves.
pub fn translate(event: &Event, last_position: &mut (f64, f64)) -> Option<RawInputEvent> {
    let (x, y) = *last_position;
    match event.event_type {
        EventType::MouseMove { x, y } => {
            *last_position = (x, y);
            Some(RawInputEvent::PointerMoved { x, y })
        }
        EventType::ButtonPress(button) => Some(RawInputEvent::Click {
            button: mouse_button(button),
            pressed: true,
            x,
            y,
            time: event.time,
        }),
        EventType::ButtonRelease(button) => Some(RawInputEvent::Click {
            button: mouse_button(button),
            pressed: false,
            x,
            y,
            time: event.time,
        }),
        EventType::Wheel { delta_x, delta_y } => Some(RawInputEvent::Scroll {
            dx: delta_x,
            dy: delta_y,
            x,
            y,
            time: event.time,
        }),
        EventType::KeyPress(key) => Some(RawInputEvent::Key {
            key: raw_key(key, event.name.as_deref()),
            time: event.time,
        }),
        EventType::KeyRelease(_) => None,
    }
}

fn mouse_button(button: Button) -> MouseButton {
    match button {
        Button::Left => MouseButton::Left,
        Button::Right => MouseButton::Right,
        Button::Middle => MouseButton::Middle,
        Button::Unknown(code) => MouseButton::Other(code),
    }
}

/// Named keys win over the produced text; otherwise the first produced
/// character is used, which may be a control byte for modifier chords.
fn raw_key(key: Key, produced: Option<&str>) -> RawKey {
    if let Some(named) = named_key(key) {
        return RawKey::Named(named);
    }
    match produced.and_then(|text| text.chars().next()) {
        Some(c) => RawKey::Char(c),
        None => RawKey::Named(NamedKey::Other(format!("{:?}", key))),
    }
}

fn named_key(key: Key) -> Option<NamedKey> {
    let named = match key {
        Key::ShiftLeft | Key::ShiftRight => NamedKey::Shift,
        Key::ControlLeft | Key::ControlRight => NamedKey::Ctrl,
        Key::Alt => NamedKey::Alt,
        Key::AltGr => NamedKey::AltGr,
        Key::MetaLeft | Key::MetaRight => NamedKey::Cmd,
        Key::Function => NamedKey::Function,
        Key::Escape => NamedKey::Esc,
        Key::Delete => NamedKey::Delete,
        Key::Backspace => NamedKey::Backspace,
        Key::Return | Key::KpReturn => NamedKey::Enter,
        Key::Tab => NamedKey::Tab,
        Key::Space => NamedKey::Space,
        Key::CapsLock => NamedKey::CapsLock,
        Key::Insert => NamedKey::Insert,
        Key::Home => NamedKey::Home,
        Key::End => NamedKey::End,
        Key::PageUp => NamedKey::PageUp,
        Key::PageDown => NamedKey::PageDown,
        Key::UpArrow => NamedKey::Up,
        Key::DownArrow => NamedKey::Down,
        Key::LeftArrow => NamedKey::Left,
        Key::RightArrow => NamedKey::Right,
        Key::PrintScreen => NamedKey::PrintScreen,
        Key::ScrollLock => NamedKey::ScrollLock,
        Key::Pause => NamedKey::Pause,
        Key::NumLock => NamedKey::NumLock,
        Key::F1 => NamedKey::F(1),
        Key::F2 => NamedKey::F(2),
        Key::F3 => NamedKey::F(3),
        Key::F4 => NamedKey::F(4),
        Key::F5 => NamedKey::F(5),
        Key::F6 => NamedKey::F(6),
        Key::F7 => NamedKey::F(7),
        Key::F8 => NamedKey::F(8),
        Key::F9 => NamedKey::F(9),
        Key::F10 => NamedKey::F(10),
        Key::F11 => NamedKey::F(11),
        Key::F12 => NamedKey::F(12),
        _ => return None,
    };
    Some(named)
}
