//! Foreground application lookup

pub const UNKNOWN_APP: &str = "unknown";

pub trait WindowProbe: Send + Sync {
    /// Name of the foreground application; never fails
    fn current_foreground_app(&self) -> String;
}

/// Queries the OS on every call
#[derive(Debug, Default)]
pub struct SystemWindowProbe;

impl WindowProbe for SystemWindowProbe {
    fn current_foreground_app(&self) -> String {
        match platform_foreground_app() {
            Some(name) => name,
            None => {
                tracing::error!("Failed to determine the foreground application");
                UNKNOWN_APP.to_string()
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn platform_foreground_app() -> Option<String> {
    crate::capture::macos::frontmost_app_name()
}

#[cfg(target_os = "windows")]
fn platform_foreground_app() -> Option<String> {
    crate::capture::windows::foreground_process_name()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_foreground_app() -> Option<String> {
    None
}
