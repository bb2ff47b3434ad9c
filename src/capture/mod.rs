//! Platform-facing capture
//!
//! Input hooks, screen capture, the foreground-app probe and the periodic
//! screenshot channel.

pub mod input;
pub mod periodic;
pub mod screen;
pub mod window;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

pub use input::InputTrackingChannel;
pub use periodic::PeriodicScreenshotChannel;
pub use screen::{PrimaryScreen, ScreenSource};
pub use window::{SystemWindowProbe, WindowProbe, UNKNOWN_APP};

/// Whether the process may capture the screen
pub fn has_screen_recording_permission() -> bool {
    #[cfg(target_os = "macos")]
    {
        macos::has_screen_recording_permission()
    }

    #[cfg(target_os = "windows")]
    {
        windows::has_screen_recording_permission()
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        true
    }
}

/// Trigger the OS permission prompt where one exists
pub fn request_screen_recording_permission() -> bool {
    #[cfg(target_os = "macos")]
    {
        macos::request_screen_recording_permission()
    }

    #[cfg(target_os = "windows")]
    {
        windows::request_screen_recording_permission()
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        true
    }
}
