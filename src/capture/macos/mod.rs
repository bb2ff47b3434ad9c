//! macOS platform hooks
//!
//! Screen-recording permission checks go through CoreGraphics; the frontmost
//! application comes from NSWorkspace.

use objc2_app_kit::NSWorkspace;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGPreflightScreenCaptureAccess() -> bool;
    fn CGRequestScreenCaptureAccess() -> bool;
}

pub fn has_screen_recording_permission() -> bool {
    unsafe { CGPreflightScreenCaptureAccess() }
}

/// Show the OS prompt. Returns whether access is granted right now.
pub fn request_screen_recording_permission() -> bool {
    unsafe { CGRequestScreenCaptureAccess() }
}

/// Localized name of the frontmost application
pub fn frontmost_app_name() -> Option<String> {
    unsafe {
        let workspace = NSWorkspace::sharedWorkspace();
        let app = workspace.frontmostApplication()?;
        let name = app.localizedName()?;
        Some(name.to_string())
    }
}
