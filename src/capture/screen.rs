//! Full-screen capture of the primary display

use crate::recorder::channel::{RecordingError, RecordingResult};
use image::RgbaImage;
use xcap::Monitor;

/// Where screenshots come from
pub trait ScreenSource: Send + Sync {
    fn capture(&self) -> RecordingResult<RgbaImage>;

    /// Screen extent in the coordinate space pointer events are reported in
    fn extent(&self) -> (f64, f64);
}

/// The first monitor reported by the OS
#[derive(Debug, Default)]
pub struct PrimaryScreen;

impl PrimaryScreen {
    fn monitor() -> RecordingResult<Monitor> {
        Monitor::all()
            .map_err(|e| RecordingError::CaptureError(format!("Failed to enumerate monitors: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| RecordingError::CaptureError("No monitors found".to_string()))
    }
}

impl ScreenSource for PrimaryScreen {
    fn capture(&self) -> RecordingResult<RgbaImage> {
        let image = Self::monitor()?
            .capture_image()
            .map_err(|e| RecordingError::CaptureError(format!("Failed to capture screen: {}", e)))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(RecordingError::CaptureError(
                "Captured empty screenshot; screen recording permission may be missing".to_string(),
            ));
        }
        Ok(image)
    }

    fn extent(&self) -> (f64, f64) {
        match rdev::display_size() {
            Ok((w, h)) => (w as f64, h as f64),
            Err(e) => {
                tracing::warn!("Failed to query display size: {:?}", e);
                Self::monitor()
                    .map(|m| (m.width() as f64, m.height() as f64))
                    .unwrap_or((0.0, 0.0))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Solid-color screen that counts captures
    pub struct FakeScreen {
        pub width: u32,
        pub height: u32,
        pub captures: Mutex<usize>,
        pub fail: bool,
    }

    impl FakeScreen {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                captures: Mutex::new(0),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(0, 0)
            }
        }
    }

    impl ScreenSource for FakeScreen {
        fn capture(&self) -> RecordingResult<RgbaImage> {
            if self.fail {
                return Err(RecordingError::CaptureError("no display".to_string()));
            }
            *self.captures.lock() += 1;
            Ok(RgbaImage::from_pixel(
                self.width,
                self.height,
                image::Rgba([30, 60, 90, 255]),
            ))
        }

        fn extent(&self) -> (f64, f64) {
            (self.width as f64, self.height as f64)
        }
    }
}
