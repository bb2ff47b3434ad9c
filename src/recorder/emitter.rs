//! Turns coalesced actions into persisted records
//!
//! Probes the foreground app, stores the screenshot, then hands the finished
//! record to the event recorder. When the screen cannot be captured a blank
//! frame stands in, so the action is kept and still points at a stored file.
//! An action whose screenshot cannot be written at all is dropped.

use crate::capture::input::pointer::PointerTracker;
use crate::capture::window::WindowProbe;
use crate::processing::{ActionKind, ActionSink, Frame, PendingAction};
use crate::recorder::channel::RecordingError;
use crate::recorder::event_log::EventRecorder;
use crate::recorder::record::{ActionContent, ActionRecord, ActionType, ScreenPosition, ScrollDelta};
use crate::storage::ScreenshotStore;
use image::{Rgba, RgbaImage};
use std::sync::Arc;

/// Size of the stand-in frame when the screen reports no usable extent
const BLANK_FALLBACK_SIZE: (u32, u32) = (640, 360);

fn blank_frame(extent: (f64, f64)) -> RgbaImage {
    let (width, height) = if extent.0 >= 1.0 && extent.1 >= 1.0 {
        (extent.0 as u32, extent.1 as u32)
    } else {
        BLANK_FALLBACK_SIZE
    };
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
}

pub struct ActionEmitter {
    probe: Arc<dyn WindowProbe>,
    store: Arc<ScreenshotStore>,
    recorder: Arc<EventRecorder>,
    pointer: Arc<PointerTracker>,
}

impl ActionEmitter {
    pub fn new(
        probe: Arc<dyn WindowProbe>,
        store: Arc<ScreenshotStore>,
        recorder: Arc<EventRecorder>,
        pointer: Arc<PointerTracker>,
    ) -> Self {
        Self {
            probe,
            store,
            recorder,
            pointer,
        }
    }

    fn build_content(kind: &ActionKind, max: (f64, f64), pointer: (f64, f64)) -> (ActionType, ActionContent) {
        let at = |x: f64, y: f64| ScreenPosition {
            x,
            y,
            max_x: max.0,
            max_y: max.1,
        };

        match kind {
            ActionKind::Click { button, x, y } => (
                ActionType::MouseClick,
                ActionContent {
                    position: Some(at(*x, *y)),
                    button: Some(button.clone()),
                    ..Default::default()
                },
            ),
            ActionKind::Scroll { dx, dy, x, y } => (
                ActionType::MouseScroll,
                ActionContent {
                    position: Some(at(*x, *y)),
                    delta: Some(ScrollDelta { dx: *dx, dy: *dy }),
                    ..Default::default()
                },
            ),
            ActionKind::KeyPress { keys } => (
                ActionType::KeyPress,
                ActionContent {
                    position: Some(at(pointer.0, pointer.1)),
                    key: Some(keys.clone()),
                    ..Default::default()
                },
            ),
        }
    }
}

impl ActionSink for ActionEmitter {
    fn capture_frame(&self) -> Option<Frame> {
        match self.store.screen().capture() {
            Ok(image) => Some(Arc::new(image)),
            Err(e) => {
                tracing::warn!("Burst-start capture failed, will capture at flush: {}", e);
                None
            }
        }
    }

    fn emit(&self, action: PendingAction) {
        let extent = self.store.screen().extent();
        let pointer = self.pointer.position();
        let (action_type, content) = Self::build_content(&action.kind, extent, pointer);

        let active_app = self.probe.current_foreground_app();

        let saved = match self.store.save(Some(&content), action.frame.as_deref()) {
            Err(RecordingError::CaptureError(e)) => {
                tracing::error!("Screen capture failed, storing a blank frame: {}", e);
                self.store.save(Some(&content), Some(&blank_frame(extent)))
            }
            other => other,
        };
        let screenshot_path = match saved {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("Dropping {:?} action, screenshot failed: {}", action_type, e);
                return;
            }
        };

        let record = ActionRecord {
            timestamp: action.timestamp,
            action_type,
            action_content: content,
            active_app,
            screenshot_path,
            mouse_position: ScreenPosition {
                x: pointer.0,
                y: pointer.1,
                max_x: extent.0,
                max_y: extent.1,
            },
        };

        if let Err(e) = self.recorder.record(record) {
            tracing::error!("Failed to record action: {}", e);
        }
    }
}
