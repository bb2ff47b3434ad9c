//! Event coalescing
//!
//! Turns the raw input stream into discrete logical actions: scroll bursts
//! and typing bursts are accumulated and flushed as one action each, clicks
//! pass straight through.

pub mod keymap;
pub mod keystroke;
pub mod scroll;
pub mod timer;

pub use keymap::canonical_symbol;
pub use keystroke::KeystrokeCoalescer;
pub use scroll::{ScrollAccumulator, ScrollWatchdog};
pub use timer::FlushTimer;

use image::RgbaImage;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A screen image captured ahead of the action that will reference it
pub type Frame = Arc<RgbaImage>;

/// What a finished logical action describes
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Click { button: String, x: f64, y: f64 },
    Scroll { dx: i64, dy: i64, x: f64, y: f64 },
    KeyPress { keys: String },
}

/// A coalesced action that still needs its window probe and screenshot
#[derive(Debug, Clone)]
pub struct PendingAction {
    /// Epoch seconds
    pub timestamp: f64,
    pub kind: ActionKind,
    /// Screen state at the start of the burst; `None` means capture now
    pub frame: Option<Frame>,
}

/// Downstream of the coalescers.
///
/// The production sink probes the foreground app, stores the screenshot and
/// hands the action to the event recorder.
pub trait ActionSink: Send + Sync {
    /// Capture the screen now, for use when the burst is flushed later
    fn capture_frame(&self) -> Option<Frame>;

    fn emit(&self, action: PendingAction);
}

pub fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

pub fn now_epoch_seconds() -> f64 {
    epoch_seconds(SystemTime::now())
}
