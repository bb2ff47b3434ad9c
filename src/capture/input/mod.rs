//! Input tracking (mouse, keyboard)
//!
//! Implements a `RecordingChannel` that listens to the OS input hooks and
//! feeds clicks, scrolls and key presses through the coalescers.

pub mod channel;
pub mod dispatcher;
pub mod listener;
pub mod pointer;
pub mod route;
pub mod types;

pub use channel::InputTrackingChannel;
pub use dispatcher::InputDispatcher;
pub use pointer::PointerTracker;
pub use route::InputRoute;
pub use types::{MouseButton, NamedKey, RawInputEvent, RawKey};
