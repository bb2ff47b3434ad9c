//! Screenshot storage: annotation, size-bounded JPEG encoding and the
//! per-session screenshot store.

pub mod annotate;
pub mod compress;
pub mod glyphs;
pub mod screenshot;

pub use screenshot::{annotated_name, ScreenshotStore};
