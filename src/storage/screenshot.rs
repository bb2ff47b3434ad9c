//! Screenshot persistence
//!
//! Every saved screen produces exactly two JPEGs in the bound session: a
//! plain copy under `screenshots/original/` and an annotated copy under
//! `screenshots/annotated/`. Both are re-encoded until they fit the size
//! budget. Callers get back the plain copy's path relative to the save root.
//!
//! Naming and writing happen under one lock, and each file is renamed into
//! place from a temporary name with the plain copy last. Files therefore
//! appear in `original/` complete and in name order, which the batch
//! uploader's cursor relies on.

use crate::capture::screen::ScreenSource;
use crate::config::ScreenshotConfig;
use crate::recorder::channel::{RecordingError, RecordingResult};
use crate::recorder::record::ActionContent;
use crate::session::Session;
use crate::storage::annotate::annotate;
use crate::storage::compress::{encode_jpeg, JpegBudget};
use ab_glyph::FontVec;
use chrono::Local;
use image::{DynamicImage, RgbaImage};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct ScreenshotStore {
    session: RwLock<Option<Arc<Session>>>,
    screen: Arc<dyn ScreenSource>,
    budget: JpegBudget,
    font: Option<FontVec>,
    font_size: f32,
    sequence: AtomicU64,
    write_lock: Mutex<()>,
}

/// Tried in order when no font is configured
const SYSTEM_FONTS: &[&str] = &[
    "/Library/Fonts/Arial.ttf",
    "/Library/Fonts/Helvetica.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Helvetica.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
];

impl ScreenshotStore {
    pub fn new(screen: Arc<dyn ScreenSource>, config: &ScreenshotConfig) -> Self {
        let font = match config.font_path.as_deref() {
            Some(path) => load_font(path).or_else(system_font),
            None => system_font(),
        };
        Self {
            session: RwLock::new(None),
            screen,
            budget: JpegBudget::from(config),
            font,
            font_size: config.font_size,
            sequence: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    pub fn bind(&self, session: Arc<Session>) {
        *self.session.write() = Some(session);
    }

    pub fn unbind(&self) {
        *self.session.write() = None;
    }

    pub fn screen(&self) -> &Arc<dyn ScreenSource> {
        &self.screen
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Persist `frame`, or a fresh capture when `None`.
    pub fn save(
        &self,
        context: Option<&ActionContent>,
        frame: Option<&RgbaImage>,
    ) -> RecordingResult<String> {
        let session = match self.session.read().clone() {
            Some(session) => session,
            None => {
                tracing::warn!("Screenshot requested with no active session");
                return Err(RecordingError::NoSession);
            }
        };

        let plain = match frame {
            Some(frame) => DynamicImage::ImageRgba8(frame.clone()).into_rgb8(),
            None => DynamicImage::ImageRgba8(self.screen.capture()?).into_rgb8(),
        };

        let mut annotated = plain.clone();
        if let Some(content) = context {
            annotate(&mut annotated, content, self.font.as_ref(), self.font_size);
        }

        let annotated_jpeg = encode_jpeg(&annotated, self.budget)?;
        let plain_jpeg = encode_jpeg(&plain, self.budget)?;

        let _guard = self.write_lock.lock();
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S_%6f");
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let plain_path = session
            .original_dir()
            .join(format!("screenshot_{}_{:06}_no_info.jpg", stamp, seq));
        let annotated_path = session
            .annotated_dir()
            .join(format!("screenshot_{}_{:06}_with_info.jpg", stamp, seq));

        // Annotated first so a plain file never exists without its counterpart.
        write_atomic(&annotated_path, &annotated_jpeg)?;
        write_atomic(&plain_path, &plain_jpeg)?;

        let relative = session.relative_path(&plain_path);
        tracing::debug!("Saved screenshot {}", relative);
        Ok(relative)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = PathBuf::from(path);
    tmp.set_extension("jpg.tmp");
    std::fs::write(&tmp, data)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn system_font() -> Option<FontVec> {
    let font = SYSTEM_FONTS
        .iter()
        .map(Path::new)
        .filter(|path| path.is_file())
        .find_map(load_font);
    if font.is_none() {
        tracing::warn!("No system font found; annotations use the built-in bitmap font");
    }
    font
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read font {}: {}", path.display(), e);
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => {
            tracing::info!("Loaded annotation font {}", path.display());
            Some(font)
        }
        Err(e) => {
            tracing::warn!("Invalid font {}: {}", path.display(), e);
            None
        }
    }
}

/// Name of the annotated counterpart of a plain screenshot file
pub fn annotated_name(plain_name: &str) -> Option<String> {
    plain_name
        .strip_suffix("_no_info.jpg")
        .map(|stem| format!("{}_with_info.jpg", stem))
}
