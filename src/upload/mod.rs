//! Batch upload
//!
//! A monitor thread watches the number of original screenshots in the
//! session. Once more than `threshold` have accumulated past the committed
//! cursor, the new slice is packaged, encrypted and handed to the uploader.
//! The cursor only advances when the upload is confirmed, so a failed batch
//! is retried, grown, on the next poll.

pub mod client;
pub mod crypto;
pub mod cursor;
pub mod package;

pub use client::{HttpUploader, Uploader};
pub use crypto::CipherKey;
pub use cursor::UploadCursor;

use crate::recorder::channel::{
    sleep_while_running, ChannelType, RecordingChannel, RecordingError, RecordingResult,
};
use crate::session::Session;
use async_trait::async_trait;
use package::{build_archive, list_originals};
use parking_lot::Mutex;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Packaging,
    Encrypting,
    Uploading,
}

pub struct BatchUploader {
    session: Arc<Session>,
    cipher: CipherKey,
    uploader: Arc<dyn Uploader>,
    threshold: usize,
    cursor: Mutex<UploadCursor>,
    state: Mutex<BatchState>,
}

impl BatchUploader {
    pub fn new(
        session: Arc<Session>,
        cipher: CipherKey,
        uploader: Arc<dyn Uploader>,
        threshold: usize,
    ) -> Self {
        let cursor = UploadCursor::load(session.upload_dir());
        Self {
            session,
            cipher,
            uploader,
            threshold,
            cursor: Mutex::new(cursor),
            state: Mutex::new(BatchState::Idle),
        }
    }

    pub fn state(&self) -> BatchState {
        *self.state.lock()
    }

    pub fn committed(&self) -> usize {
        self.cursor.lock().committed()
    }

    /// One monitor tick. Returns whether a batch was uploaded.
    pub fn poll_once(&self) -> RecordingResult<bool> {
        self.run(false)
    }

    /// Upload whatever is left, ignoring the threshold.
    pub fn drain(&self) -> RecordingResult<bool> {
        self.run(true)
    }

    fn run(&self, force: bool) -> RecordingResult<bool> {
        // Held for the whole attempt so ticks and the final drain never overlap.
        let mut cursor = self.cursor.lock();

        let originals = list_originals(&self.session)?;
        cursor.observe(originals.len());
        let pending = cursor.pending();

        if pending == 0 || (!force && pending <= self.threshold) {
            tracing::debug!(
                "Upload check: {} pending (threshold {}, forced={})",
                pending,
                self.threshold,
                force
            );
            return Ok(false);
        }

        let range = cursor.committed() + 1..=cursor.observed();
        let sequence = cursor.batch_sequence();
        let archive = self
            .session
            .upload_dir()
            .join(format!("{}_{:04}.zip", self.session.name(), sequence));
        let encrypted = PathBuf::from(format!("{}.enc", archive.display()));

        let result = self.ship(&originals, range.clone(), &archive, &encrypted, pending, sequence);

        for path in [&archive, &encrypted] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
        self.set_state(BatchState::Idle);

        result?;
        cursor.commit(*range.end())?;
        tracing::info!(
            "Batch {} confirmed; committed {} screenshots",
            sequence,
            cursor.committed()
        );
        Ok(true)
    }

    fn ship(
        &self,
        originals: &[PathBuf],
        range: RangeInclusive<usize>,
        archive: &Path,
        encrypted: &Path,
        record_count: usize,
        sequence: u32,
    ) -> RecordingResult<()> {
        self.set_state(BatchState::Packaging);
        build_archive(&self.session, originals, range, archive)?;

        self.set_state(BatchState::Encrypting);
        self.cipher.encrypt_file(archive, encrypted)?;

        self.set_state(BatchState::Uploading);
        self.uploader.upload(encrypted, record_count, sequence)
    }

    fn set_state(&self, state: BatchState) {
        *self.state.lock() = state;
    }
}

/// Drives a [`BatchUploader`] from a monitor thread for the life of a session
pub struct UploadChannel {
    id: String,
    uploader: Arc<BatchUploader>,
    poll_interval: Duration,
    is_recording: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UploadChannel {
    pub fn new(uploader: Arc<BatchUploader>, poll_interval: Duration) -> Self {
        Self {
            id: "upload".to_string(),
            uploader,
            poll_interval,
            is_recording: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

#[async_trait]
impl RecordingChannel for UploadChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Upload
    }

    async fn initialize(&mut self, session_dir: &Path) -> RecordingResult<()> {
        tracing::info!(
            "Upload channel initialized (session={}, poll_interval={:?})",
            session_dir.display(),
            self.poll_interval
        );
        Ok(())
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }
        self.is_recording.store(true, Ordering::SeqCst);

        let running = self.is_recording.clone();
        let uploader = self.uploader.clone();
        let interval = self.poll_interval;

        let handle = std::thread::Builder::new()
            .name("upload-monitor".to_string())
            .spawn(move || {
                while sleep_while_running(&running, interval) {
                    if let Err(e) = uploader.poll_once() {
                        tracing::error!("Batch upload failed, will retry: {}", e);
                    }
                }
            })?;
        self.handle = Some(handle);

        tracing::info!("Upload monitor started");
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.is_recording.store(false, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        let uploader = self.uploader.clone();
        let drained = tokio::task::spawn_blocking(move || uploader.drain())
            .await
            .map_err(|e| RecordingError::UploadError(e.to_string()))?;

        match drained {
            Ok(true) => tracing::info!("Final batch uploaded"),
            Ok(false) => tracing::info!("Nothing left to upload"),
            Err(e) => tracing::error!("Final upload failed: {}", e),
        }
        tracing::info!(
            "Upload monitor stopped (committed={})",
            self.uploader.committed()
        );
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    fn output_files(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs;

    /// Replays a fixed script of outcomes and remembers each call
    struct ScriptedUploader {
        outcomes: Mutex<VecDeque<bool>>,
        calls: Mutex<Vec<(usize, u32, Vec<u8>)>>,
    }

    impl ScriptedUploader {
        fn new(outcomes: &[bool]) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Uploader for ScriptedUploader {
        fn upload(&self, path: &Path, record_count: usize, batch_sequence: u32) -> RecordingResult<()> {
            let bytes = fs::read(path)?;
            self.calls.lock().push((record_count, batch_sequence, bytes));
            if self.outcomes.lock().pop_front().unwrap_or(true) {
                Ok(())
            } else {
                Err(RecordingError::UploadError("scripted failure".to_string()))
            }
        }
    }

    fn cipher() -> CipherKey {
        CipherKey::from_config("16byteslongkey!!", "16byteslongiv!!!").unwrap()
    }

    fn add_screenshots(session: &Session, from: usize, count: usize) {
        for i in from..from + count {
            let stem = format!("screenshot_2024-01-01_00-00-00_000000_{:06}", i);
            fs::write(session.original_dir().join(format!("{}_no_info.jpg", stem)), b"p").unwrap();
            fs::write(session.annotated_dir().join(format!("{}_with_info.jpg", stem)), b"a").unwrap();
        }
    }

    fn setup(outcomes: &[bool], threshold: usize) -> (tempfile::TempDir, Arc<Session>, Arc<ScriptedUploader>, BatchUploader) {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::create(dir.path()).unwrap());
        let scripted = Arc::new(ScriptedUploader::new(outcomes));
        let uploader = BatchUploader::new(session.clone(), cipher(), scripted.clone(), threshold);
        (dir, session, scripted, uploader)
    }

    #[test]
    fn test_below_threshold_does_nothing() {
        let (_dir, session, scripted, uploader) = setup(&[], 3);
        add_screenshots(&session, 0, 3);

        assert!(!uploader.poll_once().unwrap());
        assert!(scripted.calls.lock().is_empty());
        assert_eq!(uploader.committed(), 0);
    }

    #[test]
    fn test_over_threshold_uploads_slice() {
        let (_dir, session, scripted, uploader) = setup(&[true], 3);
        add_screenshots(&session, 0, 4);

        assert!(uploader.poll_once().unwrap());
        assert_eq!(uploader.committed(), 4);
        assert_eq!(uploader.state(), BatchState::Idle);

        let calls = scripted.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].0, calls[0].1), (4, 0));

        // The payload is a decryptable zip with both variants.
        let zip_bytes = cipher().decrypt(&calls[0].2).unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        assert_eq!(archive.len(), 8);
    }

    #[test]
    fn test_failures_then_success_advance_once() {
        let (_dir, session, scripted, uploader) = setup(&[false, false, true], 2);
        add_screenshots(&session, 0, 3);

        assert!(uploader.poll_once().is_err());
        assert_eq!(uploader.committed(), 0);

        add_screenshots(&session, 3, 1);
        assert!(uploader.poll_once().is_err());
        assert_eq!(uploader.committed(), 0);

        add_screenshots(&session, 4, 2);
        assert!(uploader.poll_once().unwrap());
        assert_eq!(uploader.committed(), 6);

        let calls = scripted.calls.lock();
        let counts: Vec<_> = calls.iter().map(|(n, seq, _)| (*n, *seq)).collect();
        assert_eq!(counts, vec![(3, 0), (4, 0), (6, 0)]);

        let resumed = UploadCursor::load(session.upload_dir());
        assert_eq!(resumed.committed(), 6);
        assert_eq!(resumed.batch_sequence(), 1);
    }

    #[test]
    fn test_second_batch_covers_only_new_screenshots() {
        let (_dir, session, scripted, uploader) = setup(&[true, true], 1);
        add_screenshots(&session, 0, 2);
        assert!(uploader.poll_once().unwrap());

        add_screenshots(&session, 2, 2);
        assert!(uploader.poll_once().unwrap());
        assert_eq!(uploader.committed(), 4);

        let calls = scripted.calls.lock();
        assert_eq!((calls[1].0, calls[1].1), (2, 1));
        let zip_bytes = cipher().decrypt(&calls[1].2).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        assert!(archive
            .by_name("screenshots/original/screenshot_2024-01-01_00-00-00_000000_000002_no_info.jpg")
            .is_ok());
        assert!(archive
            .by_name("screenshots/original/screenshot_2024-01-01_00-00-00_000000_000000_no_info.jpg")
            .is_err());
    }

    #[test]
    fn test_drain_ignores_threshold() {
        let (_dir, session, scripted, uploader) = setup(&[true], 300);
        add_screenshots(&session, 0, 2);

        assert!(!uploader.poll_once().unwrap());
        assert!(uploader.drain().unwrap());
        assert_eq!(uploader.committed(), 2);
        assert_eq!(scripted.calls.lock().len(), 1);

        assert!(!uploader.drain().unwrap());
    }

    #[test]
    fn test_intermediate_archives_removed() {
        let (_dir, session, _scripted, uploader) = setup(&[false, true], 0);
        add_screenshots(&session, 0, 1);

        assert!(uploader.poll_once().is_err());
        assert!(uploader.poll_once().unwrap());

        let leftovers: Vec<_> = fs::read_dir(session.upload_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".zip") || name.ends_with(".enc"))
            .collect();
        assert!(leftovers.is_empty());
    }

    fn uploaded_originals(bytes: &[u8]) -> Vec<String> {
        let zip_bytes = cipher().decrypt(bytes).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .filter(|name| name.starts_with("screenshots/original/"))
            .collect()
    }

    #[test]
    fn test_concurrent_saves_upload_each_screenshot_once() {
        use crate::capture::screen::testing::FakeScreen;
        use crate::config::ScreenshotConfig;
        use crate::storage::ScreenshotStore;
        use std::collections::HashMap;

        let (_dir, session, scripted, uploader) = setup(&[], 0);
        let store = Arc::new(ScreenshotStore::new(
            Arc::new(FakeScreen::new(8, 8)),
            &ScreenshotConfig::default(),
        ));
        store.bind(session.clone());

        // A slow, large save racing a quick small one and a monitor tick.
        let slow = {
            let store = store.clone();
            std::thread::spawn(move || {
                let frame = image::RgbaImage::from_pixel(3000, 2000, image::Rgba([9, 80, 200, 255]));
                store.save(None, Some(&frame)).unwrap()
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        let quick = store.save(None, None).unwrap();
        uploader.poll_once().unwrap();
        let slow = slow.join().unwrap();
        uploader.poll_once().unwrap();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for (_, _, bytes) in scripted.calls.lock().iter() {
            for name in uploaded_originals(bytes) {
                *counts.entry(name).or_default() += 1;
            }
        }
        for relative in [quick, slow] {
            let name = relative.rsplit('/').next().unwrap().to_string();
            assert_eq!(
                counts.get(&format!("screenshots/original/{}", name)),
                Some(&1),
                "{} in {:?}",
                name,
                counts
            );
        }
        assert_eq!(uploader.committed(), 2);
    }

    #[tokio::test]
    async fn test_channel_stop_drains() {
        let (_dir, session, scripted, uploader) = setup(&[true], 300);
        add_screenshots(&session, 0, 1);

        let mut channel = UploadChannel::new(Arc::new(uploader), Duration::from_secs(60));
        channel.initialize(session.root()).await.unwrap();
        channel.start().await.unwrap();
        assert!(channel.is_recording());

        channel.stop().await.unwrap();
        assert!(!channel.is_recording());
        assert_eq!(scripted.calls.lock().len(), 1);
    }
}
