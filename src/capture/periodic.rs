use crate::recorder::channel::{
    sleep_while_running, ChannelType, RecordingChannel, RecordingError, RecordingResult,
};
use crate::storage::ScreenshotStore;
use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Stores an unannotated full-screen capture every `interval`
pub struct PeriodicScreenshotChannel {
    id: String,
    store: Arc<ScreenshotStore>,
    interval: Duration,
    is_recording: Arc<AtomicBool>,
    captured: Arc<AtomicUsize>,
    output_files: Arc<ParkingMutex<Vec<String>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PeriodicScreenshotChannel {
    pub fn new(store: Arc<ScreenshotStore>, interval: Duration) -> Self {
        Self {
            id: "screenshot".to_string(),
            store,
            interval,
            is_recording: Arc::new(AtomicBool::new(false)),
            captured: Arc::new(AtomicUsize::new(0)),
            output_files: Arc::new(ParkingMutex::new(Vec::new())),
            thread_handle: None,
        }
    }

    pub fn captured(&self) -> usize {
        self.captured.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordingChannel for PeriodicScreenshotChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Screenshot
    }

    async fn initialize(&mut self, session_dir: &Path) -> RecordingResult<()> {
        tracing::info!(
            "Periodic screenshot channel initialized (interval={:?}, session={})",
            self.interval,
            session_dir.display()
        );
        Ok(())
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }
        self.is_recording.store(true, Ordering::SeqCst);
        self.output_files.lock().clear();

        let running = self.is_recording.clone();
        let store = self.store.clone();
        let captured = self.captured.clone();
        let output_files = self.output_files.clone();
        let interval = self.interval;

        let handle = std::thread::Builder::new()
            .name("periodic-screenshot".to_string())
            .spawn(move || {
                while sleep_while_running(&running, interval) {
                    match store.save(None, None) {
                        Ok(path) => {
                            captured.fetch_add(1, Ordering::SeqCst);
                            output_files.lock().push(path);
                        }
                        Err(e) => tracing::warn!("Periodic screenshot failed: {}", e),
                    }
                }
            })?;
        self.thread_handle = Some(handle);

        tracing::info!("Periodic screenshots started");
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.is_recording.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        tracing::info!("Periodic screenshots stopped (captured={})", self.captured());
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    fn output_files(&self) -> Vec<String> {
        self.output_files.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::screen::testing::FakeScreen;
    use crate::config::ScreenshotConfig;
    use crate::session::Session;

    #[tokio::test]
    async fn test_captures_on_interval_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::create(dir.path()).unwrap());
        let store = Arc::new(ScreenshotStore::new(
            Arc::new(FakeScreen::new(16, 16)),
            &ScreenshotConfig::default(),
        ));
        store.bind(session.clone());

        let mut channel = PeriodicScreenshotChannel::new(store, Duration::from_millis(50));
        channel.initialize(session.root()).await.unwrap();
        channel.start().await.unwrap();
        assert!(matches!(channel.start().await, Err(RecordingError::AlreadyRecording)));

        tokio::time::sleep(Duration::from_millis(400)).await;
        channel.stop().await.unwrap();

        let captured = channel.captured();
        assert!(captured >= 2, "captured {}", captured);
        assert_eq!(channel.output_files().len(), captured);
        assert_eq!(
            std::fs::read_dir(session.original_dir()).unwrap().count(),
            captured
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(channel.captured(), captured);
    }
}
