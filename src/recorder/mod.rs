//! Recording coordinator
//!
//! Owns the one-session-at-a-time gate and the session's channels. Channels
//! start in the order upload, periodic screenshots, input, and stop in
//! reverse, so input is flushed first and the event log is finalized before
//! the upload channel runs its final drain.

pub mod channel;
pub mod emitter;
pub mod event_log;
pub mod record;

pub use channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
pub use emitter::ActionEmitter;
pub use event_log::EventRecorder;
pub use record::{ActionContent, ActionRecord, ActionType, ScreenPosition, ScrollDelta};

use crate::capture::input::{InputDispatcher, InputRoute, InputTrackingChannel, PointerTracker};
use crate::capture::{PeriodicScreenshotChannel, ScreenSource, WindowProbe};
use crate::config::AgentConfig;
use crate::session::Session;
use crate::storage::ScreenshotStore;
use crate::upload::{BatchUploader, CipherKey, HttpUploader, UploadChannel, Uploader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// What a finished session left on disk
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_dir: PathBuf,
    pub consolidated_log: Option<PathBuf>,
    pub output_files: Vec<String>,
}

struct ActiveSession {
    session: Arc<Session>,
    recorder: Arc<EventRecorder>,
    channels: Vec<Box<dyn RecordingChannel>>,
}

pub struct RecordingCoordinator {
    config: AgentConfig,
    store: Arc<ScreenshotStore>,
    probe: Arc<dyn WindowProbe>,
    uploader: Option<Arc<dyn Uploader>>,
    input_route: Arc<InputRoute>,
    observers: broadcast::Sender<String>,
    active: Option<ActiveSession>,
}

impl RecordingCoordinator {
    pub fn new(
        config: AgentConfig,
        screen: Arc<dyn ScreenSource>,
        probe: Arc<dyn WindowProbe>,
    ) -> Self {
        let store = Arc::new(ScreenshotStore::new(screen, &config.screenshot));
        let (observers, _) = broadcast::channel(event_log::OBSERVER_CAPACITY);
        Self {
            config,
            store,
            probe,
            uploader: None,
            input_route: InputRoute::global(),
            observers,
            active: None,
        }
    }

    /// Use `uploader` instead of the HTTP client built from the config.
    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Feed input from `route` instead of the process-wide OS hook.
    pub fn with_input_route(mut self, route: Arc<InputRoute>) -> Self {
        self.input_route = route;
        self
    }

    /// Serialized action records, as they are appended, for any session
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.observers.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.active.as_ref().map(|a| a.session.clone())
    }

    /// Create a fresh session and start its channels.
    pub async fn start(&mut self) -> RecordingResult<Arc<Session>> {
        if self.active.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let session = Arc::new(Session::create(&self.config.save_path)?);
        self.store.bind(session.clone());
        let recorder = Arc::new(EventRecorder::with_observers(
            session.clone(),
            self.observers.clone(),
        ));

        let mut channels = match self.build_channels(&session, &recorder) {
            Ok(channels) => channels,
            Err(e) => {
                self.store.unbind();
                return Err(e);
            }
        };

        for index in 0..channels.len() {
            let result = {
                let channel = &mut channels[index];
                match channel.initialize(session.root()).await {
                    Ok(()) => channel.start().await,
                    Err(e) => Err(e),
                }
            };

            if let Err(e) = result {
                tracing::error!("Failed to start {} channel: {}", channels[index].channel_type(), e);
                for started in channels[..index].iter_mut().rev() {
                    if let Err(stop_err) = started.stop().await {
                        tracing::warn!("Failed to stop {} channel: {}", started.channel_type(), stop_err);
                    }
                }
                self.store.unbind();
                return Err(e);
            }
            tracing::debug!("Started {} channel", channels[index].id());
        }

        tracing::info!(
            "Recording session {} started ({} channels)",
            session.id(),
            channels.len()
        );

        self.active = Some(ActiveSession {
            session: session.clone(),
            recorder,
            channels,
        });
        Ok(session)
    }

    /// Stop every channel, write the consolidated log and run the final upload.
    pub async fn stop(&mut self) -> RecordingResult<SessionSummary> {
        let mut active = self.active.take().ok_or(RecordingError::NotRecording)?;

        let mut consolidated_log = None;
        let mut finalized = false;
        let mut output_files = Vec::new();

        for channel in active.channels.iter_mut().rev() {
            if channel.channel_type() == ChannelType::Upload && !finalized {
                consolidated_log = Self::finalize_log(&active.recorder);
                finalized = true;
            }
            if let Err(e) = channel.stop().await {
                tracing::error!("Failed to stop {} channel: {}", channel.channel_type(), e);
            }
            output_files.extend(channel.output_files());
        }
        if !finalized {
            consolidated_log = Self::finalize_log(&active.recorder);
        }

        self.store.unbind();
        tracing::info!("Recording session {} stopped", active.session.id());

        Ok(SessionSummary {
            session_dir: active.session.root().to_path_buf(),
            consolidated_log,
            output_files,
        })
    }

    fn finalize_log(recorder: &EventRecorder) -> Option<PathBuf> {
        match recorder.finalize() {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("Failed to write consolidated log: {}", e);
                None
            }
        }
    }

    fn build_channels(
        &self,
        session: &Arc<Session>,
        recorder: &Arc<EventRecorder>,
    ) -> RecordingResult<Vec<Box<dyn RecordingChannel>>> {
        let mut channels: Vec<Box<dyn RecordingChannel>> = Vec::new();

        if let Some(upload) = self.build_upload_channel(session) {
            channels.push(Box::new(upload));
        }

        channels.push(Box::new(PeriodicScreenshotChannel::new(
            self.store.clone(),
            Duration::from_secs(self.config.screenshot_interval),
        )));

        if self.config.record_user_actions {
            let pointer = Arc::new(PointerTracker::default());
            let emitter = Arc::new(ActionEmitter::new(
                self.probe.clone(),
                self.store.clone(),
                recorder.clone(),
                pointer.clone(),
            ));
            let dispatcher = InputDispatcher::new(emitter, pointer, &self.config)?;
            channels.push(Box::new(InputTrackingChannel::new(
                Arc::new(dispatcher),
                self.input_route.clone(),
                session.realtime_log_path().to_path_buf(),
            )));
        } else {
            tracing::info!("User action recording disabled");
        }

        Ok(channels)
    }

    fn build_upload_channel(&self, session: &Arc<Session>) -> Option<UploadChannel> {
        let upload = &self.config.upload;
        let uploader: Arc<dyn Uploader> = match &self.uploader {
            Some(uploader) => uploader.clone(),
            None if HttpUploader::is_configured(upload) => {
                Arc::new(HttpUploader::new(upload.clone(), &session.name()))
            }
            None => {
                tracing::info!("Upload endpoint not configured; batches stay local");
                return None;
            }
        };

        let cipher = match CipherKey::from_config(
            &self.config.encryption.key,
            &self.config.encryption.iv,
        ) {
            Ok(cipher) => cipher,
            Err(e) => {
                tracing::error!("Uploads disabled: {}", e);
                return None;
            }
        };

        let batches = Arc::new(BatchUploader::new(
            session.clone(),
            cipher,
            uploader,
            upload.threshold,
        ));
        Some(UploadChannel::new(
            batches,
            Duration::from_secs(upload.poll_interval_secs),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::input::types::{MouseButton, RawInputEvent, RawKey};
    use crate::capture::screen::testing::FakeScreen;
    use crate::capture::window::testing::FixedWindowProbe;
    use crate::processing::ActionSink;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::time::SystemTime;

    #[derive(Default)]
    struct CountingUploader {
        calls: Mutex<Vec<usize>>,
    }

    impl Uploader for CountingUploader {
        fn upload(&self, _path: &Path, record_count: usize, _batch_sequence: u32) -> RecordingResult<()> {
            self.calls.lock().push(record_count);
            Ok(())
        }
    }

    fn config(save_path: &Path) -> AgentConfig {
        let mut config = AgentConfig::default();
        config.save_path = save_path.to_path_buf();
        config.record_user_actions = false;
        config.screenshot_interval = 3_600;
        config.encryption.key = "16byteslongkey!!".to_string();
        config.encryption.iv = "16byteslongiv!!!".to_string();
        config
    }

    fn coordinator(config: AgentConfig) -> RecordingCoordinator {
        RecordingCoordinator::new(
            config,
            Arc::new(FakeScreen::new(32, 32)),
            Arc::new(FixedWindowProbe("Editor")),
        )
    }

    #[tokio::test]
    async fn test_one_session_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(config(dir.path()));

        assert!(matches!(coordinator.stop().await, Err(RecordingError::NotRecording)));

        let session = coordinator.start().await.unwrap();
        assert!(coordinator.is_recording());
        assert!(matches!(coordinator.start().await, Err(RecordingError::AlreadyRecording)));

        let summary = coordinator.stop().await.unwrap();
        assert_eq!(summary.session_dir, session.root());
        assert!(summary.consolidated_log.is_none());
        assert!(!coordinator.is_recording());

        // A new session never reuses the previous folder.
        let next = coordinator.start().await.unwrap();
        assert_ne!(next.root(), session.root());
        coordinator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_drains_pending_screenshots() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(CountingUploader::default());
        let mut coordinator = coordinator(config(dir.path())).with_uploader(uploader.clone());

        coordinator.start().await.unwrap();
        for _ in 0..3 {
            coordinator.store.save(None, None).unwrap();
        }
        coordinator.stop().await.unwrap();

        assert_eq!(*uploader.calls.lock(), vec![3]);
    }

    #[tokio::test]
    async fn test_invalid_encryption_disables_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.encryption.key = "too short".to_string();
        let uploader = Arc::new(CountingUploader::default());
        let mut coordinator = coordinator(config).with_uploader(uploader.clone());

        coordinator.start().await.unwrap();
        coordinator.store.save(None, None).unwrap();
        coordinator.stop().await.unwrap();

        assert!(uploader.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_restart_with_input_dispatches_each_event_once() {
        use crate::capture::input::route::testing::ManualHook;

        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.record_user_actions = true;
        let hook = ManualHook::default();
        let mut coordinator = coordinator(config).with_input_route(hook.route());

        coordinator.start().await.unwrap();
        coordinator.stop().await.unwrap();
        let session = coordinator.start().await.unwrap();

        hook.fire(RawInputEvent::Click {
            button: MouseButton::Left,
            pressed: true,
            x: 4.0,
            y: 4.0,
            time: SystemTime::now(),
        });
        hook.fire(RawInputEvent::Key {
            key: RawKey::Char('z'),
            time: SystemTime::now(),
        });
        coordinator.stop().await.unwrap();

        assert_eq!(hook.installed(), 1);
        let text = std::fs::read_to_string(session.realtime_log_path()).unwrap();
        let types: Vec<ActionType> = text
            .lines()
            .map(|l| serde_json::from_str::<ActionRecord>(l).unwrap().action_type)
            .collect();
        assert_eq!(types, vec![ActionType::MouseClick, ActionType::KeyPress]);
    }

    #[tokio::test]
    async fn test_actions_flow_to_log_and_observers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.keystroke.flush_delay_ms = 60_000;
        let mut coordinator = coordinator(config.clone());
        let mut observer = coordinator.subscribe();

        let session = coordinator.start().await.unwrap();
        let active = coordinator.active.as_ref().unwrap();

        // Same wiring the input channel uses, driven without the OS hook.
        let pointer = Arc::new(PointerTracker::default());
        let emitter: Arc<dyn ActionSink> = Arc::new(ActionEmitter::new(
            coordinator.probe.clone(),
            coordinator.store.clone(),
            active.recorder.clone(),
            pointer.clone(),
        ));
        let dispatcher = InputDispatcher::new(emitter, pointer, &config).unwrap();
        dispatcher.start().unwrap();

        let now = SystemTime::now();
        for dy in [5, 3, -2] {
            dispatcher.handle(RawInputEvent::Scroll {
                dx: 0,
                dy,
                x: 8.0,
                y: 8.0,
                time: now,
            });
        }
        dispatcher.handle(RawInputEvent::Click {
            button: MouseButton::Left,
            pressed: true,
            x: 8.0,
            y: 8.0,
            time: now,
        });
        for c in ['o', 'k'] {
            dispatcher.handle(RawInputEvent::Key {
                key: RawKey::Char(c),
                time: now,
            });
        }
        dispatcher.stop();

        let summary = coordinator.stop().await.unwrap();

        let text = std::fs::read_to_string(session.realtime_log_path()).unwrap();
        let records: Vec<ActionRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let shape: Vec<_> = records
            .iter()
            .map(|r| (r.action_type, r.action_content.delta.map(|d| d.dy)))
            .collect();
        assert_eq!(
            shape,
            vec![
                (ActionType::MouseScroll, Some(8)),
                (ActionType::MouseScroll, Some(-2)),
                (ActionType::MouseClick, None),
                (ActionType::KeyPress, None),
            ]
        );
        assert_eq!(records[3].action_content.key.as_deref(), Some("o k"));
        for record in &records {
            assert_eq!(record.active_app, "Editor");
            assert!(session.resolve(&record.screenshot_path).is_file());
        }

        let consolidated = summary.consolidated_log.expect("consolidated log");
        let all: Vec<ActionRecord> =
            serde_json::from_slice(&std::fs::read(consolidated).unwrap()).unwrap();
        assert_eq!(all.len(), records.len());
        assert_eq!(all[3].action_content.key, records[3].action_content.key);

        let mut seen = 0;
        while observer.try_recv().is_ok() {
            seen += 1;
        }
        assert_eq!(seen, 4);
    }
}
