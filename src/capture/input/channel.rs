use crate::capture::input::dispatcher::InputDispatcher;
use crate::capture::input::route::InputRoute;
use crate::recorder::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mouse and keyboard action capture for one session
pub struct InputTrackingChannel {
    id: String,
    dispatcher: Arc<InputDispatcher>,
    route: Arc<InputRoute>,
    is_recording: Arc<AtomicBool>,
    action_log: PathBuf,
    output_dir: Option<PathBuf>,
}

impl InputTrackingChannel {
    /// `action_log` is the real-time log the dispatcher's records end up in.
    /// Events arrive through `route`, normally [`InputRoute::global`].
    pub fn new(dispatcher: Arc<InputDispatcher>, route: Arc<InputRoute>, action_log: PathBuf) -> Self {
        Self {
            id: "input".to_string(),
            dispatcher,
            route,
            is_recording: Arc::new(AtomicBool::new(false)),
            action_log,
            output_dir: None,
        }
    }
}

#[async_trait]
impl RecordingChannel for InputTrackingChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Input
    }

    async fn initialize(&mut self, session_dir: &Path) -> RecordingResult<()> {
        self.output_dir = Some(session_dir.to_path_buf());
        tracing::info!(
            "Input tracking channel initialized (session={})",
            session_dir.display()
        );
        Ok(())
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }
        if self.output_dir.is_none() {
            return Err(RecordingError::ConfigurationError(
                "Output directory not set".to_string(),
            ));
        }

        self.dispatcher.start()?;
        self.route.attach(self.dispatcher.clone());
        if let Err(e) = self.route.ensure_listening() {
            self.route.detach(&self.dispatcher);
            self.dispatcher.stop();
            return Err(e);
        }

        self.is_recording.store(true, Ordering::SeqCst);
        tracing::info!("Input tracking started");
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.is_recording.store(false, Ordering::SeqCst);
        self.route.detach(&self.dispatcher);

        let dispatcher = self.dispatcher.clone();
        tokio::task::spawn_blocking(move || dispatcher.stop())
            .await
            .map_err(|e| RecordingError::PlatformError(e.to_string()))?;

        tracing::info!("Input tracking stopped");
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    fn output_files(&self) -> Vec<String> {
        vec![self.action_log.to_string_lossy().to_string()]
    }
}
