//! Recording channel trait
//!
//! Defines the interface for the background channels of a recording session
//! (input tracking, periodic screenshots, batch upload).

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur during recording
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("No active session")]
    NoSession,

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Packaging error: {0}")]
    PackagingError(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

/// Trait for recording channels
///
/// Each channel owns one long-running background concern of a session.
/// Channels are managed by the RecordingCoordinator.
#[async_trait]
pub trait RecordingChannel: Send + Sync {
    /// Get the channel identifier (e.g., "input", "screenshot", "upload")
    fn id(&self) -> &str;

    /// Get the channel type
    fn channel_type(&self) -> ChannelType;

    /// Initialize the channel with the session directory
    async fn initialize(&mut self, session_dir: &Path) -> RecordingResult<()>;

    /// Start recording
    async fn start(&mut self) -> RecordingResult<()>;

    /// Stop recording, flushing anything still pending
    async fn stop(&mut self) -> RecordingResult<()>;

    /// Check if the channel is currently recording
    fn is_recording(&self) -> bool;

    /// Get output files created by this channel
    fn output_files(&self) -> Vec<String>;
}

/// Types of recording channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    /// Mouse and keyboard action capture
    Input,
    /// Periodic full-screen captures
    Screenshot,
    /// Batch packaging and upload
    Upload,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Input => write!(f, "input"),
            ChannelType::Screenshot => write!(f, "screenshot"),
            ChannelType::Upload => write!(f, "upload"),
        }
    }
}

/// Sleep for `total` in short slices, returning early once `running` clears.
///
/// Returns whether the channel is still running.
pub fn sleep_while_running(running: &AtomicBool, total: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(100);
    let deadline = Instant::now() + total;
    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLICE.min(deadline - now));
    }
    false
}
