//! Agent configuration
//!
//! Loaded from a JSON file. A missing file is created with defaults; an
//! unreadable or unparsable file falls back to defaults so the agent can still
//! start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Seconds between periodic full-screen captures
    pub screenshot_interval: u64,
    /// Root under which `records/<session>/` trees are created
    pub save_path: PathBuf,
    /// Enables the mouse/keyboard coalescing pipeline
    pub record_user_actions: bool,
    pub encryption: EncryptionConfig,
    pub upload: UploadConfig,
    pub scroll: ScrollConfig,
    pub keystroke: KeystrokeConfig,
    pub screenshot: ScreenshotConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            screenshot_interval: 20,
            save_path: PathBuf::from("."),
            record_user_actions: true,
            encryption: EncryptionConfig::default(),
            upload: UploadConfig::default(),
            scroll: ScrollConfig::default(),
            keystroke: KeystrokeConfig::default(),
            screenshot: ScreenshotConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub key: String,
    pub iv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Base URL of the dataset store; uploads are disabled when empty
    pub endpoint: String,
    pub access_token: String,
    pub owner_name: String,
    pub dataset_name: String,
    pub commit_message: String,
    pub repo_type: String,
    pub path_in_repo: String,
    /// Folder name used inside the repository; falls back to the session name
    pub username: Option<String>,
    /// New screenshots required before a batch is carved out
    pub threshold: usize,
    pub poll_interval_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: String::new(),
            owner_name: String::new(),
            dataset_name: String::new(),
            commit_message: "upload dataset folder to repo".to_string(),
            repo_type: "dataset".to_string(),
            path_in_repo: String::new(),
            username: None,
            threshold: 300,
            poll_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub distance_threshold_px: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            poll_interval_ms: 100,
            distance_threshold_px: 20.0,
        }
    }
}

impl ScrollConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystrokeConfig {
    pub flush_delay_ms: u64,
}

impl Default for KeystrokeConfig {
    fn default() -> Self {
        Self {
            flush_delay_ms: 1_500,
        }
    }
}

impl KeystrokeConfig {
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub target_size_kb: u64,
    pub start_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
    /// TrueType/OpenType font used for the annotation banner text
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            target_size_kb: 500,
            start_quality: 95,
            quality_step: 5,
            min_quality: 10,
            font_path: None,
            font_size: 48.0,
        }
    }
}

impl AgentConfig {
    /// Load the config at `path`, writing defaults when the file is missing.
    ///
    /// Never fails: any read or parse problem is logged and defaults are used.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            match config.save(path) {
                Ok(()) => tracing::info!("Created default config at {}", path.display()),
                Err(e) => tracing::warn!("Failed to write default config {}: {}", path.display(), e),
            }
            return config;
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!("Failed to read config {}: {}; using defaults", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<AgentConfig>(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config.normalized()
            }
            Err(e) => {
                tracing::error!("Failed to parse config {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        fs::write(path, payload)
    }

    /// Clamp out-of-range values back to usable ones.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        if self.screenshot_interval == 0 {
            tracing::warn!(
                "screenshot_interval must be positive; using {}s",
                defaults.screenshot_interval
            );
            self.screenshot_interval = defaults.screenshot_interval;
        }
        if self.scroll.timeout_ms == 0 {
            self.scroll.timeout_ms = defaults.scroll.timeout_ms;
        }
        if self.scroll.poll_interval_ms == 0 {
            self.scroll.poll_interval_ms = defaults.scroll.poll_interval_ms;
        }
        if !(self.scroll.distance_threshold_px > 0.0) {
            self.scroll.distance_threshold_px = defaults.scroll.distance_threshold_px;
        }
        if self.keystroke.flush_delay_ms == 0 {
            self.keystroke.flush_delay_ms = defaults.keystroke.flush_delay_ms;
        }
        if self.upload.poll_interval_secs == 0 {
            self.upload.poll_interval_secs = defaults.upload.poll_interval_secs;
        }
        if self.upload.threshold == 0 {
            tracing::warn!("upload.threshold must be positive; using {}", defaults.upload.threshold);
            self.upload.threshold = defaults.upload.threshold;
        }

        let shot = &mut self.screenshot;
        if !(1..=100).contains(&shot.start_quality) {
            shot.start_quality = defaults.screenshot.start_quality;
        }
        if shot.quality_step == 0 {
            shot.quality_step = defaults.screenshot.quality_step;
        }
        if shot.min_quality == 0 || shot.min_quality > shot.start_quality {
            shot.min_quality = defaults.screenshot.min_quality.min(shot.start_quality);
        }
        if !(shot.font_size > 0.0) {
            shot.font_size = defaults.screenshot.font_size;
        }
        if let Some(path) = shot.font_path.as_ref() {
            if path.as_os_str().is_empty() {
                shot.font_path = None;
            }
        }
        self.upload.username = self
            .upload
            .username
            .take()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        self
    }
}
