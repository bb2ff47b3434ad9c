//! Recording session directories
//!
//! A session is created once per recording run and never reused. It owns the
//! on-disk tree every other component writes into:
//!
//! ```text
//! <save_root>/records/<session-ts>/
//!     screenshots/original/
//!     screenshots/annotated/
//!     log/
//!     upload/
//! ```

use crate::recorder::channel::RecordingResult;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const RECORDS_DIR: &str = "records";

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Local>,
    save_root: PathBuf,
    root: PathBuf,
    original_dir: PathBuf,
    annotated_dir: PathBuf,
    log_dir: PathBuf,
    upload_dir: PathBuf,
    realtime_log: PathBuf,
}

impl Session {
    /// Create the directory tree for a new session under `save_root`.
    pub fn create(save_root: &Path) -> RecordingResult<Self> {
        let started_at = Local::now();
        let folder = started_at.format("%Y-%m-%d_%H-%M-%S").to_string();
        let mut root = save_root.join(RECORDS_DIR).join(&folder);

        // Two runs inside the same second get distinct folders.
        let mut suffix = 1;
        while root.exists() {
            root = save_root
                .join(RECORDS_DIR)
                .join(format!("{}_{}", folder, suffix));
            suffix += 1;
        }

        let screenshots = root.join("screenshots");
        let original_dir = screenshots.join("original");
        let annotated_dir = screenshots.join("annotated");
        let log_dir = root.join("log");
        let upload_dir = root.join("upload");

        for dir in [&original_dir, &annotated_dir, &log_dir, &upload_dir] {
            fs::create_dir_all(dir)?;
        }

        let realtime_log = log_dir.join(format!(
            "user_actions_real_time_{}.jsonl",
            started_at.format("%Y%m%d_%H%M%S_%6f")
        ));

        let session = Self {
            id: Uuid::new_v4(),
            started_at,
            save_root: save_root.to_path_buf(),
            root,
            original_dir,
            annotated_dir,
            log_dir,
            upload_dir,
            realtime_log,
        };

        tracing::info!("Created session {} at {}", session.id, session.root.display());
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Folder name of this session under `records/`
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn save_root(&self) -> &Path {
        &self.save_root
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn original_dir(&self) -> &Path {
        &self.original_dir
    }

    pub fn annotated_dir(&self) -> &Path {
        &self.annotated_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Append-only NDJSON action log
    pub fn realtime_log_path(&self) -> &Path {
        &self.realtime_log
    }

    /// Express `path` relative to the save root, starting at `records/`.
    ///
    /// Separators are always `/` so the value is stable across platforms.
    pub fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.save_root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Resolve a path produced by [`Session::relative_path`].
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.save_root.clone(), |acc, part| acc.join(part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_builds_layout() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::create(dir.path()).unwrap();

        assert!(session.original_dir().is_dir());
        assert!(session.annotated_dir().is_dir());
        assert!(session.log_dir().is_dir());
        assert!(session.upload_dir().is_dir());
        assert!(session.root().starts_with(dir.path().join(RECORDS_DIR)));
        assert!(session
            .realtime_log_path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with(".jsonl"));
    }

    #[test]
    fn test_sessions_never_share_a_folder() {
        let dir = tempfile::tempdir().unwrap();
        let first = Session::create(dir.path()).unwrap();
        let second = Session::create(dir.path()).unwrap();

        assert_ne!(first.root(), second.root());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_relative_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::create(dir.path()).unwrap();
        let file = session.original_dir().join("shot.jpg");

        let relative = session.relative_path(&file);

        assert!(relative.starts_with("records/"));
        assert!(relative.ends_with("screenshots/original/shot.jpg"));
        assert_eq!(session.resolve(&relative), file);
    }
}
