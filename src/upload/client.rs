//! Upload transport

use crate::config::UploadConfig;
use crate::recorder::channel::{RecordingError, RecordingResult};
use std::path::Path;
use std::time::Duration;

/// Delivers one encrypted batch. `Ok` means the remote store confirmed it.
pub trait Uploader: Send + Sync {
    fn upload(&self, path: &Path, record_count: usize, batch_sequence: u32) -> RecordingResult<()>;
}

/// PUTs batches to `{endpoint}/{owner}/{dataset}/{path_in_repo}/{folder}/{file}`
/// with a bearer token.
pub struct HttpUploader {
    agent: ureq::Agent,
    config: UploadConfig,
    folder: String,
}

impl HttpUploader {
    /// `folder` is the configured username, or the session name when unset.
    pub fn new(config: UploadConfig, session_name: &str) -> Self {
        let folder = config
            .username
            .clone()
            .unwrap_or_else(|| session_name.to_string());
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build();
        Self {
            agent,
            config,
            folder,
        }
    }

    pub fn is_configured(config: &UploadConfig) -> bool {
        !config.endpoint.trim().is_empty()
    }

    fn remote_path(&self, path: &Path) -> String {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        [self.config.path_in_repo.as_str(), self.folder.as_str(), file.as_str()]
            .iter()
            .map(|part| part.trim_matches('/'))
            .filter(|part| !part.is_empty())
            .map(|part| urlencoding::encode(part).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn url_for(&self, path: &Path) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.config.owner_name),
            urlencoding::encode(&self.config.dataset_name),
            self.remote_path(path)
        )
    }
}

impl Uploader for HttpUploader {
    fn upload(&self, path: &Path, record_count: usize, batch_sequence: u32) -> RecordingResult<()> {
        let body = std::fs::read(path)?;
        let url = self.url_for(path);

        tracing::info!(
            "Uploading batch {} ({} records, {} bytes) to {}",
            batch_sequence,
            record_count,
            body.len(),
            url
        );

        let response = self
            .agent
            .put(&url)
            .set("Authorization", &format!("Bearer {}", self.config.access_token))
            .set("Content-Type", "application/octet-stream")
            .set("X-Commit-Message", &self.config.commit_message)
            .set("X-Repo-Type", &self.config.repo_type)
            .set("X-Record-Count", &record_count.to_string())
            .set("X-Batch-Sequence", &batch_sequence.to_string())
            .send_bytes(&body);

        match response {
            Ok(resp) => {
                tracing::info!("Batch {} accepted (HTTP {})", batch_sequence, resp.status());
                Ok(())
            }
            Err(ureq::Error::Status(code, resp)) => {
                let detail = resp.into_string().unwrap_or_default();
                Err(RecordingError::UploadError(format!(
                    "HTTP {}: {}",
                    code,
                    detail.trim()
                )))
            }
            Err(e) => Err(RecordingError::UploadError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> UploadConfig {
        UploadConfig {
            endpoint: "https://datasets.example.com/api/".to_string(),
            owner_name: "team".to_string(),
            dataset_name: "desk actions".to_string(),
            path_in_repo: "raw/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_uses_session_name_without_username() {
        let uploader = HttpUploader::new(config(), "2024-01-01_10-00-00");
        let url = uploader.url_for(&PathBuf::from("/tmp/x/2024-01-01_10-00-00_0001.zip.enc"));
        assert_eq!(
            url,
            "https://datasets.example.com/api/team/desk%20actions/raw/2024-01-01_10-00-00/2024-01-01_10-00-00_0001.zip.enc"
        );
    }

    #[test]
    fn test_url_prefers_username() {
        let mut config = config();
        config.username = Some("alice".to_string());
        config.path_in_repo = String::new();
        let uploader = HttpUploader::new(config, "session");
        let url = uploader.url_for(&PathBuf::from("batch.zip.enc"));
        assert!(url.ends_with("/team/desk%20actions/alice/batch.zip.enc"));
    }

    #[test]
    fn test_is_configured() {
        assert!(HttpUploader::is_configured(&config()));
        assert!(!HttpUploader::is_configured(&UploadConfig::default()));
    }

    #[test]
    fn test_unreachable_endpoint_is_an_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("b.zip.enc");
        std::fs::write(&file, b"x").unwrap();

        let mut config = config();
        config.endpoint = "http://127.0.0.1:9".to_string();
        let uploader = HttpUploader::new(config, "s");
        assert!(matches!(
            uploader.upload(&file, 1, 0),
            Err(RecordingError::UploadError(_))
        ));
    }
}
