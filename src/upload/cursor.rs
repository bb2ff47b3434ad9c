//! Persisted upload progress
//!
//! The committed count only moves forward, and only after an upload has been
//! confirmed. Both it and the batch sequence live in marker files in the
//! session's `upload/` directory so a restarted uploader resumes where the
//! last confirmed batch ended.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const COMMITTED_MARKER: &str = "committed_count";
const SEQUENCE_MARKER: &str = "batch_sequence";

#[derive(Debug)]
pub struct UploadCursor {
    dir: PathBuf,
    committed: usize,
    observed: usize,
    batch_sequence: u32,
}

impl UploadCursor {
    /// Load markers from `dir`; missing or corrupt markers read as zero.
    pub fn load(dir: &Path) -> Self {
        let committed = read_marker(&dir.join(COMMITTED_MARKER));
        let batch_sequence = read_marker(&dir.join(SEQUENCE_MARKER));
        if committed > 0 {
            tracing::info!(
                "Resuming upload cursor at {} (batch {})",
                committed,
                batch_sequence
            );
        }
        Self {
            dir: dir.to_path_buf(),
            committed,
            observed: committed,
            batch_sequence,
        }
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn batch_sequence(&self) -> u32 {
        self.batch_sequence
    }

    pub fn observe(&mut self, count: usize) {
        self.observed = count;
    }

    /// Records observed but not yet confirmed
    pub fn pending(&self) -> usize {
        self.observed.saturating_sub(self.committed)
    }

    /// Advance to `count` after a confirmed upload and persist both markers.
    pub fn commit(&mut self, count: usize) -> io::Result<()> {
        if count <= self.committed {
            return Ok(());
        }
        let next_sequence = self.batch_sequence + 1;
        write_marker(&self.dir, COMMITTED_MARKER, count)?;
        write_marker(&self.dir, SEQUENCE_MARKER, next_sequence)?;
        self.committed = count;
        self.batch_sequence = next_sequence;
        Ok(())
    }
}

fn read_marker<T: std::str::FromStr + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(text) => text.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring corrupt upload marker {}", path.display());
            T::default()
        }),
        Err(_) => T::default(),
    }
}

fn write_marker<T: std::fmt::Display>(dir: &Path, name: &str, value: T) -> io::Result<()> {
    let tmp = dir.join(format!("{}.tmp", name));
    fs::write(&tmp, value.to_string())?;
    fs::rename(&tmp, dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_cursor_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = UploadCursor::load(dir.path());
        assert_eq!(cursor.committed(), 0);
        assert_eq!(cursor.batch_sequence(), 0);
        assert_eq!(cursor.pending(), 0);
    }

    #[test]
    fn test_commit_persists_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cursor = UploadCursor::load(dir.path());
        cursor.observe(350);
        assert_eq!(cursor.pending(), 350);

        cursor.commit(350).unwrap();
        assert_eq!(cursor.pending(), 0);
        assert_eq!(cursor.batch_sequence(), 1);

        let resumed = UploadCursor::load(dir.path());
        assert_eq!(resumed.committed(), 350);
        assert_eq!(resumed.batch_sequence(), 1);
    }

    #[test]
    fn test_commit_never_moves_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let mut cursor = UploadCursor::load(dir.path());
        cursor.commit(10).unwrap();
        cursor.commit(5).unwrap();
        cursor.commit(10).unwrap();
        assert_eq!(cursor.committed(), 10);
        assert_eq!(cursor.batch_sequence(), 1);
    }

    #[test]
    fn test_corrupt_marker_reads_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(COMMITTED_MARKER), "not a number").unwrap();
        let cursor = UploadCursor::load(dir.path());
        assert_eq!(cursor.committed(), 0);
    }
}
