//! Batch archive assembly
//!
//! A batch is a 1-based inclusive range over the session's sorted original
//! screenshots. The archive holds those screenshots, their annotated
//! counterparts and the same line range of the real-time log.

use crate::recorder::channel::{RecordingError, RecordingResult};
use crate::session::Session;
use crate::storage::annotated_name;
use std::fs::{self, File};
use std::io::{self, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Plain screenshots of the session, sorted by name (which sorts by time)
pub fn list_originals(session: &Session) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(session.original_dir())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .map(|n| n.to_string_lossy().ends_with("_no_info.jpg"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// What went into an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub screenshots: usize,
    pub annotated: usize,
    pub log_lines: usize,
}

/// Write the zip for `range` (1-based, inclusive) of `originals` to `out`.
pub fn build_archive(
    session: &Session,
    originals: &[PathBuf],
    range: RangeInclusive<usize>,
    out: &Path,
) -> RecordingResult<ArchiveSummary> {
    let (start, end) = (*range.start(), *range.end());
    if start == 0 || end < start || end > originals.len() {
        return Err(RecordingError::PackagingError(format!(
            "Invalid batch range {}..={} over {} screenshots",
            start,
            end,
            originals.len()
        )));
    }

    let mut zip = ZipWriter::new(File::create(out)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut summary = ArchiveSummary {
        screenshots: 0,
        annotated: 0,
        log_lines: 0,
    };

    for plain in &originals[start - 1..end] {
        let name = file_name(plain);
        add_file(&mut zip, options, &format!("screenshots/original/{}", name), plain)?;
        summary.screenshots += 1;

        let annotated = annotated_name(&name).map(|n| session.annotated_dir().join(n));
        match annotated {
            Some(path) if path.is_file() => {
                add_file(
                    &mut zip,
                    options,
                    &format!("screenshots/annotated/{}", file_name(&path)),
                    &path,
                )?;
                summary.annotated += 1;
            }
            _ => tracing::warn!("No annotated counterpart for {}", name),
        }
    }

    let log_path = session.realtime_log_path();
    if log_path.is_file() {
        let text = fs::read_to_string(log_path)?;
        // Log lines past the end of the file are simply absent.
        let lines: Vec<&str> = text
            .lines()
            .skip(start - 1)
            .take(end - start + 1)
            .collect();
        zip.start_file(format!("log/{}", file_name(log_path)), options)
            .map_err(zip_error)?;
        for line in &lines {
            writeln!(zip, "{}", line)?;
        }
        summary.log_lines = lines.len();
    }

    zip.finish().map_err(zip_error)?;
    tracing::info!(
        "Packaged batch {}..={} ({} screenshots, {} annotated, {} log lines)",
        start,
        end,
        summary.screenshots,
        summary.annotated,
        summary.log_lines
    );
    Ok(summary)
}

fn add_file(
    zip: &mut ZipWriter<File>,
    options: FileOptions,
    name: &str,
    path: &Path,
) -> RecordingResult<()> {
    zip.start_file(name, options).map_err(zip_error)?;
    let bytes = fs::read(path)?;
    zip.write_all(&bytes)?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn zip_error(e: zip::result::ZipError) -> RecordingError {
    RecordingError::PackagingError(e.to_string())
}
