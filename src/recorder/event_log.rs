//! Session event log
//!
//! The single serialization point for finished actions. Each record is
//! appended to the real-time NDJSON log and the in-memory buffer under one
//! lock, then broadcast to observers. At session end the buffer is written
//! out as one pretty-printed JSON array.

use crate::recorder::channel::RecordingResult;
use crate::recorder::record::ActionRecord;
use crate::session::Session;
use chrono::Local;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const OBSERVER_CAPACITY: usize = 256;

pub struct EventRecorder {
    session: Arc<Session>,
    buffer: Mutex<Vec<ActionRecord>>,
    observers: broadcast::Sender<String>,
}

impl EventRecorder {
    #[cfg(test)]
    pub(crate) fn new(session: Arc<Session>) -> Self {
        let (observers, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self::with_observers(session, observers)
    }

    /// Broadcast records on an existing channel, so observers can subscribe
    /// before the session exists.
    pub fn with_observers(session: Arc<Session>, observers: broadcast::Sender<String>) -> Self {
        Self {
            session,
            buffer: Mutex::new(Vec::new()),
            observers,
        }
    }

    /// Receive every record, serialized, as it is appended
    #[cfg(test)]
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<String> {
        self.observers.subscribe()
    }

    pub fn record(&self, record: ActionRecord) -> RecordingResult<()> {
        let line = serde_json::to_string(&record)?;

        {
            let mut buffer = self.buffer.lock();
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.session.realtime_log_path())?;
            writeln!(file, "{}", line)?;
            buffer.push(record);
        }

        tracing::info!("Recorded action: {}", line);

        // No subscribers is fine.
        let _ = self.observers.send(line);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Write the consolidated log and clear the buffer.
    ///
    /// Returns `None` when nothing was recorded.
    pub fn finalize(&self) -> RecordingResult<Option<PathBuf>> {
        let records = std::mem::take(&mut *self.buffer.lock());
        if records.is_empty() {
            tracing::info!("No actions recorded; skipping consolidated log");
            return Ok(None);
        }

        let path = self.session.log_dir().join(format!(
            "user_actions_{}.json",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let data = serde_json::to_vec_pretty(&records)?;
        std::fs::write(&path, data)?;

        tracing::info!(
            "Wrote {} actions to {}",
            records.len(),
            path.display()
        );
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::record::{ActionContent, ActionType, ScreenPosition};

    fn record(timestamp: f64) -> ActionRecord {
        let position = ScreenPosition {
            x: 1.0,
            y: 2.0,
            max_x: 100.0,
            max_y: 100.0,
        };
        ActionRecord {
            timestamp,
            action_type: ActionType::MouseClick,
            action_content: ActionContent {
                position: Some(position),
                button: Some("left.press".to_string()),
                ..Default::default()
            },
            active_app: "unknown".to_string(),
            screenshot_path: "records/x/screenshots/original/a.jpg".to_string(),
            mouse_position: position,
        }
    }

    #[test]
    fn test_record_appends_ndjson_and_broadcasts() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::create(dir.path()).unwrap());
        let recorder = EventRecorder::new(session.clone());
        let mut rx = recorder.subscribe();

        recorder.record(record(1.0)).unwrap();
        recorder.record(record(2.0)).unwrap();

        let text = std::fs::read_to_string(session.realtime_log_path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: ActionRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.timestamp, 2.0);

        assert_eq!(rx.try_recv().unwrap(), lines[0]);
        assert_eq!(recorder.buffered(), 2);
    }

    #[test]
    fn test_finalize_writes_array_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::create(dir.path()).unwrap());
        let recorder = EventRecorder::new(session);

        recorder.record(record(1.0)).unwrap();
        let path = recorder.finalize().unwrap().expect("consolidated log");
        let records: Vec<ActionRecord> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(recorder.buffered(), 0);

        assert!(recorder.finalize().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_records_are_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::create(dir.path()).unwrap());
        let recorder = Arc::new(EventRecorder::new(session.clone()));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        recorder.record(record((t * 100 + i) as f64)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = std::fs::read_to_string(session.realtime_log_path()).unwrap();
        assert_eq!(text.lines().count(), 100);
        for line in text.lines() {
            serde_json::from_str::<ActionRecord>(line).unwrap();
        }
    }
}
