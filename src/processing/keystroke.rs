//! Typing burst coalescing
//!
//! Key presses are canonicalized and buffered until the keyboard has been
//! idle for the flush delay, then emitted as one `key_press` action carrying
//! the space-joined symbols and the screen as it was when the burst began.

use super::{canonical_symbol, epoch_seconds, ActionKind, ActionSink, FlushTimer, Frame, PendingAction};
use crate::capture::input::types::RawKey;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

#[derive(Default)]
struct KeyBurst {
    buffer: String,
    frame: Option<Frame>,
    last_press: Option<SystemTime>,
    /// Generation of the most recent arm; firings with any other value are stale
    armed_generation: Option<u64>,
}

struct CoalescerInner {
    sink: Arc<dyn ActionSink>,
    burst: Mutex<KeyBurst>,
}

impl CoalescerInner {
    fn on_timer(&self, generation: u64) {
        let mut burst = self.burst.lock();
        if burst.armed_generation != Some(generation) {
            tracing::trace!("Ignoring stale keystroke timer (generation {})", generation);
            return;
        }
        self.flush_locked(&mut burst);
    }

    fn flush_locked(&self, burst: &mut KeyBurst) {
        let taken = std::mem::take(burst);
        let keys = taken.buffer.trim();
        if keys.is_empty() {
            return;
        }

        let timestamp = taken
            .last_press
            .map(epoch_seconds)
            .unwrap_or_else(super::now_epoch_seconds);

        self.sink.emit(PendingAction {
            timestamp,
            kind: ActionKind::KeyPress {
                keys: keys.to_string(),
            },
            frame: taken.frame,
        });
    }
}

pub struct KeystrokeCoalescer {
    inner: Arc<CoalescerInner>,
    timer: FlushTimer,
    flush_delay: Duration,
}

impl KeystrokeCoalescer {
    pub fn new(sink: Arc<dyn ActionSink>, flush_delay: Duration) -> std::io::Result<Self> {
        let inner = Arc::new(CoalescerInner {
            sink,
            burst: Mutex::new(KeyBurst::default()),
        });

        // Weak so the timer thread does not keep the coalescer alive.
        let weak: Weak<CoalescerInner> = Arc::downgrade(&inner);
        let timer = FlushTimer::spawn("keystroke-flush", move |generation| {
            if let Some(inner) = weak.upgrade() {
                inner.on_timer(generation);
            }
        })?;

        Ok(Self {
            inner,
            timer,
            flush_delay,
        })
    }

    pub fn on_key(&self, raw: &RawKey, time: SystemTime) {
        let symbol = canonical_symbol(raw);
        let mut burst = self.inner.burst.lock();

        if burst.buffer.is_empty() {
            burst.frame = self.inner.sink.capture_frame();
        }
        burst.buffer.push_str(&symbol);
        burst.buffer.push(' ');
        burst.last_press = Some(time);
        burst.armed_generation = Some(self.timer.arm(self.flush_delay));
    }

    /// Emit the pending burst now. No-op when nothing is buffered.
    pub fn flush(&self) {
        self.timer.cancel();
        let mut burst = self.inner.burst.lock();
        self.inner.flush_locked(&mut burst);
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> String {
        self.inner.burst.lock().buffer.trim().to_string()
    }

    /// Flush and stop the timer thread. Must not be called with the burst lock held.
    pub fn shutdown(&self) {
        self.flush();
        self.timer.shutdown();
    }
}
