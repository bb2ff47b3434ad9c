//! Scroll burst accumulation
//!
//! Same-direction wheel deltas that arrive without the pointer wandering
//! are summed into one `mouse_scroll` action. A direction change or a pointer
//! move beyond the distance threshold flushes the running burst before the
//! new delta is taken; a watchdog flushes bursts that go quiet.

use super::{now_epoch_seconds, ActionKind, ActionSink, Frame, PendingAction};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    fn of(dy: i64) -> Self {
        if dy > 0 {
            ScrollDirection::Up
        } else {
            ScrollDirection::Down
        }
    }
}

struct Accumulation {
    direction: ScrollDirection,
    accumulated_dy: i64,
    position: (f64, f64),
    last_event: Instant,
    frame: Option<Frame>,
}

pub struct ScrollAccumulator {
    sink: Arc<dyn ActionSink>,
    distance_threshold: f64,
    state: Mutex<Option<Accumulation>>,
}

impl ScrollAccumulator {
    pub fn new(sink: Arc<dyn ActionSink>, distance_threshold: f64) -> Self {
        Self {
            sink,
            distance_threshold,
            state: Mutex::new(None),
        }
    }

    pub fn on_scroll(&self, x: f64, y: f64, dy: i64) {
        self.on_scroll_at(x, y, dy, Instant::now());
    }

    fn on_scroll_at(&self, x: f64, y: f64, dy: i64, now: Instant) {
        if dy == 0 {
            return;
        }

        let direction = ScrollDirection::of(dy);
        let mut state = self.state.lock();

        if let Some(acc) = state.as_mut() {
            let moved = (x - acc.position.0).abs() > self.distance_threshold
                || (y - acc.position.1).abs() > self.distance_threshold;

            if acc.direction == direction && !moved {
                acc.accumulated_dy += dy;
                acc.position = (x, y);
                acc.last_event = now;
                return;
            }

            tracing::debug!(
                "Scroll burst broken (direction_changed={}, moved={})",
                acc.direction != direction,
                moved
            );
            if let Some(done) = state.take() {
                self.emit(done);
            }
        }

        *state = Some(Accumulation {
            direction,
            accumulated_dy: dy,
            position: (x, y),
            last_event: now,
            frame: self.sink.capture_frame(),
        });
    }

    /// Emit the running burst, if any. Idempotent.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        if let Some(done) = state.take() {
            self.emit(done);
        }
    }

    /// Flush when the burst has been quiet for longer than `timeout`.
    pub fn flush_if_idle(&self, timeout: Duration) -> bool {
        self.flush_if_idle_at(Instant::now(), timeout)
    }

    fn flush_if_idle_at(&self, now: Instant, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        let idle = state
            .as_ref()
            .map(|acc| now.saturating_duration_since(acc.last_event) > timeout)
            .unwrap_or(false);
        if idle {
            if let Some(done) = state.take() {
                tracing::debug!("Scroll burst timed out");
                self.emit(done);
            }
        }
        idle
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        self.state.lock().is_some()
    }

    // Called with the state lock held so a concurrent flush cannot reorder
    // actions on the log.
    fn emit(&self, acc: Accumulation) {
        self.sink.emit(PendingAction {
            timestamp: now_epoch_seconds(),
            kind: ActionKind::Scroll {
                dx: 0,
                dy: acc.accumulated_dy,
                x: acc.position.0,
                y: acc.position.1,
            },
            frame: acc.frame,
        });
    }
}

/// Background poller that flushes idle scroll bursts
pub struct ScrollWatchdog {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScrollWatchdog {
    pub fn spawn(
        accumulator: Arc<ScrollAccumulator>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = std::thread::Builder::new()
            .name("scroll-watchdog".to_string())
            .spawn(move || {
                tracing::debug!(
                    "Scroll watchdog started (timeout={:?}, poll_interval={:?})",
                    timeout,
                    poll_interval
                );
                while flag.load(Ordering::Relaxed) {
                    accumulator.flush_if_idle(timeout);
                    std::thread::sleep(poll_interval);
                }
                tracing::debug!("Scroll watchdog stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ScrollWatchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
