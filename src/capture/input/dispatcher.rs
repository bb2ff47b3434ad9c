//! Routes raw input events to the coalescers
//!
//! Clicks pass straight through to the sink. Any click or key event first
//! force-flushes a pending scroll burst so the log stays in causal order.

use crate::capture::input::pointer::PointerTracker;
use crate::capture::input::types::RawInputEvent;
use crate::config::AgentConfig;
use crate::processing::{
    epoch_seconds, ActionKind, ActionSink, KeystrokeCoalescer, PendingAction, ScrollAccumulator,
    ScrollWatchdog,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct InputDispatcher {
    sink: Arc<dyn ActionSink>,
    pointer: Arc<PointerTracker>,
    scroll: Arc<ScrollAccumulator>,
    keys: KeystrokeCoalescer,
    watchdog: Mutex<Option<ScrollWatchdog>>,
    scroll_timeout: Duration,
    scroll_poll: Duration,
    enabled: AtomicBool,
}

impl InputDispatcher {
    pub fn new(
        sink: Arc<dyn ActionSink>,
        pointer: Arc<PointerTracker>,
        config: &AgentConfig,
    ) -> std::io::Result<Self> {
        let scroll = Arc::new(ScrollAccumulator::new(
            sink.clone(),
            config.scroll.distance_threshold_px,
        ));
        let keys = KeystrokeCoalescer::new(sink.clone(), config.keystroke.flush_delay())?;

        Ok(Self {
            sink,
            pointer,
            scroll,
            keys,
            watchdog: Mutex::new(None),
            scroll_timeout: config.scroll.timeout(),
            scroll_poll: config.scroll.poll_interval(),
            enabled: AtomicBool::new(false),
        })
    }

    pub fn start(&self) -> std::io::Result<()> {
        let mut watchdog = self.watchdog.lock();
        if watchdog.is_none() {
            *watchdog = Some(ScrollWatchdog::spawn(
                self.scroll.clone(),
                self.scroll_timeout,
                self.scroll_poll,
            )?);
        }
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn handle(&self, event: RawInputEvent) {
        if !self.is_enabled() {
            return;
        }

        match event {
            RawInputEvent::PointerMoved { x, y } => self.pointer.update(x, y),
            RawInputEvent::Click {
                button,
                pressed,
                x,
                y,
                time,
            } => {
                self.pointer.update(x, y);
                self.scroll.flush();
                tracing::debug!("Mouse {} at ({}, {})", button.label(pressed), x, y);
                self.sink.emit(PendingAction {
                    timestamp: epoch_seconds(time),
                    kind: ActionKind::Click {
                        button: button.label(pressed),
                        x,
                        y,
                    },
                    frame: None,
                });
            }
            RawInputEvent::Scroll { dy, x, y, .. } => {
                self.pointer.update(x, y);
                // Horizontal-only wheel events carry dy == 0 and are ignored.
                self.scroll.on_scroll(x, y, dy);
            }
            RawInputEvent::Key { key, time } => {
                self.scroll.flush();
                self.keys.on_key(&key, time);
            }
        }
    }

    /// Flush both coalescers and stop accepting events.
    pub fn stop(&self) {
        self.scroll.flush();
        self.keys.flush();
        self.enabled.store(false, Ordering::SeqCst);

        if let Some(mut watchdog) = self.watchdog.lock().take() {
            watchdog.stop();
        }
        // Catch anything that slipped in between the flushes and the disable.
        self.scroll.flush();
        self.keys.shutdown();
        tracing::debug!("Input dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::input::types::{MouseButton, RawKey};
    use crate::processing::testing::RecordingSink;
    use std::time::SystemTime;

    fn dispatcher() -> (Arc<RecordingSink>, InputDispatcher) {
        let sink = Arc::new(RecordingSink::default());
        let mut config = AgentConfig::default();
        config.keystroke.flush_delay_ms = 10_000;
        config.scroll.timeout_ms = 10_000;
        let dispatcher =
            InputDispatcher::new(sink.clone(), Arc::new(PointerTracker::default()), &config).unwrap();
        dispatcher.start().unwrap();
        (sink, dispatcher)
    }

    fn scroll(dy: i64) -> RawInputEvent {
        RawInputEvent::Scroll {
            dx: 0,
            dy,
            x: 10.0,
            y: 10.0,
            time: SystemTime::now(),
        }
    }

    #[test]
    fn test_click_flushes_scroll_first() {
        let (sink, dispatcher) = dispatcher();
        dispatcher.handle(scroll(2));
        dispatcher.handle(scroll(2));
        dispatcher.handle(RawInputEvent::Click {
            button: MouseButton::Left,
            pressed: true,
            x: 10.0,
            y: 10.0,
            time: SystemTime::now(),
        });

        let kinds = sink.kinds();
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], ActionKind::Scroll { dy: 4, .. }));
        assert!(matches!(&kinds[1], ActionKind::Click { button, .. } if button == "left.press"));
        dispatcher.stop();
    }

    #[test]
    fn test_key_flushes_scroll_first() {
        let (sink, dispatcher) = dispatcher();
        dispatcher.handle(scroll(-1));
        dispatcher.handle(RawInputEvent::Key {
            key: RawKey::Char('k'),
            time: SystemTime::now(),
        });
        assert_eq!(sink.kinds().len(), 1);

        dispatcher.stop();
        let kinds = sink.kinds();
        assert_eq!(kinds.len(), 2);
        assert!(matches!(&kinds[1], ActionKind::KeyPress { keys } if keys == "k"));
    }

    #[test]
    fn test_stop_flushes_each_pending_burst_once() {
        let (sink, dispatcher) = dispatcher();
        dispatcher.handle(RawInputEvent::Key {
            key: RawKey::Char('a'),
            time: SystemTime::now(),
        });
        dispatcher.handle(scroll(1));

        dispatcher.stop();
        dispatcher.stop();

        let kinds = sink.kinds();
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], ActionKind::Scroll { dy: 1, .. }));
        assert!(matches!(&kinds[1], ActionKind::KeyPress { keys } if keys == "a"));
    }

    #[test]
    fn test_events_ignored_when_disabled() {
        let (sink, dispatcher) = dispatcher();
        dispatcher.stop();
        dispatcher.handle(scroll(3));
        dispatcher.handle(RawInputEvent::Click {
            button: MouseButton::Right,
            pressed: false,
            x: 0.0,
            y: 0.0,
            time: SystemTime::now(),
        });
        assert!(sink.kinds().is_empty());
    }

    #[test]
    fn test_pointer_moves_update_tracker() {
        let sink = Arc::new(RecordingSink::default());
        let pointer = Arc::new(PointerTracker::default());
        let dispatcher = InputDispatcher::new(sink, pointer.clone(), &AgentConfig::default()).unwrap();
        dispatcher.start().unwrap();

        dispatcher.handle(RawInputEvent::PointerMoved { x: 3.0, y: 4.0 });
        assert_eq!(pointer.position(), (3.0, 4.0));
        dispatcher.stop();
    }
}
