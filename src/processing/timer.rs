//! Cancellable, re-armable single-shot timer
//!
//! Each `arm` replaces the previous deadline and returns a new generation.
//! When the deadline passes the callback receives that generation; callers
//! compare it against the generation they stored under their own lock, so a
//! firing that races with a manual flush or a re-arm is simply ignored.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct TimerState {
    deadline: Option<Instant>,
    generation: u64,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

pub struct FlushTimer {
    shared: Arc<TimerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FlushTimer {
    /// Spawn the timer thread. `on_fire` runs on that thread.
    pub fn spawn<F>(name: &str, on_fire: F) -> std::io::Result<Self>
    where
        F: Fn(u64) + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                deadline: None,
                generation: 0,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });

        let worker = shared.clone();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_timer(worker, on_fire))?;

        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Fire once after `delay`, replacing any pending deadline.
    pub fn arm(&self, delay: Duration) -> u64 {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.deadline = Some(Instant::now() + delay);
        self.shared.wakeup.notify_one();
        state.generation
    }

    /// Drop the pending deadline, if any.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.deadline = None;
        self.shared.wakeup.notify_one();
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Stop the timer thread without firing.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.deadline = None;
            self.shared.wakeup.notify_one();
        }
        if let Some(handle) = self.handle.lock().take() {
            // The callback may itself be what is shutting us down.
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer<F>(shared: Arc<TimerShared>, on_fire: F)
where
    F: Fn(u64),
{
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        match state.deadline {
            None => {
                shared.wakeup.wait(&mut state);
            }
            Some(deadline) if Instant::now() < deadline => {
                shared.wakeup.wait_until(&mut state, deadline);
            }
            Some(_) => {
                state.deadline = None;
                let generation = state.generation;
                // Release the lock so the callback can re-arm or cancel.
                drop(state);
                on_fire(generation);
                state = shared.state.lock();
            }
        }
    }
}
