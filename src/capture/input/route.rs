//! Process-wide input routing
//!
//! The OS hook can only be installed once per process, but a new dispatcher
//! is built for every session. The route owns the one listener and forwards
//! its events to whichever dispatcher is currently attached.

use crate::capture::input::dispatcher::InputDispatcher;
use crate::capture::input::listener::spawn_listener;
use crate::capture::input::types::RawInputEvent;
use crate::recorder::channel::RecordingResult;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, OnceLock};

pub type EventCallback = Box<dyn FnMut(RawInputEvent) + Send + 'static>;
type Spawner = Box<dyn Fn(EventCallback) -> RecordingResult<()> + Send + Sync>;

pub struct InputRoute {
    target: RwLock<Option<Arc<InputDispatcher>>>,
    listening: Mutex<bool>,
    spawn: Spawner,
}

static GLOBAL_ROUTE: OnceLock<Arc<InputRoute>> = OnceLock::new();

impl InputRoute {
    /// Route backed by `spawn`, which installs a hook feeding the callback.
    pub fn new<S>(spawn: S) -> Self
    where
        S: Fn(EventCallback) -> RecordingResult<()> + Send + Sync + 'static,
    {
        Self {
            target: RwLock::new(None),
            listening: Mutex::new(false),
            spawn: Box::new(spawn),
        }
    }

    /// The route fed by the real OS hook
    pub fn global() -> Arc<InputRoute> {
        GLOBAL_ROUTE
            .get_or_init(|| Arc::new(InputRoute::new(|callback| spawn_listener(callback))))
            .clone()
    }

    /// Install the hook unless an earlier session already did.
    pub fn ensure_listening(self: &Arc<Self>) -> RecordingResult<()> {
        let mut listening = self.listening.lock();
        if *listening {
            return Ok(());
        }

        let route = Arc::downgrade(self);
        (self.spawn)(Box::new(move |event| {
            if let Some(route) = route.upgrade() {
                route.dispatch(event);
            }
        }))?;
        *listening = true;
        tracing::debug!("Input hook installed");
        Ok(())
    }

    pub fn attach(&self, dispatcher: Arc<InputDispatcher>) {
        *self.target.write() = Some(dispatcher);
    }

    /// Detach `dispatcher` if it is still the current target.
    pub fn detach(&self, dispatcher: &Arc<InputDispatcher>) {
        let mut target = self.target.write();
        if target.as_ref().is_some_and(|t| Arc::ptr_eq(t, dispatcher)) {
            *target = None;
        }
    }

    pub fn dispatch(&self, event: RawInputEvent) {
        let target = self.target.read().clone();
        if let Some(dispatcher) = target {
            dispatcher.handle(event);
        }
    }
}
