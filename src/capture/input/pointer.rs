use parking_lot::Mutex;

/// Last known pointer position, fed by move, click and scroll events
#[derive(Debug, Default)]
pub struct PointerTracker {
    position: Mutex<(f64, f64)>,
}

impl PointerTracker {
    pub fn update(&self, x: f64, y: f64) {
        *self.position.lock() = (x, y);
    }

    pub fn position(&self) -> (f64, f64) {
        *self.position.lock()
    }
}
