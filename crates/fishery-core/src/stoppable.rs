//! Cancellation handles for scheduled actions.

use std::cell::Cell;
use std::rc::Rc;

/// A cancellation handle returned by every scheduling call.
///
/// Clones share one flag. Stopping is idempotent and may happen at any
/// time, including from inside the action the handle belongs to; the
/// scheduler drops a stopped action the next time it would have fired.
#[derive(Debug, Clone, Default)]
pub struct Stoppable {
    stopped: Rc<Cell<bool>>,
}

impl Stoppable {
    /// Create a handle that is not stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the action. Repeated calls are no-ops.
    pub fn stop(&self) {
        self.stopped.set(true);
    }

    /// Whether [`stop`](Self::stop) has been called on any clone.
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}
