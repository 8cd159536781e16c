//! Small shared helpers: observer fan-out and callback isolation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// Runs an application-provided callback, swallowing a panic so that
/// library invariants (broadcast loops, termination sweeps) keep running.
pub(crate) fn run_callback(what: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!("{what} callback panicked; ignoring");
    }
}

/// Fan-out list of observers. Notification invokes every registered
/// observer in registration order; a panicking observer is isolated.
pub(crate) struct Listeners<L: ?Sized> {
    items: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> Listeners<L> {
    pub(crate) fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: Arc<L>) {
        self.items.lock().push(listener);
    }

    pub(crate) fn notify(&self, f: impl Fn(&L)) {
        let items = self.items.lock().clone();
        for listener in &items {
            run_callback("listener", || f(listener.as_ref()));
        }
    }
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> std::fmt::Debug for Listeners<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.items.lock().len())
            .finish()
    }
}
