//! Session property bag: a `string -> any` map applications use to tag
//! sessions (e.g. a subscription key).

use std::any::Any;
use std::collections::HashMap;

use parking_lot::Mutex;

/// Type-erased property store with typed access.
///
/// Reads are copies. There is no coercion: asking for the wrong type
/// behaves as if the key were absent.
#[derive(Default)]
pub struct PropertySet {
    values: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.values.lock().insert(key.into(), Box::new(value));
    }

    /// Typed read; `None` when the key is absent or holds another type.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.values
            .lock()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Whether `key` holds a `T` equal to `expected`.
    pub fn matches<T: PartialEq + 'static>(&self, key: &str, expected: &T) -> bool {
        self.values
            .lock()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .is_some_and(|v| v == expected)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.values.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.values.lock().clear();
    }
}

impl std::fmt::Debug for PropertySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self.values.lock();
        f.debug_struct("PropertySet")
            .field("keys", &values.keys().collect::<Vec<_>>())
            .finish()
    }
}
