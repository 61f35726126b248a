//! Numeric handle registry
//!
//! Maps opaque `i64` handles to values for callers that cannot hold Rust
//! references, such as managed code. Handles start at 1, so 0 never names a
//! value.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Thread-safe registry mapping numeric handles to values.
pub struct HandleRegistry<T> {
    map: DashMap<i64, T>,
    next_id: AtomicI64,
}

impl<T> HandleRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert a value and return its handle.
    pub fn insert(&self, value: T) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.map.insert(id, value);
        id
    }

    /// Remove a value by handle, returning it.
    pub fn remove(&self, id: i64) -> Option<T> {
        self.map.remove(&id).map(|(_, value)| value)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no handle is live
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<T: Clone> HandleRegistry<T> {
    /// Copy of the value behind `id`.
    ///
    /// The shard lock is released before this returns, so the caller may
    /// re-enter the registry while using the value.
    pub fn get_cloned(&self, id: i64) -> Option<T> {
        self.map.get(&id).map(|entry| entry.value().clone())
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
