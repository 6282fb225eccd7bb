//! Run-wide set of seen link keys

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Set of dedup keys shared by every fetch task in a run
///
/// The only mutation is [`SeenKeys::insert`], which checks and inserts under
/// a single lock, so a key is accepted at most once across all tasks.
#[derive(Debug, Clone, Default)]
pub struct SeenKeys {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl SeenKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`, returning `true` if it had not been seen before
    pub fn insert(&self, key: &str) -> bool {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if keys.contains(key) {
            return false;
        }
        keys.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
