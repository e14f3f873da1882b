//! Run-wide key → id cache that is aware of the entry transaction.
//!
//! Ids looked up or created inside an open transaction are kept pending and
//! only become permanent once the transaction commits. A rollback drops
//! them, so no id of a row that was never committed survives in the cache.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct Maps {
    committed: HashMap<String, i32>,
    pending: HashMap<String, i32>,
}

#[derive(Debug, Default)]
pub struct IdCache {
    maps: Mutex<Maps>,
}

impl IdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<i32> {
        let maps = self.maps.lock().unwrap_or_else(PoisonError::into_inner);
        maps.committed
            .get(key)
            .or_else(|| maps.pending.get(key))
            .copied()
    }

    pub fn insert_pending(&self, key: &str, id: i32) {
        let mut maps = self.maps.lock().unwrap_or_else(PoisonError::into_inner);
        maps.pending.insert(key.to_string(), id);
    }

    /// Promote pending ids after the transaction committed.
    pub fn commit(&self) {
        let mut maps = self.maps.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = std::mem::take(&mut maps.pending);
        maps.committed.extend(pending);
    }

    /// Forget pending ids after the transaction rolled back.
    pub fn discard(&self) {
        let mut maps = self.maps.lock().unwrap_or_else(PoisonError::into_inner);
        maps.pending.clear();
    }

    pub fn committed_len(&self) -> usize {
        self.maps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .committed
            .len()
    }
}
