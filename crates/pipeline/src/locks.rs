//! Per-`(job, segment)` mutual exclusion.
//!
//! Two first-time calls for the same slot would otherwise both submit a
//! provider task. The second caller waits here, then finds the slot filled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use framechain_core::types::{JobId, SegmentIndex};
use tokio::sync::OwnedMutexGuard;

type SlotKey = (JobId, SegmentIndex);

/// A slot's mutex and the number of callers holding or waiting on it.
struct Slot {
    lock: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

#[derive(Default)]
pub struct SlotLocks {
    slots: Mutex<HashMap<SlotKey, Slot>>,
}

/// Held for the duration of one slot's generation. Dropping it releases the
/// slot and forgets the lock entry once no one else is waiting.
pub struct SlotGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _entry: SlotEntry<'a>,
}

/// A caller's interest in a slot's lock entry, holding or waiting.
struct SlotEntry<'a> {
    locks: &'a SlotLocks,
    key: SlotKey,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `(job_id, index)`.
    ///
    /// A caller dropped while still waiting also gives up its interest in
    /// the entry.
    pub async fn acquire(&self, job_id: JobId, index: SegmentIndex) -> SlotGuard<'_> {
        let key = (job_id, index);
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let slot = slots.entry(key).or_insert_with(|| Slot {
                lock: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.lock)
        };
        let entry = SlotEntry { locks: self, key };
        let guard = lock.lock_owned().await;
        SlotGuard {
            _guard: guard,
            _entry: entry,
        }
    }

    /// Number of slots with a live lock entry.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SlotEntry<'_> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}
