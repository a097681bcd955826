use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::StorageError;
use crate::models::ShowId;

#[derive(Debug, Default)]
struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    // requests holding or waiting for `mutex`
    users: usize,
}

type Slots = Arc<Mutex<HashMap<ShowId, Slot>>>;

/// Per-show mutual exclusion for the check-and-commit sequence inside one process.
///
/// Waiting is bounded: a request that cannot get in within `max_wait` never starts.
/// The Postgres store still takes its own row lock, so this only orders requests
/// within the process and keeps blocked requests off the connection pool.
///
/// A show only has a slot while some request holds or waits for it.
#[derive(Debug)]
pub struct ShowGate {
    slots: Slots,
    max_wait: Duration,
}

// One registered user of a show's slot. Dropping it forgets the show once the
// last user is gone, including waiters whose future was dropped mid-wait.
#[derive(Debug)]
struct SlotUse {
    show_id: ShowId,
    slots: Slots,
}

impl Drop for SlotUse {
    fn drop(&mut self) {
        let Ok(mut slots) = self.slots.lock() else { return };
        if let Some(slot) = slots.get_mut(&self.show_id) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                slots.remove(&self.show_id);
            }
        }
    }
}

/// Held while the critical section for one show runs.
#[derive(Debug)]
pub struct ShowPermit {
    pub show_id: ShowId,
    // fields drop in order: unlock first, then unregister
    _guard: OwnedMutexGuard<()>,
    _slot: SlotUse,
}

impl ShowGate {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            max_wait,
        }
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Number of shows currently held or waited on.
    pub fn tracked_shows(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    pub async fn enter(&self, show_id: ShowId) -> Result<ShowPermit, StorageError> {
        let (mutex, slot_use) = {
            let mut slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
            let slot = slots.entry(show_id).or_default();
            slot.users += 1;
            let slot_use = SlotUse {
                show_id,
                slots: self.slots.clone(),
            };
            (slot.mutex.clone(), slot_use)
        };

        match tokio::time::timeout(self.max_wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(ShowPermit {
                show_id,
                _guard: guard,
                _slot: slot_use,
            }),
            Err(_) => {
                tracing::warn!("show {} gate wait exceeded {:?}", show_id, self.max_wait);
                Err(StorageError::LockTimeout(self.max_wait))
            }
        }
    }
}
