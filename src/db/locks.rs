//! Per-record lock table.
//!
//! Every mutating transition holds the lock for its customer id across the
//! whole read-decide-write sequence. Locks on different ids are
//! independent, so unrelated licenses proceed in parallel. Entries are
//! never evicted; the table grows with the number of distinct licenses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{AppError, Result};

pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct KeyLocks {
    table: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    wait: Duration,
}

impl KeyLocks {
    pub fn new(wait: Duration) -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            wait,
        }
    }

    /// Acquire the lock for `key`, waiting at most the configured bound.
    /// An acquisition that cannot complete in time fails with `Contention`
    /// instead of hanging.
    pub async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut table = self.table.lock().expect("lock table poisoned");
            table
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        tokio::time::timeout(self.wait, lock.lock_owned())
            .await
            .map_err(|_| AppError::Contention)
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_WAIT)
    }
}
