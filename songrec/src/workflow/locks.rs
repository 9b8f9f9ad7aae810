//! Per-canonical-name mutual exclusion
//!
//! Compare-and-place in a target folder must not interleave for the same
//! canonical name, otherwise two workers can both observe "no existing
//! file" and both place. Different names never contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<PathBuf, Arc<AsyncMutex<()>>>;

/// Held while a name is being resolved in a folder
///
/// Dropping the last guard or waiter for a name removes its map entry.
#[derive(Debug)]
pub struct NameGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: PathBuf,
    map: Arc<Mutex<LockMap>>,
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        if map.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            map.remove(&self.key);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `canonical_name` inside `folder`
    pub async fn lock(&self, folder: &Path, canonical_name: &str) -> NameGuard {
        let key = folder.join(canonical_name);
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.clone()).or_default().clone()
        };
        NameGuard {
            guard: Some(slot.lock_owned().await),
            key,
            map: self.inner.clone(),
        }
    }

    /// Names currently locked or waited on
    pub fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
