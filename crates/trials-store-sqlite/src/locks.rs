//! Per-key async exclusion.
//!
//! Writers touching the same `nct_id` take the same lock; writers on
//! different ids never share one. Entries are held weakly and pruned once no
//! task holds or awaits them.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError, Weak},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct KeyedLocks {
  inner: Arc<Mutex<HashMap<String, Weak<AsyncMutex<()>>>>>,
}

/// Held for the duration of one keyed operation.
pub struct KeyGuard {
  _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
  pub fn new() -> Self { Self::default() }

  /// Wait until `key` is free and take it.
  pub async fn acquire(&self, key: &str) -> KeyGuard {
    let lock = {
      let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
      map.retain(|_, weak| weak.strong_count() > 0);
      match map.get(key).and_then(Weak::upgrade) {
        Some(lock) => lock,
        None => {
          let lock = Arc::new(AsyncMutex::new(()));
          map.insert(key.to_owned(), Arc::downgrade(&lock));
          lock
        }
      }
    };

    KeyGuard { _guard: lock.lock_owned().await }
  }

  /// Number of keys currently held or awaited.
  #[cfg(test)]
  fn live_keys(&self) -> usize {
    let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    map.values().filter(|weak| weak.strong_count() > 0).count()
  }
}
