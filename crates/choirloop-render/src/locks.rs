//! Per-fingerprint render locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use choirloop_spec::Fingerprint;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// In-process registry handing out one async lock per fingerprint.
///
/// Entries are weak; a fingerprint's lock disappears once no render holds
/// or waits on it.
#[derive(Debug, Default)]
pub struct FingerprintLocks {
    locks: Mutex<HashMap<Fingerprint, Weak<AsyncMutex<()>>>>,
}

/// Exclusive right to render one fingerprint; released on drop.
#[derive(Debug)]
pub struct RenderPermit {
    _guard: OwnedMutexGuard<()>,
    waited: bool,
}

impl RenderPermit {
    /// Whether another render held the lock when this one asked for it.
    pub fn waited(&self) -> bool {
        self.waited
    }
}

impl FingerprintLocks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other render of `fingerprint` is in flight.
    pub async fn acquire(&self, fingerprint: &Fingerprint) -> RenderPermit {
        let lock = self.lock_for(fingerprint);
        match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => RenderPermit {
                _guard: guard,
                waited: false,
            },
            Err(_) => {
                log::info!(
                    "[{}] Waiting for in-flight render",
                    fingerprint.short()
                );
                RenderPermit {
                    _guard: lock.lock_owned().await,
                    waited: true,
                }
            }
        }
    }

    /// Number of fingerprints currently locked or awaited.
    pub fn active(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| lock.strong_count() > 0);
        locks.len()
    }

    fn lock_for(&self, fingerprint: &Fingerprint) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(fingerprint).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);

        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(fingerprint.clone(), Arc::downgrade(&lock));
        lock
    }
}
