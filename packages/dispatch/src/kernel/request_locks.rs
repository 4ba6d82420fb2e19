//! Per-request mutual exclusion for dispatch rounds.
//!
//! A round reads the ledger, diffs and merges across several tiers without a
//! transaction. Two concurrent rounds on the same request would see the same
//! `matched_donors` set and overshoot the cap, so rounds (and disables) for one
//! request queue behind a single mutex. Different requests never contend.
//!
//! Entries live in a `DashMap` and are dropped as soon as no round holds or
//! waits on them, so the registry only ever contains in-flight requests.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::common::RequestId;

type LockMap = DashMap<RequestId, Arc<Mutex<()>>>;

/// Registry of per-request locks, cheap to clone and share.
#[derive(Clone, Default)]
pub struct RequestLocks {
    locks: Arc<LockMap>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder exists for `request_id`, then holds it
    /// until the returned guard is dropped.
    pub async fn acquire(&self, request_id: RequestId) -> RequestGuard {
        let mutex = self
            .locks
            .entry(request_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;
        trace!(request_id = %request_id, "Request lock acquired");

        RequestGuard {
            request_id,
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of requests currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held for the duration of one round; releases on drop, on every exit path.
pub struct RequestGuard {
    request_id: RequestId,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        // The owned guard keeps its own Arc to the mutex; release it first so
        // a strong count of 1 means only the registry still references it.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.request_id, |_, mutex| Arc::strong_count(mutex) == 1);
        trace!(request_id = %self.request_id, "Request lock released");
    }
}
