//! # Comparison Cache
//!
//! Process-wide store of comparison results keyed by
//! `(normalized left, normalized right, context, threshold)`.
//!
//! Locking is per key. A short synchronous lock on the slot map hands out
//! the key's slot, and the slot's async mutex is then held across the
//! check-compute-insert sequence, so two concurrent requests for the same
//! inputs make one high-fidelity call while unrelated keys proceed in
//! parallel. If the holder is cancelled mid-call the slot is simply left
//! as it was.
//!
//! Every [`PURGE_INTERVAL`] stores the cache drops expired slots, and a
//! slot left empty by a computation that was not stored is released, so a
//! long-lived comparator stays bounded by its live entries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tfcheck_core::Clock;

use crate::comparator::Comparison;

/// Number of stores between automatic purges of expired slots.
pub const PURGE_INTERVAL: usize = 256;

/// Cache key. The threshold is stored in ten-thousandths so it can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    left: String,
    right: String,
    context: String,
    threshold_bp: u32,
}

impl CacheKey {
    /// Build a key from already-normalized text.
    pub fn new(left: &str, right: &str, context: &str, threshold: f64) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            context: context.to_ascii_lowercase(),
            threshold_bp: (threshold.clamp(0.0, 1.0) * 10_000.0).round() as u32,
        }
    }
}

/// A stored result and when it was stored.
#[derive(Debug, Clone)]
pub struct CachedComparison {
    pub result: Comparison,
    pub stored_at: DateTime<Utc>,
}

/// One key's slot. Held locked while the value for that key is computed.
pub type Slot = Arc<tokio::sync::Mutex<Option<CachedComparison>>>;

/// TTL cache with per-key locking.
#[derive(Debug)]
pub struct ComparisonCache {
    slots: parking_lot::Mutex<HashMap<CacheKey, Slot>>,
    stores: AtomicUsize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ComparisonCache {
    /// Empty cache whose entries live for `ttl` as measured by `clock`.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: parking_lot::Mutex::new(HashMap::new()),
            stores: AtomicUsize::new(0),
            ttl,
            clock,
        }
    }

    /// The slot for `key`, created empty if absent.
    pub fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// The entry's result if it has not outlived the TTL.
    pub fn fresh(&self, entry: &Option<CachedComparison>) -> Option<Comparison> {
        let entry = entry.as_ref()?;
        if self.clock.now() - entry.stored_at < self.ttl {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    /// Wrap a result for storage, stamped with the current time.
    pub fn stamp(&self, result: Comparison) -> CachedComparison {
        CachedComparison {
            result,
            stored_at: self.clock.now(),
        }
    }

    /// Look up a fresh entry.
    pub async fn get(&self, key: &CacheKey) -> Option<Comparison> {
        let slot = self.slot(key);
        let entry = slot.lock().await;
        self.fresh(&entry)
    }

    /// Store a result, replacing whatever was there.
    pub async fn insert(&self, key: &CacheKey, result: Comparison) {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;
        *entry = Some(self.stamp(result));
        drop(entry);
        self.record_store();
    }

    /// Count one store and purge expired slots every [`PURGE_INTERVAL`]
    /// stores. Call with no slot guard held.
    pub fn record_store(&self) {
        let n = self.stores.fetch_add(1, Ordering::Relaxed) + 1;
        if n % PURGE_INTERVAL == 0 {
            self.purge_expired();
        }
    }

    /// Drop `key`'s slot if it is still empty and nobody else holds it.
    /// Call after releasing the slot's guard.
    pub fn release(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.slots.lock();
        let idle = slots.get(key).is_some_and(|s| {
            Arc::ptr_eq(s, slot)
                && Arc::strong_count(slot) == 2
                && s.try_lock().is_ok_and(|entry| entry.is_none())
        });
        if idle {
            slots.remove(key);
        }
    }

    /// Number of slots held, live or not.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Number of fresh entries. Slots currently being computed are not counted.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .map(|entry| self.fresh(&entry).is_some())
                    .unwrap_or(false)
            })
            .count()
    }

    /// Whether there are no fresh entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired and empty slots. Slots currently locked are kept.
    /// Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => self.fresh(&entry).is_some(),
            Err(_) => true,
        });
        let removed = before - slots.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = slots.len(), "comparison cache purged");
        }
        removed
    }
}
