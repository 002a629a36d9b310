use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::snapshot::SnapshotSet;

/// Identifies what a cached snapshot was fetched for.
///
/// Coins are lowercased, sorted and deduplicated so that reorderings of the
/// same query share one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub coins: Vec<String>,
    pub currency: String,
}

impl CacheKey {
    pub fn new(coins: &[String], currency: &str) -> CacheKey {
        let mut coins: Vec<String> = coins
            .iter()
            .map(|coin| coin.trim().to_ascii_lowercase())
            .filter(|coin| !coin.is_empty())
            .collect();
        coins.sort();
        coins.dedup();
        CacheKey {
            coins,
            currency: currency.trim().to_ascii_lowercase(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: SnapshotSet,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => self.age(now) < max_age,
            // Larger than chrono can represent, so nothing is old enough.
            Err(_) => true,
        }
    }
}

/// Single-slot snapshot cache.
///
/// Writes swap the whole entry; readers hold an `Arc` to whichever entry was
/// current when they looked. Entries are never expired here, callers decide
/// what counts as stale.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: RwLock<Option<Arc<CacheEntry>>>,
}

impl SnapshotCache {
    pub fn new() -> SnapshotCache {
        SnapshotCache::default()
    }

    pub fn read(&self) -> Option<Arc<CacheEntry>> {
        self.slot.read().clone()
    }

    pub fn write(&self, key: CacheKey, data: SnapshotSet, fetched_at: DateTime<Utc>) {
        let entry = Arc::new(CacheEntry {
            key,
            data,
            fetched_at,
        });
        *self.slot.write() = Some(entry);
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.read()
            .map(|entry| entry.is_fresh(now, max_age))
            .unwrap_or(false)
    }

    /// The current entry if it is fresh and was fetched for `key`.
    pub fn read_fresh(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Option<Arc<CacheEntry>> {
        self.read()
            .filter(|entry| &entry.key == key && entry.is_fresh(now, max_age))
    }
}
