//! Key-value cache with per-entry time-to-live.
//!
//! Expired entries are absent on read even before they are physically
//! removed. Storage and eviction are delegated to `moka`; each entry carries
//! its own TTL, applied through an [`Expiry`] policy.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache as MokaCache;
use tracing::debug;

/// Injected cache interface; swap in any backend without touching the core.
pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    /// Last write wins for concurrent sets on the same key.
    fn set(&self, key: String, value: V, ttl: Duration);
    /// Runs pending maintenance so expired entries are evicted now.
    fn purge_expired(&self);
}

#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= self.ttl
    }
}

/// Expiry that reads the TTL stored on each entry. An overwrite restarts it.
struct PerEntryTtl;

impl<V> Expiry<String, CacheEntry<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded in-memory TTL cache over `moka::sync::Cache`.
pub struct TtlCache<V> {
    inner: MokaCache<String, CacheEntry<V>>,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }

    /// Approximate entry count; settles after [`Cache::purge_expired`].
    pub fn len(&self) -> u64 {
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone + Send + Sync + 'static> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> Cache<V> for TtlCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let entry = self.inner.get(key)?;
        // moka's timer granularity is coarse; honour the exact TTL here.
        if entry.is_expired(Instant::now()) {
            self.inner.invalidate(key);
            return None;
        }
        Some(entry.value)
    }

    fn set(&self, key: String, value: V, ttl: Duration) {
        self.inner.insert(
            key,
            CacheEntry {
                value,
                created: Instant::now(),
                ttl,
            },
        );
    }

    fn purge_expired(&self) {
        self.inner.run_pending_tasks();
        debug!(entries = self.inner.entry_count(), "cache maintenance ran");
    }
}
