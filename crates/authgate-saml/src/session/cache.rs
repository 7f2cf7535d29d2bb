//! Time-bounded identity cache bridging the redirect login flow to the
//! out-of-band polling client.
//!
//! Every entry carries two independent timers: time-since-write (hard
//! ceiling on total lifetime) and time-since-last-read (idle timeout). An
//! entry is visible only while neither has elapsed. A read refreshes the
//! read timer but never the write timer, so an entry polled forever still
//! dies at the write ceiling, and an entry never polled dies at the idle
//! timeout. Expired entries are reaped lazily on access and periodically
//! by [`IdentityCache::sweep`].

use super::types::{Clock, IdentityRecord, SystemClock};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default write-expiry: 60 minutes.
pub const DEFAULT_WRITE_EXPIRY_SECS: i64 = 60 * 60;

/// Default read-expiry: 5 minutes.
pub const DEFAULT_READ_EXPIRY_SECS: i64 = 5 * 60;

/// Default sweep interval: 5 minutes. Must not exceed the shorter expiry
/// window or idle entries outlive their staleness bound.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone)]
struct CacheEntry {
    record: IdentityRecord,
    written_at: DateTime<Utc>,
    last_read_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>, write_expiry: Duration, read_expiry: Duration) -> bool {
        now - self.written_at > write_expiry || now - self.last_read_at > read_expiry
    }
}

/// In-memory identity cache with independent write-based and read-based
/// expiry. Operations never fail; a miss is an expected outcome.
pub struct IdentityCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    write_expiry: Duration,
    read_expiry: Duration,
    clock: Arc<dyn Clock>,
}

impl IdentityCache {
    /// Create a cache with the default expiry windows.
    #[must_use]
    pub fn new() -> Self {
        Self::with_expiry(
            Duration::seconds(DEFAULT_WRITE_EXPIRY_SECS),
            Duration::seconds(DEFAULT_READ_EXPIRY_SECS),
        )
    }

    /// Create a cache with custom expiry windows and the system clock.
    #[must_use]
    pub fn with_expiry(write_expiry: Duration, read_expiry: Duration) -> Self {
        Self::with_clock(write_expiry, read_expiry, Arc::new(SystemClock))
    }

    /// Create a cache with an injected clock.
    #[must_use]
    pub fn with_clock(
        write_expiry: Duration,
        read_expiry: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            write_expiry,
            read_expiry,
            clock,
        }
    }

    /// Unconditional upsert; resets both timers for `key`.
    pub async fn put(&self, key: &str, record: IdentityRecord) {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                record,
                written_at: now,
                last_read_at: now,
            },
        );
        tracing::debug!(key = %key, "Identity cached");
    }

    /// Return the record for `key` if present and unexpired.
    ///
    /// A successful read refreshes the read timer only. An expired entry
    /// is removed on the spot and reported as a miss, even if the
    /// periodic sweep has not run yet.
    pub async fn get(&self, key: &str) -> Option<IdentityRecord> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if entry.is_expired(now, self.write_expiry, self.read_expiry) => {
                entries.remove(key);
                tracing::debug!(key = %key, "Expired identity evicted on access");
                None
            }
            Some(entry) => {
                entry.last_read_at = now;
                Some(entry.record.clone())
            }
            None => None,
        }
    }

    /// Unconditional removal; no error when absent.
    pub async fn delete(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            tracing::debug!(key = %key, "Identity evicted");
        }
    }

    /// Remove every entry whose write or read timer has elapsed.
    ///
    /// Returns the number of entries removed. Driven by a periodic task
    /// so idle entries are reclaimed independent of traffic.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();

        entries.retain(|_, entry| !entry.is_expired(now, self.write_expiry, self.read_expiry));

        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept = swept, "Swept expired identities");
        }
        swept
    }

    /// Number of live entries (expired-but-unswept entries included).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when the cache holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}
