//! Time-bounded caches shared across requests
//!
//! Validated claims and resolved employees are cached behind the
//! [`ExpiringCache`] trait so that the validator and resolver receive their
//! cache as an injected dependency. [`MemoryCache`] is the process-wide
//! implementation: a `DashMap` keyed by the cache key, where each entry
//! carries its own absolute expiry.
//!
//! Entries are written only after a value has been fully computed, so a
//! cancelled fill leaves no partial entry behind. Concurrent fills of the same
//! key are last-writer-wins.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Number of hex characters kept from the SHA-256 digest.
const TOKEN_HASH_LEN: usize = 32;

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Seconds since the Unix epoch for `at`, saturating at zero for pre-epoch times.
pub fn unix_seconds(at: SystemTime) -> u64 {
    at.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Cache key derived from a bearer token.
///
/// The token itself is never stored; only a truncated SHA-256 digest.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenHash(String);

impl TokenHash {
    /// Hash a bearer token.
    pub fn of(token: &str) -> Self {
        let digest = Sha256::digest(token.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(TOKEN_HASH_LEN);
        Self(hex)
    }

    /// Short prefix for log correlation.
    pub fn prefix(&self) -> &str {
        &self.0[..8]
    }

    /// Full hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenHash({}..)", self.prefix())
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Get/set cache with per-entry absolute expiry.
pub trait ExpiringCache<K, V>: Send + Sync {
    /// Value for `key` if present and not expired at `now`.
    fn get(&self, key: &K, now: SystemTime) -> Option<V>;

    /// Store `value` until `expires_at`. `now` decides which entries are
    /// already expired when room has to be made.
    fn insert(&self, key: K, value: V, expires_at: SystemTime, now: SystemTime);

    /// Drop `key` if present.
    fn remove(&self, key: &K);

    /// Number of stored entries, including expired ones not yet purged.
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: SystemTime,
}

/// In-memory [`ExpiringCache`] over a concurrent map.
///
/// When `capacity` is reached, expired entries are purged first; if the map
/// is still full an arbitrary entry is evicted.
#[derive(Debug)]
pub struct MemoryCache<K: Eq + Hash, V> {
    entries: DashMap<K, CacheEntry<V>>,
    capacity: usize,
}

impl<K: Eq + Hash, V> MemoryCache<K, V> {
    /// Default maximum number of entries.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Create an empty cache with [`Self::DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create an empty cache holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Remove every entry expired at `now`.
    pub fn purge_expired(&self, now: SystemTime) {
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl<K: Eq + Hash, V> Default for MemoryCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ExpiringCache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K, now: SystemTime) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.expires_at > now {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    fn insert(&self, key: K, value: V, expires_at: SystemTime, now: SystemTime) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.purge_expired(now);
            if self.entries.len() >= self.capacity {
                let victim = self.entries.iter().next().map(|e| e.key().clone());
                if let Some(victim) = victim {
                    self.entries.remove(&victim);
                }
            }
        }
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Shared handle to any expiring cache.
pub type SharedCache<K, V> = Arc<dyn ExpiringCache<K, V>>;

/// Expiry for a cache entry: the earlier of the value's own expiry and `now + ceiling`.
pub fn bounded_expiry(now: SystemTime, own_expiry: SystemTime, ceiling: Duration) -> SystemTime {
    own_expiry.min(now + ceiling)
}
