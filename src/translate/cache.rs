//! In-memory translation cache with lazy TTL expiry.
//! Key: "{text}:{src_lang}-{tgt_lang}". TTL: 24 hours by default.
//! Expired entries stay put until the same key is written again; reads never evict.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Composite key for one translation direction of one piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        CacheKey(format!("{text}:{source_lang}-{target_lang}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    translation: String,
    /// Insertion time, epoch millis.
    timestamp: u64,
}

pub struct TranslationCache {
    inner: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl TranslationCache {
    /// Unbounded cache on the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(LruCache::unbounded()),
            ttl_ms: ttl.as_millis() as u64,
            clock,
        }
    }

    /// Bounded variant: once `capacity` keys are held, the oldest write is dropped.
    pub fn with_capacity(ttl: Duration, capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl_ms: ttl.as_millis() as u64,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Look up a cached translation. Returns None if absent or expired.
    /// Uses `peek` so lookups do not reorder eviction.
    pub fn get(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<String> {
        let key = CacheKey::new(text, source_lang, target_lang);
        let now = self.clock.now_millis();
        let cache = self.inner.lock();
        let entry = cache.peek(&key)?;
        if self.is_expired(entry, now) {
            debug!(key = %key, "cache entry expired");
            return None;
        }
        Some(entry.translation.clone())
    }

    /// Store a translation, replacing whatever was under the same key.
    pub fn set(&self, text: &str, translation: &str, source_lang: &str, target_lang: &str) {
        let key = CacheKey::new(text, source_lang, target_lang);
        let entry = CacheEntry {
            translation: translation.to_string(),
            timestamp: self.clock.now_millis(),
        };
        self.inner.lock().put(key, entry);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every expired entry. Never called by the cache itself.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut cache = self.inner.lock();
        let stale: Vec<CacheKey> = cache
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            cache.pop(key);
        }
        if !stale.is_empty() {
            debug!(removed = stale.len(), "purged expired translations");
        }
        stale.len()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    #[inline]
    fn is_expired(&self, entry: &CacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.timestamp) >= self.ttl_ms
    }
}
