//! Answer Cache for the RAG Pipeline
//!
//! Repeat questions against an unchanged corpus are answered from memory
//! instead of running retrieval and generation again.
//!
//! # Cache Key Strategy
//!
//! Cache keys are SHA-256 hashes of the canonical JSON
//! `{"idx": <corpus fingerprint>, "k": <top_k>, "q": <question>}`. Because
//! the corpus fingerprint is part of the key, ingesting a document changes
//! every key and old entries are never served again; they simply age out.
//!
//! # Expiry
//!
//! Every entry carries a fixed deadline set when it is written. Reading an
//! entry promotes it in LRU order but never moves the deadline.
//!
//! # Example
//!
//! ```ignore
//! use docqa::rag::cache::{AnswerCache, LruAnswerCache, CacheConfig};
//!
//! let cache = LruAnswerCache::new(CacheConfig::default())?;
//! let key = cache.compute_key("When is the deadline?", 4, &corpus.fingerprint());
//! if let Some(answer) = cache.get(&key) {
//!     return Ok(answer);
//! }
//! ```

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Answer, AppError, Result};

// ============================================================================
// Cache Types
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses (including expired entries)
    pub misses: u64,
    /// Number of entries currently resident
    pub entry_count: usize,
    /// Number of evictions due to capacity
    pub evictions: u64,
    /// Number of entries dropped because their TTL had passed
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Configuration for the answer cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of answers kept (default: 200)
    pub max_entries: usize,
    /// Time-to-live of every entry (default: 30 minutes)
    pub ttl: Duration,
    /// Whether the cache is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 200,
            ttl: Duration::from_secs(30 * 60),
            enabled: true,
        }
    }
}

// ============================================================================
// Cache Trait
// ============================================================================

/// Trait for answer cache implementations
pub trait AnswerCache: Send + Sync {
    /// Get a fresh answer, or `None` if absent or expired
    fn get(&self, key: &str) -> Option<Answer>;

    /// Store an answer under `key`, replacing any previous value
    fn put(&self, key: &str, answer: Answer) -> Result<()>;

    /// Remove an entry from the cache
    fn invalidate(&self, key: &str) -> Result<()>;

    /// Clear all entries from the cache
    fn clear(&self) -> Result<()>;

    /// Get cache statistics
    fn stats(&self) -> CacheStats;

    /// Compute the cache key for a question against a corpus snapshot
    fn compute_key(&self, question: &str, top_k: usize, corpus_fingerprint: &str) -> String {
        let canonical = serde_json::json!({
            "q": question,
            "k": top_k,
            "idx": corpus_fingerprint,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Check if the cache is enabled
    fn is_enabled(&self) -> bool;
}

// ============================================================================
// LRU Cache Entry
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    answer: Answer,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(answer: Answer, ttl: Duration) -> Self {
        Self {
            answer,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

// ============================================================================
// LRU Answer Cache
// ============================================================================

/// In-memory LRU cache for answers
///
/// Bounded by entry count. When full, inserting evicts the least recently
/// used entry. Thread-safe via `parking_lot::Mutex` (LRU reads mutate order).
pub struct LruAnswerCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl LruAnswerCache {
    /// Create a new LRU answer cache with the given configuration
    pub fn new(config: CacheConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.max_entries).ok_or_else(|| {
            AppError::InvalidConfiguration("cache max_entries must be greater than 0".into())
        })?;
        if config.ttl.is_zero() {
            return Err(AppError::InvalidConfiguration(
                "cache ttl must be greater than 0".into(),
            ));
        }

        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        })
    }

    /// Create a cache with default configuration
    pub fn with_defaults() -> Self {
        Self {
            entries: Mutex::new(LruCache::new(NonZeroUsize::MIN.saturating_add(199))),
            ttl: CacheConfig::default().ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Remove expired entries from the cache
    pub fn cleanup_expired(&self) {
        let mut entries = self.entries.lock();
        let expired_keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired_keys {
            if entries.pop(&key).is_some() {
                self.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AnswerCache for LruAnswerCache {
    fn get(&self, key: &str) -> Option<Answer> {
        let mut entries = self.entries.lock();

        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // `get` promotes the entry; the deadline is left untouched.
        let answer = entries.get(key).map(|entry| entry.answer.clone());
        self.hits.fetch_add(1, Ordering::Relaxed);
        answer
    }

    fn put(&self, key: &str, answer: Answer) -> Result<()> {
        let entry = CacheEntry::new(answer, self.ttl);
        let mut entries = self.entries.lock();

        // `push` hands back either the replaced value for this key or the evicted LRU entry.
        if let Some((displaced_key, _)) = entries.push(key.to_string(), entry) {
            if displaced_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.entries.lock().pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.lock().len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

// ============================================================================
// No-Op Cache
// ============================================================================

/// A no-op cache that doesn't store anything
///
/// Used when `[cache] enabled = false`.
#[derive(Debug, Default)]
pub struct NoOpCache;

impl NoOpCache {
    /// Create a new no-op cache
    pub fn new() -> Self {
        Self
    }
}

impl AnswerCache for NoOpCache {
    fn get(&self, _key: &str) -> Option<Answer> {
        None
    }

    fn put(&self, _key: &str, _answer: Answer) -> Result<()> {
        Ok(())
    }

    fn invalidate(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Build the cache described by `config`.
pub fn from_config(config: CacheConfig) -> Result<std::sync::Arc<dyn AnswerCache>> {
    if config.enabled {
        Ok(std::sync::Arc::new(LruAnswerCache::new(config)?))
    } else {
        Ok(std::sync::Arc::new(NoOpCache::new()))
    }
}

// ============================================================================
// Tests
// ============================================================================
