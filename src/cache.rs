//! In-memory result cache bounded by capacity and TTL.
//! Key: blake3 hash of (first 50 chars of transcript | duration | canonical config JSON).
//! Capacity: 10. Expired entries stay in place until overwritten or evicted.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::metrics::now_epoch_ms;
use crate::types::SpeechAnalysisResult;

pub const MAX_CACHE_SIZE: usize = 10;

/// Number of transcript characters that participate in the key.
pub const KEY_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Compute the key for an analysis request.
    pub fn compute(transcript: &str, duration_secs: f64, config: &AnalysisConfig) -> Self {
        Self::from_material(&key_material(transcript, duration_secs, config))
    }

    pub fn from_material(material: &str) -> Self {
        Self(*blake3::hash(material.as_bytes()).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The unhashed key string. Identical prefix, duration, and config always
/// produce the same string.
pub fn key_material(transcript: &str, duration_secs: f64, config: &AnalysisConfig) -> String {
    let prefix: String = transcript.chars().take(KEY_PREFIX_CHARS).collect();
    format!("{prefix}|{duration_secs}|{}", config.canonical_json())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatistics {
    pub size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_ratio: f64,
    pub oldest_entry_age_ms: u64,
    pub newest_entry_age_ms: u64,
    pub average_entry_age_ms: f64,
    /// Over entries that recorded a processing time.
    pub average_processing_time_ms: f64,
    pub eviction_count: u64,
}

struct CacheInner {
    entries: LruCache<CacheKey, SpeechAnalysisResult>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct CacheStore {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a result younger than `ttl`. Expired entries count as misses
    /// and are left in place.
    pub fn get(&self, key: &CacheKey, ttl: Duration) -> Option<SpeechAnalysisResult> {
        let mut inner = self.inner.lock();
        let now = now_epoch_ms();
        let ttl_ms = ttl.as_millis() as u64;

        // peek: lookups must not reorder entries
        let fresh = inner
            .entries
            .peek(key)
            .filter(|entry| now.saturating_sub(entry.timestamp) < ttl_ms)
            .cloned();

        match fresh {
            Some(entry) => {
                inner.hits += 1;
                debug!(key = %key, "cache hit");
                Some(entry)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert a result, evicting the entry with the smallest timestamp when full.
    /// A zero timestamp is stamped with the current time.
    pub fn put(&self, key: CacheKey, mut result: SpeechAnalysisResult) {
        if result.timestamp == 0 {
            result.timestamp = now_epoch_ms();
        }

        // size check, eviction, and insert happen under one lock
        let mut inner = self.inner.lock();
        if !inner.entries.contains(&key) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.timestamp)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                inner.entries.pop(&oldest);
                inner.evictions += 1;
                debug!(evicted = %oldest, "cache eviction");
            }
        }
        inner.entries.put(key, result);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains(key)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn reset_counters(&self) {
        let mut inner = self.inner.lock();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
    }

    pub fn stats(&self) -> CacheStatistics {
        let inner = self.inner.lock();
        let now = now_epoch_ms();

        let ages: Vec<u64> = inner
            .entries
            .iter()
            .map(|(_, entry)| now.saturating_sub(entry.timestamp))
            .collect();
        let processing: Vec<f64> = inner
            .entries
            .iter()
            .map(|(_, entry)| entry.metrics.processing_time_ms)
            .filter(|&ms| ms > 0.0)
            .collect();

        let lookups = inner.hits + inner.misses;
        CacheStatistics {
            size: inner.entries.len(),
            hit_count: inner.hits,
            miss_count: inner.misses,
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            oldest_entry_age_ms: ages.iter().copied().max().unwrap_or(0),
            newest_entry_age_ms: ages.iter().copied().min().unwrap_or(0),
            average_entry_age_ms: mean(ages.iter().map(|&a| a as f64)),
            average_processing_time_ms: mean(processing.iter().copied()),
            eviction_count: inner.evictions,
        }
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}
