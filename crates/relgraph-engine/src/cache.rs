//! Relation-level cache.
//!
//! The loader consults a [`RelationCache`] before touching the store. Keys are
//! logical: `{type}:{id}` for whole entities and `{type}:{id}:{relation}` for
//! one relation slot. A configured key prefix is applied inside the backend,
//! so callers always pass logical keys.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use relgraph_core::{Entity, RelationValue};

/// Build the logical cache key for an entity or one of its relation slots.
pub fn cache_key(entity_type: &str, id: &str, relation: Option<&str>) -> String {
    match relation {
        Some(relation) => format!("{entity_type}:{id}:{relation}"),
        None => format!("{entity_type}:{id}"),
    }
}

/// A value stored under one cache key.
#[derive(Debug, Clone)]
pub enum CachedValue {
    /// A whole entity, possibly with expanded relations.
    Entity(Entity),
    /// The value of one relation slot.
    Relation(RelationValue),
}

/// Eviction strategy when the cache is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Evict the entry with the fewest hits.
    #[default]
    Lru,
}

/// Cache tuning knobs carried by load configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    pub ttl_seconds: u64,
    /// Maximum number of entries before eviction.
    pub max_entries: usize,
    /// Prefix prepended to every key by the backend.
    pub key_prefix: String,
    /// Eviction strategy.
    pub eviction: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_entries: 1024,
            key_prefix: String::new(),
            eviction: EvictionPolicy::Lru,
        }
    }
}

impl CacheConfig {
    /// The configured time-to-live as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// The cache collaborator consumed by the loader and the executor.
pub trait RelationCache: Send + Sync {
    /// Look up a logical key. Expired entries count as misses.
    fn get(&self, key: &str) -> Option<CachedValue>;

    /// Store a value under a logical key with the given time-to-live.
    fn put(&self, key: &str, value: CachedValue, ttl: Duration);

    /// Drop the entity entry and every relation entry for one identity.
    fn invalidate_entity(&self, entity_type: &str, id: &str);
}

struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
    hits: AtomicU64,
}

/// Cache hit, miss, and eviction counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(AtomicOrdering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(AtomicOrdering::Relaxed)
    }

    /// Get eviction count.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(AtomicOrdering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// In-memory [`RelationCache`] with TTL expiry and least-hit eviction.
pub struct MemoryRelationCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
    key_prefix: String,
    stats: CacheStats,
}

impl MemoryRelationCache {
    /// Create a cache from the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: config.max_entries.max(1),
            key_prefix: config.key_prefix.clone(),
            stats: CacheStats::default(),
        }
    }

    fn physical_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.key_prefix, key)
        }
    }

    /// Evict the entry with the fewest hits.
    fn evict_one(&self, entries: &mut HashMap<String, CacheEntry>) {
        let evict_key = entries
            .iter()
            .min_by_key(|(_, e)| e.hits.load(AtomicOrdering::Relaxed))
            .map(|(k, _)| k.clone());

        if let Some(key) = evict_key {
            entries.remove(&key);
            self.stats.evictions.fetch_add(1, AtomicOrdering::Relaxed);
        }
    }

    /// Cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Current number of entries, including not-yet-collected expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl RelationCache for MemoryRelationCache {
    fn get(&self, key: &str) -> Option<CachedValue> {
        let physical = self.physical_key(key);

        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(&physical) {
                if entry.expires_at > Instant::now() {
                    entry.hits.fetch_add(1, AtomicOrdering::Relaxed);
                    self.stats.hits.fetch_add(1, AtomicOrdering::Relaxed);
                    return Some(entry.value.clone());
                }
            }
        }

        // Expired entries are removed on the miss path.
        let mut entries = self.entries.write();
        if entries
            .get(&physical)
            .is_some_and(|e| e.expires_at <= Instant::now())
        {
            entries.remove(&physical);
        }

        self.stats.misses.fetch_add(1, AtomicOrdering::Relaxed);
        None
    }

    fn put(&self, key: &str, value: CachedValue, ttl: Duration) {
        let physical = self.physical_key(key);
        let mut entries = self.entries.write();

        if entries.len() >= self.max_entries && !entries.contains_key(&physical) {
            self.evict_one(&mut entries);
        }

        entries.insert(
            physical,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                hits: AtomicU64::new(0),
            },
        );
    }

    fn invalidate_entity(&self, entity_type: &str, id: &str) {
        let entity_key = self.physical_key(&cache_key(entity_type, id, None));
        let relation_prefix = format!("{entity_key}:");

        let mut entries = self.entries.write();
        entries.retain(|k, _| k != &entity_key && !k.starts_with(&relation_prefix));
    }
}
