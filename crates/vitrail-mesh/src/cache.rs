//! Bounded least-recently-used store of triangle colorization results.
//!
//! The cache is the single source of truth for triangle color and error.
//! Triangulations look their triangles up by [`Fingerprint`], and only the
//! control thread writes to it (after a colorization fan-out completes).
//!
//! Recency is tracked with a monotonically increasing tick: each entry
//! remembers the tick of its last use, and a `BTreeMap` orders ticks so
//! the least recently used entry is always the first one.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::types::{MeshError, TriangleResult};

#[derive(Debug, Clone, Copy)]
struct Slot {
    result: TriangleResult,
    tick: u64,
}

/// Lookup and eviction counters, cumulative since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Fixed-capacity LRU map from triangle fingerprint to result.
#[derive(Debug, Clone)]
pub struct TriangleCache {
    capacity: usize,
    slots: HashMap<Fingerprint, Slot>,
    recency: BTreeMap<u64, Fingerprint>,
    next_tick: u64,
    stats: CacheStats,
}

impl TriangleCache {
    /// Create an empty cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidConfig`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, MeshError> {
        if capacity == 0 {
            return Err(MeshError::InvalidConfig(
                "cache capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            slots: HashMap::with_capacity(capacity.min(1 << 16)),
            recency: BTreeMap::new(),
            next_tick: 0,
            stats: CacheStats::default(),
        })
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns `true` if `key` is cached. Does not affect recency.
    #[must_use]
    pub fn contains(&self, key: Fingerprint) -> bool {
        self.slots.contains_key(&key)
    }

    /// Look up `key` and mark it most recently used.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CacheMiss`] if the key is not cached.
    pub fn get(&mut self, key: Fingerprint) -> Result<TriangleResult, MeshError> {
        let tick = self.bump();
        let Some(slot) = self.slots.get_mut(&key) else {
            self.stats.misses += 1;
            return Err(MeshError::CacheMiss);
        };
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        self.recency.insert(tick, key);
        self.stats.hits += 1;
        Ok(slot.result)
    }

    /// Look up `key` without touching recency or counters.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CacheMiss`] if the key is not cached.
    pub fn peek(&self, key: Fingerprint) -> Result<TriangleResult, MeshError> {
        self.slots
            .get(&key)
            .map(|slot| slot.result)
            .ok_or(MeshError::CacheMiss)
    }

    /// Insert or update `key`. A new key evicts the least recently used
    /// entry when the cache is full.
    pub fn put(&mut self, key: Fingerprint, result: TriangleResult) {
        let tick = self.bump();
        if let Some(slot) = self.slots.get_mut(&key) {
            self.recency.remove(&slot.tick);
            slot.tick = tick;
            slot.result = result;
            self.recency.insert(tick, key);
            return;
        }

        if self.slots.len() >= self.capacity {
            self.evict_oldest();
        }
        self.slots.insert(key, Slot { result, tick });
        self.recency.insert(tick, key);
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.recency.clear();
    }

    fn evict_oldest(&mut self) {
        if let Some((_, key)) = self.recency.pop_first() {
            self.slots.remove(&key);
            self.stats.evictions += 1;
        }
    }

    const fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }
}
