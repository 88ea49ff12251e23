//! Cache of split meshes keyed by object id and source mesh.
//!
//! Partitioning is proportional to vertex and index counts, so results are
//! kept until the next tile load. Any load may change feature-id
//! assignments tile-wide, which is why [`SplitMeshCache::clear`] drops
//! everything and starts a new [`Generation`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::partition::SplitMesh;
use crate::types::{Generation, MeshId, Oid};

/// Cache key: object id plus source mesh identity.
pub type CacheKey = (Oid, MeshId);

/// Hit and miss counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required partitioning.
    pub misses: u64,
    /// Number of times the cache was cleared.
    pub clears: u64,
}

/// Split meshes per `(oid, mesh)`, including empty results.
#[derive(Debug, Default)]
pub struct SplitMeshCache {
    entries: HashMap<CacheKey, Vec<SplitMesh>>,
    generation: Generation,
    stats: CacheStats,
}

impl SplitMeshCache {
    /// Create an empty cache at generation zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current generation. Split meshes stamped with an older one are stale.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached value for `key`, computing it with `compute` on a miss.
    ///
    /// Values produced by `compute` are stamped with the current generation.
    pub fn get_or_insert_with(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce() -> Vec<SplitMesh>,
    ) -> &[SplitMesh] {
        let generation = self.generation;
        let value = match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.stats.hits += 1;
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.stats.misses += 1;
                entry.insert(
                    compute()
                        .into_iter()
                        .map(|split| split.stamp(generation))
                        .collect(),
                )
            }
        };
        value.as_slice()
    }

    /// Drop every entry and advance the generation.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.generation = self.generation.next();
        self.stats.clears += 1;
        tracing::debug!(
            dropped,
            generation = self.generation.0,
            "cleared split mesh cache"
        );
    }
}
