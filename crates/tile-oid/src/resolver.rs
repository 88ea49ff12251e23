//! Resolving object ids to split meshes across loaded tiles.

use crate::cache::{CacheStats, SplitMeshCache};
use crate::mesh::Mesh;
use crate::partition::{SplitMesh, partition};
use crate::types::{Generation, Oid};

/// Finds the geometry of an object across every loaded mesh.
///
/// Results are cached per `(oid, mesh)` until [`OidResolver::invalidate`],
/// which the owner calls on every tile load.
#[derive(Debug, Default)]
pub struct OidResolver {
    cache: SplitMeshCache,
}

impl OidResolver {
    /// Create a resolver with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split meshes for `oid` from every mesh whose index contains it.
    ///
    /// Meshes are scanned linearly in iteration order and their results
    /// concatenated. Within a mesh, one split is produced per feature id
    /// carrying the object, in ascending feature order. Returns an empty
    /// vector when nothing matches.
    pub fn meshes_for_oid<'a>(
        &mut self,
        oid: Oid,
        meshes: impl IntoIterator<Item = &'a Mesh>,
    ) -> Vec<SplitMesh> {
        let mut result = Vec::new();
        for mesh in meshes {
            let Some(index) = mesh.metadata_index() else {
                continue;
            };
            if !index.contains_oid(oid) {
                continue;
            }
            let splits = self.cache.get_or_insert_with((oid, mesh.id), || {
                index
                    .features_for_oid(oid)
                    .into_iter()
                    .filter_map(|feature| partition(mesh, feature))
                    .collect()
            });
            result.extend_from_slice(splits);
        }
        result
    }

    /// Resolve several object ids, keeping request order and omitting misses.
    pub fn meshes_grouped_by_oid<'a, I>(
        &mut self,
        oids: &[Oid],
        meshes: I,
    ) -> Vec<(Oid, Vec<SplitMesh>)>
    where
        I: IntoIterator<Item = &'a Mesh> + Clone,
    {
        oids.iter()
            .filter_map(|&oid| {
                let splits = self.meshes_for_oid(oid, meshes.clone());
                (!splits.is_empty()).then_some((oid, splits))
            })
            .collect()
    }

    /// Drop every cached split and start a new generation.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// The current cache generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.cache.generation()
    }

    /// Whether `split` belongs to the current generation and its source is alive.
    #[must_use]
    pub fn is_current(&self, split: &SplitMesh) -> bool {
        split.generation == self.cache.generation() && split.attributes().is_some()
    }

    /// Cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
