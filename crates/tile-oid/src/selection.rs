//! The selection context tying indexing, resolution and visibility together.

use crate::cache::CacheStats;
use crate::config::SelectionConfig;
use crate::error::Result;
use crate::index::{IndexSummary, index_mesh};
use crate::mesh::{Mesh, Tile};
use crate::partition::SplitMesh;
use crate::picking::{FeatureInfo, Intersection, query_feature_at_point};
use crate::resolver::OidResolver;
use crate::types::{Generation, Oid, TileId};
use crate::visibility::{VisibilityEncoder, VisibilityTable, VisibilityUpdate};

/// Outcome of processing one tile load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLoadReport {
    /// The loaded tile.
    pub tile: TileId,
    /// How its meshes were classified.
    pub summary: IndexSummary,
    /// Cache generation after the load.
    pub generation: Generation,
}

/// Owned state of object-id selection for one scene.
///
/// The host owns the tiles and passes them in; this context owns the hidden
/// set, the split-mesh cache and the content revision that renderers use to
/// decide when tables need re-uploading. Everything runs on the caller's
/// thread.
#[derive(Debug, Default)]
pub struct FeatureSelection {
    encoder: VisibilityEncoder,
    resolver: OidResolver,
    revision: u64,
}

impl FeatureSelection {
    /// Create a context with nothing hidden.
    pub fn new(config: SelectionConfig) -> Result<Self> {
        Ok(Self {
            encoder: VisibilityEncoder::new(config)?,
            resolver: OidResolver::new(),
            revision: 0,
        })
    }

    /// Process a tile that just became resident.
    ///
    /// Clears every cached split, tags the meshes with the tile URI and
    /// builds their metadata indices. Must complete before the tile is drawn.
    pub fn on_tile_loaded(&mut self, tile: &mut Tile) -> TileLoadReport {
        self.on_meshes_loaded(tile.id, tile.uri.as_deref(), &mut tile.meshes)
    }

    /// [`on_tile_loaded`](Self::on_tile_loaded) for hosts that store meshes
    /// outside a [`Tile`].
    pub fn on_meshes_loaded<'a>(
        &mut self,
        tile: TileId,
        uri: Option<&str>,
        meshes: impl IntoIterator<Item = &'a mut Mesh>,
    ) -> TileLoadReport {
        self.resolver.invalidate();
        let mut summary = IndexSummary::default();
        for mesh in meshes {
            if let Some(uri) = uri {
                mesh.tile_uri = Some(uri.to_string());
            }
            if index_mesh(mesh) {
                summary.feature_bearing += 1;
            } else {
                summary.plain += 1;
            }
        }
        self.bump_revision();
        tracing::debug!(
            tile = tile.0,
            feature_bearing = summary.feature_bearing,
            plain = summary.plain,
            "processed tile load"
        );
        TileLoadReport {
            tile,
            summary,
            generation: self.resolver.generation(),
        }
    }

    /// Process every already-resident tile as if it had just loaded.
    pub fn resync<'a>(&mut self, tiles: impl IntoIterator<Item = &'a mut Tile>) -> IndexSummary {
        let mut total = IndexSummary::default();
        let mut count = 0usize;
        for tile in tiles {
            let report = self.on_tile_loaded(tile);
            total.feature_bearing += report.summary.feature_bearing;
            total.plain += report.summary.plain;
            count += 1;
        }
        tracing::info!(
            tiles = count,
            feature_bearing = total.feature_bearing,
            "resynchronised resident tiles"
        );
        total
    }

    /// Release cached splits. The hidden set is kept.
    pub fn detach(&mut self) {
        self.resolver.invalidate();
    }

    /// Hide exactly `oids`, replacing the previous hidden set.
    pub fn hide_by_oids(&mut self, oids: &[Oid]) -> Result<VisibilityUpdate> {
        let update = self.encoder.hide(oids)?;
        self.bump_revision();
        Ok(update)
    }

    /// Stop hiding `oids`.
    pub fn unhide_by_oids(&mut self, oids: &[Oid]) -> VisibilityUpdate {
        let update = self.encoder.unhide(oids);
        self.bump_revision();
        update
    }

    /// Stop hiding anything.
    pub fn unhide_all(&mut self) -> VisibilityUpdate {
        let update = self.encoder.clear();
        self.bump_revision();
        update
    }

    /// Apply the platform's table length limit.
    pub fn set_hardware_limit(&mut self, hardware_limit: usize) -> Result<VisibilityUpdate> {
        let update = self.encoder.set_hardware_limit(hardware_limit)?;
        self.bump_revision();
        Ok(update)
    }

    /// Split meshes of `oid` across `meshes`. Empty when nothing matches.
    pub fn meshes_for_oid<'a>(
        &mut self,
        oid: Oid,
        meshes: impl IntoIterator<Item = &'a Mesh>,
    ) -> Vec<SplitMesh> {
        self.resolver.meshes_for_oid(oid, meshes)
    }

    /// Split meshes for each of `oids` that matches, in request order.
    pub fn meshes_grouped_by_oid<'a, I>(
        &mut self,
        oids: &[Oid],
        meshes: I,
    ) -> Vec<(Oid, Vec<SplitMesh>)>
    where
        I: IntoIterator<Item = &'a Mesh> + Clone,
    {
        self.resolver.meshes_grouped_by_oid(oids, meshes)
    }

    /// Inspect the object under a hit on `mesh`.
    #[must_use]
    pub fn query_feature_at_point(&self, mesh: &Mesh, hit: &Intersection) -> FeatureInfo {
        query_feature_at_point(mesh, hit)
    }

    /// The visibility table for `mesh` under the current hidden set.
    #[must_use]
    pub fn table_for(&self, mesh: &Mesh) -> VisibilityTable {
        self.encoder.table_for(mesh.metadata_index())
    }

    /// Current table length.
    #[must_use]
    pub fn table_capacity(&self) -> usize {
        self.encoder.capacity()
    }

    /// Hidden object ids in request order.
    #[must_use]
    pub fn hidden(&self) -> &[Oid] {
        self.encoder.hidden()
    }

    /// Changes whenever any mesh's table contents may have changed.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &SelectionConfig {
        self.encoder.config()
    }

    /// Whether `split` is from the current generation and its source is alive.
    #[must_use]
    pub fn is_current(&self, split: &SplitMesh) -> bool {
        self.resolver.is_current(split)
    }

    /// Current cache generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.resolver.generation()
    }

    /// Split-mesh cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.stats()
    }

    fn bump_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
