//! Object id to feature id indexing.
//!
//! When a tile loads, every mesh that carries both a feature-id attribute
//! and a property table gets a [`MetadataIndex`] mapping the object ids found
//! in the table to the tile-local feature ids baked into its vertices.
//! Meshes missing either input are classified [`MeshKind::Plain`] and skipped
//! without error; mixed scenes are expected.

use std::collections::{BTreeMap, HashMap};

use crate::mesh::{Mesh, MeshKind, Tile};
use crate::types::{FeatureId, Oid};

/// Bidirectional mapping between object ids and feature ids for one mesh.
///
/// Built once per load and immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataIndex {
    feature_to_oid: BTreeMap<FeatureId, Oid>,
    /// Features per object, in the order their first vertex appears.
    oid_to_features: HashMap<Oid, Vec<FeatureId>>,
}

impl MetadataIndex {
    /// Record that `feature` belongs to `oid`. The first mapping for a feature wins.
    fn insert(&mut self, feature: FeatureId, oid: Oid) {
        if self.feature_to_oid.contains_key(&feature) {
            return;
        }
        self.feature_to_oid.insert(feature, oid);
        self.oid_to_features.entry(oid).or_default().push(feature);
    }

    /// The feature id used for `oid` in visibility tables.
    ///
    /// When several features carry the same object id this is the one whose
    /// first vertex comes last.
    #[must_use]
    pub fn feature_for_oid(&self, oid: Oid) -> Option<FeatureId> {
        self.oid_to_features.get(&oid)?.last().copied()
    }

    /// Every feature id carrying `oid`, sorted ascending.
    #[must_use]
    pub fn features_for_oid(&self, oid: Oid) -> Vec<FeatureId> {
        let mut features = self.oid_to_features.get(&oid).cloned().unwrap_or_default();
        features.sort_unstable();
        features
    }

    /// The object id of `feature`.
    #[must_use]
    pub fn oid_for_feature(&self, feature: FeatureId) -> Option<Oid> {
        self.feature_to_oid.get(&feature).copied()
    }

    /// Whether any feature of this mesh carries `oid`.
    #[must_use]
    pub fn contains_oid(&self, oid: Oid) -> bool {
        self.oid_to_features.contains_key(&oid)
    }

    /// Number of indexed features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.feature_to_oid.len()
    }

    /// Whether no feature was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.feature_to_oid.is_empty()
    }
}

/// Build the metadata index for a mesh from its current buffers.
///
/// Returns `None` when the mesh lacks a feature-id attribute, a property
/// table, or the active channel's table reference.
#[must_use]
pub fn build_index(mesh: &Mesh) -> Option<MetadataIndex> {
    let features = mesh.features.as_ref()?;
    let metadata = mesh.metadata.as_ref()?;
    let Some(set) = features.active() else {
        tracing::warn!(
            mesh = mesh.id.0,
            channel = features.channel,
            declared = features.feature_ids.len(),
            "feature channel not declared on mesh"
        );
        return None;
    };
    let table = set.property_table?;
    let attribute = mesh.feature_attribute()?;

    let mut index = MetadataIndex::default();
    let mut seen = std::collections::HashSet::new();

    for vertex in 0..attribute.len() {
        let Some(feature) = attribute.feature_id(vertex) else {
            tracing::trace!(mesh = mesh.id.0, vertex, "skipping invalid feature id value");
            continue;
        };
        // One lookup per distinct feature.
        if !seen.insert(feature) {
            continue;
        }
        let Some(oid) = metadata
            .property_table_data(table, feature)
            .and_then(|record| record.oid())
        else {
            tracing::trace!(mesh = mesh.id.0, feature = feature.0, "feature has no oid");
            continue;
        };
        index.insert(feature, oid);
    }

    Some(index)
}

/// Classify a mesh and attach its metadata index.
///
/// Reprocessing a mesh overwrites any previous index with one derived from
/// the current buffers. Returns whether the mesh is feature-bearing.
pub fn index_mesh(mesh: &mut Mesh) -> bool {
    match build_index(mesh) {
        Some(index) => {
            tracing::debug!(
                mesh = mesh.id.0,
                features = index.len(),
                "built metadata index"
            );
            mesh.kind = MeshKind::FeatureBearing(index);
            true
        }
        None => {
            mesh.kind = MeshKind::Plain;
            false
        }
    }
}

/// Outcome of indexing one tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Meshes that received a metadata index.
    pub feature_bearing: usize,
    /// Meshes skipped for lack of feature data.
    pub plain: usize,
}

/// Index every mesh of a freshly loaded tile.
pub fn index_tile(tile: &mut Tile) -> IndexSummary {
    let mut summary = IndexSummary::default();
    for mesh in &mut tile.meshes {
        if index_mesh(mesh) {
            summary.feature_bearing += 1;
        } else {
            summary.plain += 1;
        }
    }
    summary
}
