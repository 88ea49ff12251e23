//! Splitting a batched mesh by feature id.
//!
//! A split mesh references its source's vertex buffers and owns only a
//! reduced index buffer holding the triangles whose three vertices all carry
//! the target feature id. Triangles straddling two features are dropped
//! entirely; a triangle is never partially visible.

use std::sync::{Arc, Weak};

use glam::Mat4;

use crate::geometry::{Bounds, VertexAttribute, VertexAttributes};
use crate::mesh::{Mesh, Transform};
use crate::metadata::PropertyRecord;
use crate::types::{FeatureId, Generation, MaterialHandle, MeshId, Oid};

/// The triangles of one feature extracted from a batched mesh.
///
/// The vertex buffers stay owned by the source mesh. Once the source is
/// dropped (tile unload) [`SplitMesh::attributes`] returns `None`.
#[derive(Debug, Clone)]
pub struct SplitMesh {
    /// `feature_{fid}_{oid}`.
    pub name: String,
    /// Feature id the triangles were selected by.
    pub feature_id: FeatureId,
    /// Object id of that feature, when the source mesh is indexed.
    pub oid: Option<Oid>,
    /// Mesh the triangles were taken from.
    pub source: MeshId,
    /// Cache generation this split was produced in.
    pub generation: Generation,
    /// Filtered triangle list, three indices per triangle.
    pub indices: Arc<[u32]>,
    /// Bounds of the filtered triangles.
    pub bounds: Bounds,
    /// Source transform.
    pub transform: Transform,
    /// Source model-to-world matrix.
    pub world_matrix: Mat4,
    /// Source material, shared.
    pub material: MaterialHandle,
    /// Property table row of the feature.
    pub property_data: Option<PropertyRecord>,
    attributes: Weak<VertexAttributes>,
}

impl SplitMesh {
    /// The source mesh's vertex buffers, if the source is still alive.
    #[must_use]
    pub fn attributes(&self) -> Option<Arc<VertexAttributes>> {
        self.attributes.upgrade()
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether this split references the given attribute buffers.
    #[must_use]
    pub fn shares_attributes_with(&self, mesh: &Mesh) -> bool {
        std::ptr::eq(self.attributes.as_ptr(), Arc::as_ptr(&mesh.attributes))
    }

    pub(crate) fn stamp(mut self, generation: Generation) -> Self {
        self.generation = generation;
        self
    }
}

impl PartialEq for SplitMesh {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.feature_id == other.feature_id
            && self.oid == other.oid
            && self.source == other.source
            && self.generation == other.generation
            && self.indices == other.indices
            && self.bounds == other.bounds
            && self.transform == other.transform
            && self.world_matrix == other.world_matrix
            && self.material == other.material
            && self.property_data == other.property_data
            && Weak::ptr_eq(&self.attributes, &other.attributes)
    }
}

/// Extract the triangles of `target` from `mesh`.
///
/// Runs in O(vertex count + index count). Returns `None` when no vertex
/// carries `target`, when every candidate triangle straddles features, or
/// when the mesh has no feature-id attribute or positions. Meshes without
/// an index buffer are treated as consecutive vertex triples.
#[must_use]
pub fn partition(mesh: &Mesh, target: FeatureId) -> Option<SplitMesh> {
    let attribute = mesh.feature_attribute()?;

    // Pass 1: membership of every vertex.
    let mut in_target = vec![false; attribute.len()];
    let mut any = false;
    for (vertex, slot) in in_target.iter_mut().enumerate() {
        if attribute.feature_id(vertex) == Some(target) {
            *slot = true;
            any = true;
        }
    }
    if !any {
        return None;
    }

    // Pass 2: keep triangles fully inside the target.
    let member = |i: u32| in_target.get(i as usize).copied().unwrap_or(false);
    let mut kept = Vec::new();
    for_each_triangle(mesh, |tri| {
        if tri.iter().all(|&i| member(i)) {
            kept.extend_from_slice(&tri);
        }
    });
    if kept.is_empty() {
        return None;
    }

    build_split(mesh, target, kept)
}

/// Call `f` with each triangle of the mesh. Trailing partial triangles are ignored.
fn for_each_triangle(mesh: &Mesh, mut f: impl FnMut([u32; 3])) {
    if let Some(indices) = &mesh.indices {
        for tri in indices.chunks_exact(3) {
            f([tri[0], tri[1], tri[2]]);
        }
    } else {
        let count = u32::try_from(mesh.attributes.vertex_count()).unwrap_or(u32::MAX);
        let mut base = 0;
        while base + 3 <= count {
            f([base, base + 1, base + 2]);
            base += 3;
        }
    }
}

fn build_split(mesh: &Mesh, feature: FeatureId, indices: Vec<u32>) -> Option<SplitMesh> {
    let positions = mesh.attributes.positions()?;
    let bounds = Bounds::from_indexed(positions, &indices)?;

    let index = mesh.metadata_index();
    let oid = index.and_then(|index| index.oid_for_feature(feature));
    let property_data = property_record(mesh, feature);
    let name = match oid {
        Some(oid) => format!("feature_{feature}_{oid}"),
        None => format!("feature_{feature}_"),
    };

    Some(SplitMesh {
        name,
        feature_id: feature,
        oid,
        source: mesh.id,
        generation: Generation::default(),
        indices: Arc::from(indices),
        bounds,
        transform: mesh.transform,
        world_matrix: mesh.world_matrix,
        material: mesh.material,
        property_data,
        attributes: Arc::downgrade(&mesh.attributes),
    })
}

fn property_record(mesh: &Mesh, feature: FeatureId) -> Option<PropertyRecord> {
    let table = mesh.features.as_ref()?.active()?.property_table?;
    mesh.metadata.as_ref()?.property_table_data(table, feature)
}

/// Read the feature ids of a triangle's vertices.
///
/// Used by tests and picking to reason about triangle membership.
#[must_use]
pub fn triangle_features(attribute: &VertexAttribute, tri: [u32; 3]) -> [Option<FeatureId>; 3] {
    tri.map(|i| attribute.feature_id(i as usize))
}
