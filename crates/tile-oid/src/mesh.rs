//! Batched meshes and the tiles that carry them.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::geometry::{VertexAttribute, VertexAttributes};
use crate::index::MetadataIndex;
use crate::metadata::{MeshFeatures, StructuralMetadata};
use crate::types::{MaterialHandle, MeshId, TileId};

/// Local transform of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position relative to the parent.
    pub translation: Vec3,
    /// Rotation relative to the parent.
    pub rotation: Quat,
    /// Non-uniform scale.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// The local matrix for this transform.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// How a mesh takes part in object selection, decided once per load.
#[derive(Debug, Clone, Default)]
pub enum MeshKind {
    /// No usable feature ids or property table. Ignored by resolution.
    #[default]
    Plain,
    /// Per-vertex feature ids resolved against a property table.
    FeatureBearing(MetadataIndex),
}

/// A batched renderable primitive.
///
/// One mesh draws many logical objects in a single call; every vertex
/// belongs to exactly one feature id.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Identity assigned by the tiling engine.
    pub id: MeshId,
    /// Shared vertex attribute buffers.
    pub attributes: Arc<VertexAttributes>,
    /// Triangle list indices, three per triangle.
    pub indices: Option<Arc<[u32]>>,
    /// Local transform.
    pub transform: Transform,
    /// Model-to-world matrix.
    pub world_matrix: Mat4,
    /// Renderer material.
    pub material: MaterialHandle,
    /// Feature-id declarations from the tile format, if any.
    pub features: Option<MeshFeatures>,
    /// Property tables from the tile format, if any.
    pub metadata: Option<Arc<dyn StructuralMetadata>>,
    /// Content URI of the tile this mesh was loaded from.
    pub tile_uri: Option<String>,
    /// Selection classification, assigned when the owning tile loads.
    pub kind: MeshKind,
}

impl Mesh {
    /// Create a plain mesh from attribute buffers and triangle indices.
    #[must_use]
    pub fn new(id: MeshId, attributes: VertexAttributes, indices: Option<Vec<u32>>) -> Self {
        Self {
            id,
            attributes: Arc::new(attributes),
            indices: indices.map(Arc::from),
            transform: Transform::default(),
            world_matrix: Mat4::IDENTITY,
            material: MaterialHandle::default(),
            features: None,
            metadata: None,
            tile_uri: None,
            kind: MeshKind::Plain,
        }
    }

    /// Attach feature-id declarations and property tables.
    #[must_use]
    pub fn with_features(
        mut self,
        features: MeshFeatures,
        metadata: Arc<dyn StructuralMetadata>,
    ) -> Self {
        self.features = Some(features);
        self.metadata = Some(metadata);
        self
    }

    /// Set the local transform; the world matrix follows it.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self.world_matrix = transform.to_matrix();
        self
    }

    /// Set the material handle.
    #[must_use]
    pub fn with_material(mut self, material: MaterialHandle) -> Self {
        self.material = material;
        self
    }

    /// The metadata index, when the mesh is feature-bearing.
    #[must_use]
    pub fn metadata_index(&self) -> Option<&MetadataIndex> {
        match &self.kind {
            MeshKind::Plain => None,
            MeshKind::FeatureBearing(index) => Some(index),
        }
    }

    /// The per-vertex feature-id attribute of the active channel.
    #[must_use]
    pub fn feature_attribute(&self) -> Option<&VertexAttribute> {
        let set = self.features.as_ref()?.active()?;
        self.attributes
            .get(&set.attribute_name())
            .filter(|attr| attr.is_scalar())
    }
}

/// A streamed tile as delivered by the tiling engine's load notification.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Identity assigned by the tiling engine.
    pub id: TileId,
    /// Content URI, when the tile has one.
    pub uri: Option<String>,
    /// Meshes carried by the tile.
    pub meshes: Vec<Mesh>,
}

impl Tile {
    /// Create a tile record.
    #[must_use]
    pub fn new(id: TileId, uri: Option<String>, meshes: Vec<Mesh>) -> Self {
        Self { id, uri, meshes }
    }
}
