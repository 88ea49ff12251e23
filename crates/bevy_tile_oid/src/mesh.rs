//! Mesh conversion from tile meshes and split meshes to Bevy meshes.
//!
//! Feature ids are written to `UV_1.x`, where the feature material's
//! fragment shader reads them. Vertices without a valid feature id get the
//! sentinel so the discard test never matches them.

use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use tile_oid::geometry::{ATTRIBUTE_NORMAL, ATTRIBUTE_UV};
use tile_oid::{Mesh as SourceMesh, SENTINEL, SplitMesh, VertexAttribute, VertexAttributes};

/// Convert a tile mesh, carrying its feature ids when it has any.
///
/// Returns `None` when the mesh has no positions.
#[must_use]
pub fn convert_mesh(source: &SourceMesh) -> Option<Mesh> {
    let count = source.attributes.vertex_count();
    let indices = match &source.indices {
        Some(indices) => indices.to_vec(),
        None => (0..u32::try_from(count).ok()?).collect(),
    };
    let feature_ids = source.feature_attribute().map(|attribute| {
        (0..count)
            .map(|vertex| {
                let value = attribute
                    .feature_id(vertex)
                    .map_or(SENTINEL, |feature| feature.as_table_value());
                [value, 0.0]
            })
            .collect()
    });
    build_mesh(&source.attributes, indices, feature_ids)
}

/// Convert the triangles of a split mesh.
///
/// The vertex buffers are copied from the source, which must still be
/// loaded; returns `None` once it has been dropped.
#[must_use]
pub fn convert_split_mesh(split: &SplitMesh) -> Option<Mesh> {
    let attributes = split.attributes()?;
    let value = split.feature_id.as_table_value();
    let feature_ids = vec![[value, 0.0]; attributes.vertex_count()];
    build_mesh(&attributes, split.indices.to_vec(), Some(feature_ids))
}

fn build_mesh(
    attributes: &VertexAttributes,
    indices: Vec<u32>,
    feature_ids: Option<Vec<[f32; 2]>>,
) -> Option<Mesh> {
    let positions = attributes.positions()?;
    let count = positions.len();

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions.to_vec());
    if let Some(VertexAttribute::Float32x3(normals)) = attributes.get(ATTRIBUTE_NORMAL)
        && normals.len() == count
    {
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals.clone());
    }
    if let Some(VertexAttribute::Float32x2(uvs)) = attributes.get(ATTRIBUTE_UV)
        && uvs.len() == count
    {
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs.clone());
    }
    if let Some(feature_ids) = feature_ids {
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_1, feature_ids);
    }
    mesh.insert_indices(Indices::U32(indices));
    Some(mesh)
}
