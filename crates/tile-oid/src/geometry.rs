//! Vertex attribute buffers and bounds.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::types::FeatureId;

/// Name of the position attribute.
pub const ATTRIBUTE_POSITION: &str = "position";
/// Name of the normal attribute.
pub const ATTRIBUTE_NORMAL: &str = "normal";
/// Name of the first texture coordinate attribute.
pub const ATTRIBUTE_UV: &str = "uv";

/// A single vertex attribute buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexAttribute {
    /// One float per vertex (feature ids are stored this way).
    Float32(Vec<f32>),
    /// One unsigned integer per vertex.
    Uint32(Vec<u32>),
    /// Two floats per vertex.
    Float32x2(Vec<[f32; 2]>),
    /// Three floats per vertex.
    Float32x3(Vec<[f32; 3]>),
}

impl VertexAttribute {
    /// Number of vertices in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Uint32(v) => v.len(),
            Self::Float32x2(v) => v.len(),
            Self::Float32x3(v) => v.len(),
        }
    }

    /// Whether the buffer holds no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a scalar attribute as a feature id.
    ///
    /// Returns `None` for vector attributes, out-of-range indices and values
    /// that are not valid feature ids.
    #[must_use]
    pub fn feature_id(&self, index: usize) -> Option<FeatureId> {
        match self {
            Self::Float32(v) => v.get(index).copied().and_then(FeatureId::from_attribute),
            Self::Uint32(v) => v.get(index).copied().map(FeatureId),
            Self::Float32x2(_) | Self::Float32x3(_) => None,
        }
    }

    /// Whether this attribute can hold feature ids.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Float32(_) | Self::Uint32(_))
    }
}

/// The named vertex attribute buffers of one mesh.
///
/// Buffers are immutable once built. Meshes hold them behind an `Arc` so
/// split meshes can reference them without copying.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexAttributes {
    attributes: BTreeMap<String, VertexAttribute>,
}

impl VertexAttributes {
    /// Create an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute insertion.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, attribute: VertexAttribute) -> Self {
        self.insert(name, attribute);
        self
    }

    /// Insert or replace an attribute.
    pub fn insert(&mut self, name: impl Into<String>, attribute: VertexAttribute) {
        self.attributes.insert(name.into(), attribute);
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.get(name)
    }

    /// Position buffer, if present and three-component.
    #[must_use]
    pub fn positions(&self) -> Option<&[[f32; 3]]> {
        match self.get(ATTRIBUTE_POSITION)? {
            VertexAttribute::Float32x3(p) => Some(p),
            _ => None,
        }
    }

    /// Number of vertices, taken from the position buffer.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions().map_or(0, <[_]>::len)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere center.
    pub center: Vec3,
    /// Sphere radius.
    pub radius: f32,
}

/// Box and sphere bounds of a set of triangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Axis-aligned box.
    pub aabb: Aabb,
    /// Sphere centered on the box center.
    pub sphere: BoundingSphere,
}

impl Bounds {
    /// Compute bounds over the vertices referenced by `indices`.
    ///
    /// Only referenced vertices contribute, so a subset of triangles gets a
    /// tight box. Indices outside `positions` are ignored. Returns `None`
    /// when no valid vertex is referenced.
    #[must_use]
    pub fn from_indexed(positions: &[[f32; 3]], indices: &[u32]) -> Option<Self> {
        let referenced = || {
            indices
                .iter()
                .filter_map(|&i| positions.get(i as usize))
                .map(|&p| Vec3::from_array(p))
        };

        let mut iter = referenced();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        let aabb = Aabb { min, max };

        // Sphere centered on the box, radius reaching the farthest vertex.
        let center = aabb.center();
        let radius_sq = referenced()
            .map(|p| center.distance_squared(p))
            .fold(0.0_f32, f32::max);

        Some(Self {
            aabb,
            sphere: BoundingSphere {
                center,
                radius: radius_sq.sqrt(),
            },
        })
    }
}
