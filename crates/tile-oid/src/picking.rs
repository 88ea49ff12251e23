//! Reading the object under a ray hit.
//!
//! The host performs the intersection; this module turns the hit face and
//! point into a feature id, a property record and the object id, which is
//! what the hide and resolve calls take.

use glam::Vec3;

use crate::error::QueryError;
use crate::mesh::Mesh;
use crate::metadata::PropertyRecord;
use crate::partition::triangle_features;
use crate::types::{FeatureId, Oid};

/// A ray/mesh intersection as reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Intersection {
    /// Vertex indices of the hit triangle.
    pub face: Option<[u32; 3]>,
    /// Index of the hit triangle.
    pub face_index: Option<usize>,
    /// Hit location in world space.
    pub point: Option<Vec3>,
}

impl Intersection {
    /// A hit on `face` at world-space `point`.
    #[must_use]
    pub fn new(face: [u32; 3], point: Vec3) -> Self {
        Self {
            face: Some(face),
            face_index: None,
            point: Some(point),
        }
    }
}

/// What was found at a hit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureInfo {
    /// Object id of the hit feature.
    pub oid: Option<Oid>,
    /// Feature id of the selection channel at the hit.
    pub feature_id: Option<FeatureId>,
    /// Feature id at the hit for each declared feature-id set, in declaration order.
    pub features: Vec<Option<FeatureId>>,
    /// Property record of the hit feature.
    pub property_data: Option<PropertyRecord>,
    /// Whether `oid` was resolved.
    pub valid: bool,
    /// Why the query failed.
    pub error: Option<String>,
}

impl FeatureInfo {
    fn failed(error: &QueryError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Look up the feature and object at `hit` on `mesh`.
///
/// Never fails: problems are reported through [`FeatureInfo::error`].
#[must_use]
pub fn query_feature_at_point(mesh: &Mesh, hit: &Intersection) -> FeatureInfo {
    let Some(face) = hit.face else {
        return FeatureInfo::failed(&QueryError::InvalidHit);
    };
    let (Some(features), Some(metadata)) = (&mesh.features, &mesh.metadata) else {
        return FeatureInfo::failed(&QueryError::NotFeatureBearing);
    };

    let len = mesh.attributes.vertex_count();
    if let Some(&index) = face.iter().find(|&&i| i as usize >= len) {
        return FeatureInfo::failed(&QueryError::FaceOutOfRange { index, len });
    }

    let corner = hit
        .point
        .and_then(|point| nearest_corner(mesh, face, point))
        .unwrap_or(0);

    let found: Vec<Option<FeatureId>> = features
        .feature_ids
        .iter()
        .map(|set| {
            mesh.attributes
                .get(&set.attribute_name())
                .filter(|attr| attr.is_scalar())
                .and_then(|attr| triangle_features(attr, face)[corner])
        })
        .collect();

    if found.iter().all(Option::is_none) {
        return FeatureInfo::failed(&QueryError::NoFeatureAtHit);
    }
    let Some(set) = features.active() else {
        return FeatureInfo {
            features: found,
            ..FeatureInfo::failed(&QueryError::FeatureIdsUnavailable)
        };
    };
    let Some(feature_id) = found.get(features.channel).copied().flatten() else {
        return FeatureInfo {
            features: found,
            ..FeatureInfo::failed(&QueryError::NoFeatureAtHit)
        };
    };

    let property_data = set
        .property_table
        .and_then(|table| metadata.property_table_data(table, feature_id));
    let oid = property_data.as_ref().and_then(PropertyRecord::oid);
    let error = oid.is_none().then(|| QueryError::OidNotFound.to_string());
    if error.is_some() {
        tracing::trace!(mesh = mesh.id.0, feature = feature_id.0, "hit feature has no oid");
    }

    FeatureInfo {
        oid,
        feature_id: Some(feature_id),
        features: found,
        property_data,
        valid: oid.is_some(),
        error,
    }
}

/// Corner of `face` with the largest barycentric weight at world-space `point`.
fn nearest_corner(mesh: &Mesh, face: [u32; 3], point: Vec3) -> Option<usize> {
    let positions = mesh.attributes.positions()?;
    let [a, b, c] = face.map(|i| {
        mesh.world_matrix
            .transform_point3(Vec3::from_array(positions[i as usize]))
    });
    let weights = barycentric(point, a, b, c)?;
    let weights = weights.to_array();
    let mut best = 0;
    for corner in 1..3 {
        if weights[corner] > weights[best] {
            best = corner;
        }
    }
    Some(best)
}

/// Barycentric coordinates of `p` with respect to triangle `abc`.
///
/// `None` for degenerate triangles.
fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<Vec3> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= f32::EPSILON {
        return None;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Some(Vec3::new(1.0 - v - w, v, w))
}
