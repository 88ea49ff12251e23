//! Error types for object-id selection.

use std::fmt;

/// Result type for tile-oid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when mutating selection state.
///
/// Missing feature data and empty resolutions are not errors: meshes without
/// feature ids are tagged [`MeshKind::Plain`](crate::MeshKind::Plain) and
/// resolution returns an empty vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The requested hidden set does not fit in the per-draw lookup table.
    CapacityExceeded {
        /// Number of object ids requested.
        requested: usize,
        /// Largest table the platform supports.
        limit: usize,
    },
    /// A selection configuration value is unusable.
    InvalidConfig {
        /// Description of what was invalid.
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExceeded { requested, limit } => {
                write!(
                    f,
                    "cannot hide {requested} object ids: the lookup table holds at most {limit}"
                )
            }
            Error::InvalidConfig { detail } => write!(f, "invalid selection config: {detail}"),
        }
    }
}

impl std::error::Error for Error {}

/// Reasons a feature query at a hit location failed.
///
/// These never cross the query boundary as `Err`; they are rendered into
/// [`FeatureInfo::error`](crate::FeatureInfo::error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The hit does not reference a triangle.
    InvalidHit,
    /// The hit mesh carries no feature ids or property table.
    NotFeatureBearing,
    /// The hit face references vertices outside the mesh.
    FaceOutOfRange { index: u32, len: usize },
    /// No feature id could be read at the hit location.
    NoFeatureAtHit,
    /// The configured feature-id set is not declared on the mesh.
    FeatureIdsUnavailable,
    /// The property record for the feature has no `_oid` field.
    OidNotFound,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHit => write!(f, "invalid hit object"),
            Self::NotFeatureBearing => {
                write!(f, "no mesh features or structural metadata found")
            }
            Self::FaceOutOfRange { index, len } => {
                write!(f, "face vertex {index} out of bounds for {len} vertices")
            }
            Self::NoFeatureAtHit => write!(f, "no features found at hit location"),
            Self::FeatureIdsUnavailable => write!(f, "feature ids not available"),
            Self::OidNotFound => write!(f, "oid not found in property data"),
        }
    }
}

impl std::error::Error for QueryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_exceeded_display() {
        let err = Error::CapacityExceeded {
            requested: 300,
            limit: 256,
        };
        assert_eq!(
            err.to_string(),
            "cannot hide 300 object ids: the lookup table holds at most 256"
        );
    }

    #[test]
    fn test_query_error_display() {
        let err = QueryError::FaceOutOfRange { index: 9, len: 3 };
        assert_eq!(err.to_string(), "face vertex 9 out of bounds for 3 vertices");
    }
}
