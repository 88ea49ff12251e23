//! Per-object selection for streamed, batched 3D tiles.
//!
//! Tiles batch many logical objects into one mesh and tag every vertex with
//! a tile-local feature id. A property table maps each feature id to a
//! record whose `_oid` field names the application-level object. This crate
//! builds the feature-to-object index when a tile loads, extracts the
//! triangles of one object from a batched mesh, and maintains the per-draw
//! lookup table a renderer uses to discard fragments of hidden objects.
//!
//! # Design principles
//!
//! - **Explicit context**: all state lives in a [`FeatureSelection`] owned by the host
//! - **Classified once**: meshes are [`MeshKind::Plain`] or
//!   [`MeshKind::FeatureBearing`], decided at load time
//! - **Shared buffers**: split meshes reference their source's vertex buffers and
//!   carry a [`Generation`] so stale results are detectable
//! - **Renderer-agnostic**: rendering adapters consume [`VisibilityTable`] and
//!   [`PatchTracker`]; nothing here depends on a graphics API
//!
//! # Example
//!
//! ```ignore
//! use tile_oid::{FeatureSelection, Oid, SelectionConfig};
//!
//! let mut selection = FeatureSelection::new(SelectionConfig::default())?;
//!
//! // Index a freshly streamed tile before it is drawn.
//! selection.on_tile_loaded(&mut tile);
//!
//! // Hide two objects and fetch the geometry of a third.
//! selection.hide_by_oids(&[Oid(500), Oid(501)])?;
//! let splits = selection.meshes_for_oid(Oid(502), &tile.meshes);
//! ```

pub mod cache;
mod config;
mod error;
pub mod geometry;
pub mod index;
pub mod mesh;
pub mod metadata;
pub mod partition;
pub mod patch;
pub mod picking;
pub mod resolver;
mod selection;
pub mod types;
pub mod visibility;

pub use cache::{CacheStats, SplitMeshCache};
pub use config::{DEFAULT_HARDWARE_LIMIT, DEFAULT_MIN_CAPACITY, SelectionConfig};
pub use error::{Error, QueryError, Result};
pub use geometry::{Aabb, BoundingSphere, Bounds, VertexAttribute, VertexAttributes};
pub use index::{IndexSummary, MetadataIndex, build_index, index_mesh, index_tile};
pub use mesh::{Mesh, MeshKind, Tile, Transform};
pub use metadata::{
    FeatureIdSet, MeshFeatures, OID_PROPERTY, PropertyRecord, PropertyTable, PropertyTables,
    PropertyValue, StructuralMetadata,
};
pub use partition::{SplitMesh, partition};
pub use patch::{
    BASE_RENDER_STATE, BlendMode, DiscardTest, PatchAction, PatchTracker, RenderStateOverride,
};
pub use picking::{FeatureInfo, Intersection, query_feature_at_point};
pub use resolver::OidResolver;
pub use selection::{FeatureSelection, TileLoadReport};
pub use types::{FeatureId, Generation, MaterialHandle, MeshId, Oid, TileId};
pub use visibility::{
    DISCARD_TOLERANCE, SENTINEL, VisibilityEncoder, VisibilityTable, VisibilityUpdate,
    table_capacity,
};
