//! Identifier types shared across the crate.

use std::fmt;

/// Application-level object identifier, read from the `_oid` property.
///
/// One object usually spans several triangles, several meshes and several
/// tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(pub i64);

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Oid {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Tile-local feature identifier baked into per-vertex data.
///
/// Feature ids are only unique within one mesh; the same value in two tiles
/// may name different objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureId(pub u32);

impl FeatureId {
    /// Convert a vertex attribute value into a feature id.
    ///
    /// Feature ids travel as floating-point attribute values. Negative,
    /// non-finite or fractional values do not name a feature.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_attribute(value: f32) -> Option<Self> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f32 {
            return None;
        }
        Some(Self(value as u32))
    }

    /// The value as written into a visibility table slot.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_table_value(self) -> f32 {
        self.0 as f32
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a loaded mesh, assigned by the tiling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub u64);

/// Identity of a streamed tile, assigned by the tiling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(pub u64);

/// Opaque reference to a material owned by the renderer.
///
/// Split meshes share their source's handle; materials are never cloned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MaterialHandle(pub u64);

/// Cache generation, incremented every time the split-mesh cache is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation after this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}
