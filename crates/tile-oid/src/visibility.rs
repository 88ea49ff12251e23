//! Hidden object set and the per-draw lookup table derived from it.
//!
//! The renderer discards every fragment whose feature id matches a slot of
//! the table. The table length is a compile-time constant of the shader,
//! so it only changes in power-of-two steps: content changes at the same
//! length are a buffer upload, length changes are a pipeline rebuild.

use crate::config::SelectionConfig;
use crate::error::{Error, Result};
use crate::index::MetadataIndex;
use crate::types::Oid;

/// Value of unused table slots. Feature ids are non-negative, so it never matches.
pub const SENTINEL: f32 = -1.0;

/// Match tolerance of the per-pixel test; feature ids arrive as interpolated floats.
pub const DISCARD_TOLERANCE: f32 = 1e-3;

/// Table length for `hidden` object ids under `config`.
///
/// The smallest power of two that is at least `hidden` and at least the
/// minimum capacity, failing when it would exceed the effective limit.
pub fn table_capacity(hidden: usize, config: &SelectionConfig) -> Result<usize> {
    let limit = config.effective_limit();
    if hidden > limit {
        return Err(Error::CapacityExceeded {
            requested: hidden,
            limit,
        });
    }
    let min = config.effective_min_capacity();
    if hidden <= min {
        return Ok(min);
    }
    Ok(hidden.next_power_of_two())
}

/// Size of the table after a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityUpdate {
    /// Table length now in effect.
    pub capacity: usize,
    /// Table length before the transition.
    pub previous_capacity: usize,
    /// Number of hidden object ids.
    pub hidden: usize,
}

impl VisibilityUpdate {
    /// Whether pipelines built for the previous length must be rebuilt.
    #[must_use]
    pub fn capacity_changed(&self) -> bool {
        self.capacity != self.previous_capacity
    }
}

/// The lookup table for one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityTable {
    /// One slot per table entry: a feature id or [`SENTINEL`].
    pub values: Vec<f32>,
}

impl VisibilityTable {
    /// Table length.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// CPU mirror of the per-pixel test.
    #[must_use]
    pub fn hides(&self, feature_value: f32) -> bool {
        self.values
            .iter()
            .any(|&slot| (slot - feature_value).abs() < DISCARD_TOLERANCE)
    }
}

/// Owner of the hidden object set.
///
/// All mutation goes through [`hide`](Self::hide), [`unhide`](Self::unhide)
/// and [`clear`](Self::clear); each recomputes the capacity before
/// returning. Rejected requests leave the state untouched.
#[derive(Debug, Clone)]
pub struct VisibilityEncoder {
    config: SelectionConfig,
    hidden: Vec<Oid>,
    capacity: usize,
}

impl Default for VisibilityEncoder {
    fn default() -> Self {
        let config = SelectionConfig::default();
        Self {
            config,
            hidden: Vec::new(),
            capacity: config.effective_min_capacity(),
        }
    }
}

impl VisibilityEncoder {
    /// Create an encoder with nothing hidden.
    pub fn new(config: SelectionConfig) -> Result<Self> {
        config.validate()?;
        let capacity = table_capacity(0, &config)?;
        Ok(Self {
            config,
            hidden: Vec::new(),
            capacity,
        })
    }

    /// Replace the hidden set.
    ///
    /// Fails with [`Error::CapacityExceeded`] without modifying anything
    /// when `oids` does not fit.
    pub fn hide(&mut self, oids: &[Oid]) -> Result<VisibilityUpdate> {
        let capacity = match table_capacity(oids.len(), &self.config) {
            Ok(capacity) => capacity,
            Err(e) => {
                tracing::warn!(requested = oids.len(), "rejected hide request: {e}");
                return Err(e);
            }
        };
        self.hidden = oids.to_vec();
        Ok(self.commit(capacity))
    }

    /// Remove every id in `oids` from the hidden set, preserving order.
    pub fn unhide(&mut self, oids: &[Oid]) -> VisibilityUpdate {
        self.hidden.retain(|oid| !oids.contains(oid));
        let capacity = self.fitting_capacity();
        self.commit(capacity)
    }

    /// Hide nothing.
    pub fn clear(&mut self) -> VisibilityUpdate {
        self.hidden.clear();
        let capacity = self.config.effective_min_capacity();
        self.commit(capacity)
    }

    /// Change the platform limit, e.g. once the render device is known.
    ///
    /// Fails without modifying anything when the current hidden set would
    /// no longer fit.
    pub fn set_hardware_limit(&mut self, hardware_limit: usize) -> Result<VisibilityUpdate> {
        let config = self.config.with_hardware_limit(hardware_limit);
        config.validate()?;
        let capacity = table_capacity(self.hidden.len(), &config)?;
        self.config = config;
        Ok(self.commit(capacity))
    }

    /// Current table length.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hidden object ids in request order.
    #[must_use]
    pub fn hidden(&self) -> &[Oid] {
        &self.hidden
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Build the lookup table for a mesh.
    ///
    /// Slot `i` holds the mesh-local feature id of the `i`-th hidden object,
    /// or [`SENTINEL`] when the mesh has no such object or no index.
    #[must_use]
    pub fn table_for(&self, index: Option<&MetadataIndex>) -> VisibilityTable {
        let mut values = vec![SENTINEL; self.capacity];
        if let Some(index) = index {
            for (slot, &oid) in values.iter_mut().zip(&self.hidden) {
                if let Some(feature) = index.feature_for_oid(oid) {
                    *slot = feature.as_table_value();
                }
            }
        }
        VisibilityTable { values }
    }

    /// Capacity for the current set; shrinking never exceeds the limit.
    fn fitting_capacity(&self) -> usize {
        table_capacity(self.hidden.len(), &self.config).unwrap_or(self.capacity)
    }

    fn commit(&mut self, capacity: usize) -> VisibilityUpdate {
        let previous_capacity = self.capacity;
        self.capacity = capacity;
        if capacity != previous_capacity {
            tracing::debug!(
                previous_capacity,
                capacity,
                hidden = self.hidden.len(),
                "visibility table resized"
            );
        }
        VisibilityUpdate {
            capacity,
            previous_capacity,
            hidden: self.hidden.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn oids(n: usize) -> Vec<Oid> {
        (0..n as i64).map(Oid).collect()
    }

    fn encoder(limit: usize) -> VisibilityEncoder {
        VisibilityEncoder::new(SelectionConfig::default().with_hardware_limit(limit)).unwrap()
    }

    #[test]
    fn test_capacity_minimum() {
        let mut encoder = encoder(1024);
        assert_eq!(encoder.capacity(), 32);
        assert_eq!(encoder.hide(&oids(32)).unwrap().capacity, 32);
    }

    #[test]
    fn test_capacity_growth() {
        let mut encoder = encoder(1024);
        let update = encoder.hide(&oids(40)).unwrap();
        assert_eq!(update.capacity, 64);
        assert!(update.capacity_changed());

        let update = encoder.hide(&oids(41)).unwrap();
        assert_eq!(update.capacity, 64);
        assert!(!update.capacity_changed());

        assert_eq!(encoder.hide(&oids(64)).unwrap().capacity, 64);
        assert_eq!(encoder.hide(&oids(65)).unwrap().capacity, 128);
    }

    #[test]
    fn test_capacity_exceeded_is_atomic() {
        let mut encoder = encoder(256);
        encoder.hide(&oids(10)).unwrap();

        let err = encoder.hide(&oids(257)).unwrap_err();
        assert_eq!(
            err,
            Error::CapacityExceeded {
                requested: 257,
                limit: 256
            }
        );
        assert_eq!(encoder.hidden(), &oids(10)[..]);
        assert_eq!(encoder.capacity(), 32);
    }

    #[test]
    fn test_unhide_preserves_order() {
        let mut encoder = encoder(1024);
        encoder.hide(&[Oid(5), Oid(1), Oid(9), Oid(3)]).unwrap();
        encoder.unhide(&[Oid(1), Oid(42)]);
        assert_eq!(encoder.hidden(), &[Oid(5), Oid(9), Oid(3)]);
    }

    #[test]
    fn test_unhide_is_idempotent() {
        let mut encoder = encoder(1024);
        encoder.hide(&oids(100)).unwrap();
        let once = encoder.unhide(&oids(50));
        let hidden = encoder.hidden().to_vec();
        let twice = encoder.unhide(&oids(50));
        assert_eq!(encoder.hidden(), &hidden[..]);
        assert_eq!(once.capacity, twice.capacity);
        assert!(!twice.capacity_changed());
    }

    #[test]
    fn test_clear_twice() {
        let mut encoder = encoder(1024);
        encoder.hide(&oids(100)).unwrap();
        assert_eq!(encoder.clear().capacity, 32);
        assert!(encoder.hidden().is_empty());
        assert!(!encoder.clear().capacity_changed());
        assert!(encoder.hidden().is_empty());
    }

    #[test]
    fn test_set_hardware_limit_rejects_shrink_below_set() {
        let mut encoder = encoder(1024);
        encoder.hide(&oids(300)).unwrap();
        assert!(encoder.set_hardware_limit(256).is_err());
        assert_eq!(encoder.config().hardware_limit, 1024);
        assert_eq!(encoder.set_hardware_limit(4096).unwrap().capacity, 512);
    }

    #[test]
    fn test_table_for_mesh() {
        use crate::geometry::{VertexAttribute, VertexAttributes};
        use crate::index::build_index;
        use crate::mesh::Mesh;
        use crate::metadata::{
            FeatureIdSet, MeshFeatures, OID_PROPERTY, PropertyTable, PropertyTables,
            PropertyValue,
        };
        use crate::types::MeshId;
        use std::sync::Arc;

        let attributes = VertexAttributes::new()
            .with("_feature_id_0", VertexAttribute::Float32(vec![0.0, 1.0]));
        let table = PropertyTable::new("t", 2).with_column(
            OID_PROPERTY,
            vec![PropertyValue::Int(500), PropertyValue::Int(501)],
        );
        let mesh = Mesh::new(MeshId(1), attributes, None).with_features(
            MeshFeatures::single(FeatureIdSet::new(0, 0)),
            Arc::new(PropertyTables::new(vec![table])),
        );
        let index = build_index(&mesh).unwrap();

        let mut encoder = encoder(1024);
        encoder.hide(&[Oid(999), Oid(501)]).unwrap();
        let table = encoder.table_for(Some(&index));
        assert_eq!(table.capacity(), 32);
        assert_eq!(table.values[0], SENTINEL);
        assert_eq!(table.values[1], 1.0);
        assert!(table.values[2..].iter().all(|&v| v == SENTINEL));
        assert!(table.hides(1.0004));
        assert!(!table.hides(0.0));

        // Plain meshes get an all-sentinel table.
        let table = encoder.table_for(None);
        assert!(table.values.iter().all(|&v| v == SENTINEL));
    }

    #[test]
    fn test_table_uses_last_feature_of_shared_oid() {
        use crate::geometry::{VertexAttribute, VertexAttributes};
        use crate::index::build_index;
        use crate::mesh::Mesh;
        use crate::metadata::{
            FeatureIdSet, MeshFeatures, OID_PROPERTY, PropertyTable, PropertyTables,
            PropertyValue,
        };
        use crate::types::MeshId;
        use std::sync::Arc;

        // Features 2 and 0 both carry object 7; feature 0's first vertex comes later.
        let attributes = VertexAttributes::new()
            .with("_feature_id_0", VertexAttribute::Float32(vec![2.0, 2.0, 0.0, 1.0]));
        let table = PropertyTable::new("t", 3).with_column(
            OID_PROPERTY,
            vec![
                PropertyValue::Int(7),
                PropertyValue::Int(8),
                PropertyValue::Int(7),
            ],
        );
        let mesh = Mesh::new(MeshId(1), attributes, None).with_features(
            MeshFeatures::single(FeatureIdSet::new(0, 0)),
            Arc::new(PropertyTables::new(vec![table])),
        );
        let index = build_index(&mesh).unwrap();

        let mut encoder = encoder(1024);
        encoder.hide(&[Oid(7)]).unwrap();
        let table = encoder.table_for(Some(&index));
        assert_eq!(table.values[0], 0.0);
        assert!(!table.hides(2.0));
    }

    proptest! {
        #[test]
        fn prop_capacity_smallest_power_of_two(
            hidden in 0usize..5000,
            min_shift in 0u32..8,
            limit in 1usize..4096,
        ) {
            let config = SelectionConfig {
                min_capacity: 1 << min_shift,
                hardware_limit: limit,
            };
            match table_capacity(hidden, &config) {
                Ok(capacity) => {
                    prop_assert!(capacity.is_power_of_two());
                    prop_assert!(capacity >= hidden);
                    prop_assert!(capacity >= config.effective_min_capacity());
                    prop_assert!(capacity <= limit);
                    // Halving would break one of the bounds.
                    let half = capacity / 2;
                    prop_assert!(half < hidden || half < config.effective_min_capacity());
                }
                Err(Error::CapacityExceeded { requested, limit: effective }) => {
                    prop_assert_eq!(requested, hidden);
                    prop_assert!(hidden > effective);
                }
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }
    }
}
