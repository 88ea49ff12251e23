//! Structural metadata: property tables and feature-id set descriptions.
//!
//! A feature-bearing mesh declares one or more feature-id sets. Each set
//! names the vertex attribute channel holding the per-vertex feature ids and
//! the property table whose rows are indexed by those ids. The property
//! table itself is provided by the tile format decoder through the
//! [`StructuralMetadata`] trait.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::{FeatureId, Oid};

/// Reserved property holding the application-level object id.
pub const OID_PROPERTY: &str = "_oid";

/// A single property value from a property table row.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// No value stored for this row.
    Null,
    /// Boolean property.
    Bool(bool),
    /// Integer property.
    Int(i64),
    /// Floating-point property.
    Float(f64),
    /// String property.
    String(String),
}

impl PropertyValue {
    /// Interpret the value as an object id.
    ///
    /// Integers are used directly; floats are accepted when they hold an
    /// exact integer (property tables often store ids as doubles).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_oid(&self) -> Option<Oid> {
        match *self {
            PropertyValue::Int(v) => Some(Oid(v)),
            PropertyValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(Oid(v as i64)),
            _ => None,
        }
    }
}

/// One row of a property table, keyed by field name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyRecord {
    fields: BTreeMap<String, PropertyValue>,
}

impl PropertyRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.fields.insert(name.into(), value);
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.fields.get(name)
    }

    /// The object id stored in the reserved `_oid` field.
    #[must_use]
    pub fn oid(&self) -> Option<Oid> {
        self.get(OID_PROPERTY).and_then(PropertyValue::as_oid)
    }
}

/// Access to the property tables of a loaded tile.
///
/// Implemented by the tile format decoder. Returning `None` means the table
/// or row does not exist.
pub trait StructuralMetadata: fmt::Debug + Send + Sync {
    /// Fetch the row for `feature_id` from property table `table`.
    fn property_table_data(&self, table: usize, feature_id: FeatureId) -> Option<PropertyRecord>;
}

/// A column-oriented in-memory property table.
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    /// Table name, for diagnostics.
    pub name: String,
    columns: BTreeMap<String, Vec<PropertyValue>>,
    rows: usize,
}

impl PropertyTable {
    /// Create an empty table with `rows` rows.
    #[must_use]
    pub fn new(name: impl Into<String>, rows: usize) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
            rows,
        }
    }

    /// Add a column. Missing trailing values read as [`PropertyValue::Null`].
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<PropertyValue>) -> Self {
        self.rows = self.rows.max(values.len());
        self.columns.insert(name.into(), values);
        self
    }

    /// Number of rows (features) in the table.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Assemble the record for one row.
    #[must_use]
    pub fn row(&self, feature_id: FeatureId) -> Option<PropertyRecord> {
        let row = feature_id.0 as usize;
        if row >= self.rows {
            return None;
        }
        let mut record = PropertyRecord::new();
        for (name, values) in &self.columns {
            let value = values.get(row).cloned().unwrap_or(PropertyValue::Null);
            record.insert(name.clone(), value);
        }
        Some(record)
    }
}

/// All property tables of one tile.
#[derive(Debug, Clone, Default)]
pub struct PropertyTables {
    /// Tables addressed by their index in the tile.
    pub tables: Vec<PropertyTable>,
}

impl PropertyTables {
    /// Wrap a list of tables.
    #[must_use]
    pub fn new(tables: Vec<PropertyTable>) -> Self {
        Self { tables }
    }
}

impl StructuralMetadata for PropertyTables {
    fn property_table_data(&self, table: usize, feature_id: FeatureId) -> Option<PropertyRecord> {
        self.tables.get(table)?.row(feature_id)
    }
}

/// One declared feature-id set of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureIdSet {
    /// Attribute channel: ids are read from `_feature_id_{attribute}`.
    pub attribute: u32,
    /// Property table whose rows are indexed by these feature ids.
    pub property_table: Option<usize>,
}

impl FeatureIdSet {
    /// Feature ids from attribute channel `attribute`, resolved against `property_table`.
    #[must_use]
    pub fn new(attribute: u32, property_table: usize) -> Self {
        Self {
            attribute,
            property_table: Some(property_table),
        }
    }

    /// Name of the vertex attribute carrying this set's feature ids.
    #[must_use]
    pub fn attribute_name(&self) -> String {
        feature_id_attribute_name(self.attribute)
    }
}

/// Name of the vertex attribute carrying feature-id channel `channel`.
#[must_use]
pub fn feature_id_attribute_name(channel: u32) -> String {
    format!("_feature_id_{channel}")
}

/// Feature-id declarations of one mesh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshFeatures {
    /// Declared feature-id sets, in declaration order.
    pub feature_ids: Vec<FeatureIdSet>,
    /// Which declared set drives selection. Defaults to the first.
    pub channel: usize,
}

impl MeshFeatures {
    /// Declare a single feature-id set.
    #[must_use]
    pub fn single(set: FeatureIdSet) -> Self {
        Self {
            feature_ids: vec![set],
            channel: 0,
        }
    }

    /// The feature-id set used for selection, if declared.
    #[must_use]
    pub fn active(&self) -> Option<&FeatureIdSet> {
        self.feature_ids.get(self.channel)
    }
}
