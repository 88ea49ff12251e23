//! End-to-end selection flows through `FeatureSelection`.

use std::sync::Arc;

use tile_oid::geometry::ATTRIBUTE_POSITION;
use tile_oid::{
    Error, FeatureId, FeatureIdSet, FeatureSelection, Mesh, MeshFeatures, MeshId, MeshKind,
    OID_PROPERTY, Oid, PropertyTable, PropertyTables, PropertyValue, SENTINEL, SelectionConfig,
    Tile, TileId, VertexAttribute, VertexAttributes,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Feature ids `0,0,0,1,1,2,2,2,3,3,3,...` over `count` vertices.
fn feature_of(vertex: u32) -> u32 {
    match vertex {
        0..=2 => 0,
        3..=4 => 1,
        v => 2 + (v - 5) / 3,
    }
}

/// Feature 0 is OID 500, feature 1 is OID 501, feature `f` is `600 + f` otherwise.
fn oid_of(feature: u32) -> i64 {
    match feature {
        0 => 500,
        1 => 501,
        f => 600 + i64::from(f),
    }
}

/// A 100-vertex mesh drawn as overlapping triangles `(i, i+1, i+2)`.
fn scenario_mesh(id: u64) -> Mesh {
    let count = 100u32;
    let feature_ids: Vec<f32> = (0..count).map(|v| feature_of(v) as f32).collect();
    let positions = (0..count)
        .map(|v| [v as f32, (v % 2) as f32, 0.0])
        .collect();
    let indices = (0..count - 2).flat_map(|i| [i, i + 1, i + 2]).collect();
    let features = feature_of(count - 1) + 1;
    let oids = (0..features).map(|f| PropertyValue::Int(oid_of(f))).collect();
    let table = PropertyTable::new("objects", features as usize).with_column(OID_PROPERTY, oids);

    Mesh::new(
        MeshId(id),
        VertexAttributes::new()
            .with(ATTRIBUTE_POSITION, VertexAttribute::Float32x3(positions))
            .with("_feature_id_0", VertexAttribute::Float32(feature_ids)),
        Some(indices),
    )
    .with_features(
        MeshFeatures::single(FeatureIdSet::new(0, 0)),
        Arc::new(PropertyTables::new(vec![table])),
    )
}

fn oids(range: std::ops::Range<i64>) -> Vec<Oid> {
    range.map(Oid).collect()
}

#[test]
fn test_scenario_a_resolve_single_feature() {
    init_tracing();
    let mut selection = FeatureSelection::new(SelectionConfig::default()).unwrap();
    let mut tile = Tile::new(TileId(1), Some("tile/1".into()), vec![scenario_mesh(1)]);
    selection.on_tile_loaded(&mut tile);

    let splits = selection.meshes_for_oid(Oid(500), &tile.meshes);
    assert_eq!(splits.len(), 1);
    let split = &splits[0];
    assert_eq!(split.feature_id, FeatureId(0));
    assert_eq!(split.oid, Some(Oid(500)));
    assert_eq!(split.name, "feature_0_500");
    assert!(split.shares_attributes_with(&tile.meshes[0]));
    assert!(
        split
            .indices
            .iter()
            .all(|&vertex| feature_of(vertex) == 0)
    );
    assert_eq!(&split.indices[..], &[0, 1, 2]);

    // Feature 1 has two vertices and therefore no complete triangle.
    assert!(selection.meshes_for_oid(Oid(501), &tile.meshes).is_empty());
}

#[test]
fn test_scenario_b_capacity_growth() {
    init_tracing();
    let mut selection = FeatureSelection::new(SelectionConfig::default()).unwrap();
    assert_eq!(selection.table_capacity(), 32);

    let update = selection.hide_by_oids(&oids(0..40)).unwrap();
    assert_eq!(update.capacity, 64);
    assert!(update.capacity_changed());

    let update = selection.hide_by_oids(&oids(0..41)).unwrap();
    assert_eq!(update.capacity, 64);
    assert!(!update.capacity_changed());

    selection.hide_by_oids(&oids(0..64)).unwrap();
    assert_eq!(selection.table_capacity(), 64);
    selection.hide_by_oids(&oids(0..65)).unwrap();
    assert_eq!(selection.table_capacity(), 128);
}

#[test]
fn test_scenario_c_capacity_exceeded_leaves_state() {
    init_tracing();
    let config = SelectionConfig::default().with_hardware_limit(256);
    let mut selection = FeatureSelection::new(config).unwrap();
    selection.hide_by_oids(&oids(0..100)).unwrap();
    let before = selection.hidden().to_vec();

    let err = selection.hide_by_oids(&oids(0..300)).unwrap_err();
    assert!(matches!(
        err,
        Error::CapacityExceeded {
            requested: 300,
            limit: 256
        }
    ));
    assert_eq!(selection.hidden(), &before[..]);
    assert_eq!(selection.table_capacity(), 128);
}

#[test]
fn test_scenario_d_mesh_without_property_table() {
    init_tracing();
    let mut bare = scenario_mesh(2);
    bare.metadata = None;
    let mut selection = FeatureSelection::new(SelectionConfig::default()).unwrap();
    let mut tile = Tile::new(TileId(2), None, vec![bare, scenario_mesh(3)]);

    let report = selection.on_tile_loaded(&mut tile);
    assert_eq!(report.summary.plain, 1);
    assert!(matches!(tile.meshes[0].kind, MeshKind::Plain));

    let splits = selection.meshes_for_oid(Oid(500), &tile.meshes);
    assert_eq!(splits.len(), 1);
    assert_eq!(splits[0].source, MeshId(3));

    selection.hide_by_oids(&[Oid(500)]).unwrap();
    let table = selection.table_for(&tile.meshes[0]);
    assert!(table.values.iter().all(|&v| v == SENTINEL));
}

#[test]
fn test_cache_coherence_until_next_load() {
    init_tracing();
    let mut selection = FeatureSelection::new(SelectionConfig::default()).unwrap();
    let mut tiles = vec![Tile::new(TileId(1), None, vec![scenario_mesh(1)])];
    selection.on_tile_loaded(&mut tiles[0]);
    let meshes = || tiles.iter().flat_map(|tile| &tile.meshes);

    let first = selection.meshes_for_oid(Oid(602), meshes());
    let misses = selection.cache_stats().misses;
    let second = selection.meshes_for_oid(Oid(602), meshes());
    assert_eq!(first, second);
    assert_eq!(selection.cache_stats().misses, misses);
    assert!(first.iter().all(|split| selection.is_current(split)));

    let mut next = Tile::new(TileId(2), None, vec![scenario_mesh(2)]);
    selection.on_tile_loaded(&mut next);
    assert!(!selection.is_current(&first[0]));
    let third = selection.meshes_for_oid(Oid(602), meshes());
    assert_eq!(selection.cache_stats().misses, misses + 1);
    assert_eq!(third[0].indices, first[0].indices);
}

#[test]
fn test_unhide_idempotence() {
    init_tracing();
    let mut selection = FeatureSelection::new(SelectionConfig::default()).unwrap();
    selection.hide_by_oids(&oids(0..70)).unwrap();

    selection.unhide_by_oids(&oids(10..20));
    let once = selection.hidden().to_vec();
    let update = selection.unhide_by_oids(&oids(10..20));
    assert_eq!(selection.hidden(), &once[..]);
    assert_eq!(update.capacity, 64);

    selection.unhide_all();
    assert!(selection.hidden().is_empty());
    let update = selection.unhide_all();
    assert!(selection.hidden().is_empty());
    assert_eq!(update.capacity, 32);
}

#[test]
fn test_hidden_object_table_across_meshes() {
    init_tracing();
    let mut selection = FeatureSelection::new(SelectionConfig::default()).unwrap();
    let mut tile = Tile::new(TileId(1), None, vec![scenario_mesh(1)]);
    selection.on_tile_loaded(&mut tile);

    selection.hide_by_oids(&[Oid(1), Oid(602), Oid(500)]).unwrap();
    let table = selection.table_for(&tile.meshes[0]);
    assert_eq!(table.capacity(), 32);
    assert_eq!(&table.values[..3], &[SENTINEL, 2.0, 0.0]);
    assert!(table.hides(0.0));
    assert!(!table.hides(1.0));
}

#[test]
fn test_grouped_resolution_skips_misses() {
    init_tracing();
    let mut selection = FeatureSelection::new(SelectionConfig::default()).unwrap();
    let mut tile = Tile::new(TileId(1), None, vec![scenario_mesh(1), scenario_mesh(2)]);
    selection.on_tile_loaded(&mut tile);

    let grouped = selection.meshes_grouped_by_oid(&[Oid(603), Oid(501), Oid(500)], &tile.meshes);
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].0, Oid(603));
    assert_eq!(grouped[0].1.len(), 2);
    assert_eq!(grouped[1].0, Oid(500));
}
