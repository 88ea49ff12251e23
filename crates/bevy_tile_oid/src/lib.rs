//! Bevy integration for object-id selection in streamed 3D tiles.
//!
//! Hosts spawn one entity per tile mesh with a [`FeatureMesh`] holding the
//! source mesh, a [`TileMember`] naming its tile, and the usual `Mesh3d` and
//! `MeshMaterial3d<StandardMaterial>`. After writing a [`TileLoaded`]
//! message for the tile, the plugin indexes the meshes, swaps their material
//! for a [`FeatureMaterial`] and keeps the per-mesh hidden-feature tables in
//! sync with the [`OidSelection`] resource.
//!
//! # Design principles
//!
//! - **One material per mesh**: feature ids are tile-local, so every mesh gets
//!   its own table
//! - **Recompile on length only**: the pipeline key is the table length;
//!   value changes are plain asset updates
//! - **Core stays pure**: all selection logic lives in `tile_oid`

mod material;
mod mesh;

use bevy::ecs::message::{Message, MessageReader};
use bevy::prelude::*;
use bevy::render::renderer::RenderDevice;
use tile_oid::{FeatureSelection, PatchTracker, SelectionConfig, TileId};

pub use material::{
    FeatureMaskExtension, FeatureMaskKey, FeatureMaterial, FeatureMaterialPlugin, FeatureTable,
    MAX_TABLE_LEN, patch_base_material,
};
pub use mesh::{convert_mesh, convert_split_mesh};

/// Plugin that wires object-id selection into the render loop.
#[derive(Default)]
pub struct TileOidPlugin {
    /// Initial selection configuration. The hardware limit is further
    /// lowered to what the render device supports.
    ///
    /// Building the plugin panics if the configuration is invalid.
    pub config: SelectionConfig,
}

impl Plugin for TileOidPlugin {
    fn build(&self, app: &mut App) {
        let selection = match FeatureSelection::new(self.config) {
            Ok(selection) => selection,
            Err(e) => panic!("TileOidPlugin misconfigured: {e}"),
        };
        app.add_plugins(FeatureMaterialPlugin)
            .add_message::<TileLoaded>()
            .insert_resource(OidSelection(selection))
            .add_systems(Startup, apply_device_limit)
            .add_systems(Update, (handle_tile_loads, sync_feature_tables).chain());
    }
}

/// The selection context. Mutate it through `hide_by_oids` and friends;
/// tables are refreshed in the same frame.
#[derive(Resource, Debug, Deref, DerefMut)]
pub struct OidSelection(pub FeatureSelection);

/// The source mesh behind a rendered entity.
#[derive(Component, Debug)]
pub struct FeatureMesh(pub tile_oid::Mesh);

/// Tile that a mesh entity belongs to.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileMember(pub TileId);

/// Patch state of a mesh entity's feature material.
#[derive(Component, Debug, Default)]
pub struct FeaturePatch(pub PatchTracker);

/// A tile became resident. Its mesh entities must already exist.
#[derive(Message, Debug, Clone)]
pub struct TileLoaded {
    /// The tile.
    pub tile: TileId,
    /// Its content URI.
    pub uri: Option<String>,
}

/// Table length supported by a device with the given uniform binding size.
#[must_use]
pub fn device_table_limit(max_uniform_buffer_binding_size: u32) -> usize {
    let floats = usize::try_from(max_uniform_buffer_binding_size / 4).unwrap_or(usize::MAX);
    floats.min(MAX_TABLE_LEN)
}

fn apply_device_limit(device: Option<Res<RenderDevice>>, mut selection: ResMut<OidSelection>) {
    let Some(device) = device else {
        tracing::debug!("no render device; keeping configured table limit");
        return;
    };
    let limit = device_table_limit(device.limits().max_uniform_buffer_binding_size)
        .min(selection.config().hardware_limit);
    match selection.set_hardware_limit(limit) {
        Ok(update) => {
            tracing::info!(limit, capacity = update.capacity, "applied device table limit");
        }
        Err(e) => tracing::warn!("could not apply device table limit: {e}"),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn handle_tile_loads(
    mut commands: Commands,
    mut loads: MessageReader<TileLoaded>,
    mut selection: ResMut<OidSelection>,
    mut meshes: Query<(
        Entity,
        &TileMember,
        &mut FeatureMesh,
        Option<&MeshMaterial3d<StandardMaterial>>,
    )>,
    standard_materials: Res<Assets<StandardMaterial>>,
    mut feature_materials: ResMut<Assets<FeatureMaterial>>,
) {
    for load in loads.read() {
        let mut members: Vec<_> = meshes
            .iter_mut()
            .filter(|(_, member, ..)| member.0 == load.tile)
            .collect();
        if members.is_empty() {
            tracing::warn!(tile = load.tile.0, "tile load without mesh entities");
            continue;
        }

        selection.on_meshes_loaded(
            load.tile,
            load.uri.as_deref(),
            members.iter_mut().map(|(_, _, mesh, _)| &mut mesh.0),
        );

        let capacity = selection.table_capacity();
        for (entity, _, _, standard) in &members {
            let Some(standard) = standard else {
                continue;
            };
            let base = standard_materials
                .get(&standard.0)
                .cloned()
                .unwrap_or_default();
            let material = feature_materials.add(FeatureMaterial {
                base: patch_base_material(base),
                extension: FeatureMaskExtension::new(capacity),
            });
            commands
                .entity(*entity)
                .remove::<MeshMaterial3d<StandardMaterial>>()
                .insert((MeshMaterial3d(material), FeaturePatch::default()));
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn sync_feature_tables(
    selection: Res<OidSelection>,
    mut patched: Query<(
        &FeatureMesh,
        &MeshMaterial3d<FeatureMaterial>,
        &mut FeaturePatch,
    )>,
    mut materials: ResMut<Assets<FeatureMaterial>>,
) {
    let capacity = selection.table_capacity();
    let revision = selection.revision();

    for (mesh, handle, mut patch) in &mut patched {
        // Skip untouched materials to avoid needless asset change detection.
        let action = patch.0.pending(capacity, revision);
        if !action.needs_upload() {
            continue;
        }
        let Some(material) = materials.get_mut(&handle.0) else {
            continue;
        };
        material.extension.apply(&selection.table_for(&mesh.0));
        patch.0.sync(capacity, revision);
        if action.needs_recompile() {
            tracing::debug!(mesh = mesh.0.id.0, capacity, "feature table resized");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tile_oid::geometry::ATTRIBUTE_POSITION;
    use tile_oid::{
        FeatureIdSet, MeshFeatures, MeshId, OID_PROPERTY, Oid, PropertyTable, PropertyTables,
        PropertyValue, SENTINEL, VertexAttribute, VertexAttributes,
    };

    use super::*;

    fn source_mesh() -> tile_oid::Mesh {
        let attributes = VertexAttributes::new()
            .with(ATTRIBUTE_POSITION, VertexAttribute::Float32x3(vec![[0.0; 3]; 6]))
            .with(
                "_feature_id_0",
                VertexAttribute::Float32(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
            );
        let table = PropertyTable::new("t", 2).with_column(
            OID_PROPERTY,
            vec![PropertyValue::Int(500), PropertyValue::Int(501)],
        );
        tile_oid::Mesh::new(MeshId(1), attributes, None).with_features(
            MeshFeatures::single(FeatureIdSet::new(0, 0)),
            Arc::new(PropertyTables::new(vec![table])),
        )
    }

    fn app() -> App {
        let mut app = App::new();
        app.add_message::<TileLoaded>()
            .insert_resource(OidSelection(FeatureSelection::default()))
            .insert_resource(Assets::<StandardMaterial>::default())
            .insert_resource(Assets::<FeatureMaterial>::default())
            .add_systems(Update, (handle_tile_loads, sync_feature_tables).chain());
        app
    }

    #[test]
    fn test_tile_load_swaps_material_and_syncs_table() {
        let mut app = app();
        let standard = app
            .world_mut()
            .resource_mut::<Assets<StandardMaterial>>()
            .add(StandardMaterial::default());
        let entity = app
            .world_mut()
            .spawn((
                FeatureMesh(source_mesh()),
                TileMember(TileId(1)),
                MeshMaterial3d(standard),
            ))
            .id();
        app.world_mut().write_message(TileLoaded {
            tile: TileId(1),
            uri: Some("tiles/1".into()),
        });
        app.update();

        let world = app.world();
        assert!(world.get::<MeshMaterial3d<StandardMaterial>>(entity).is_none());
        let handle = world
            .get::<MeshMaterial3d<FeatureMaterial>>(entity)
            .unwrap()
            .0
            .clone();
        let mesh = &world.get::<FeatureMesh>(entity).unwrap().0;
        assert_eq!(mesh.tile_uri.as_deref(), Some("tiles/1"));
        assert!(mesh.metadata_index().is_some());

        app.world_mut()
            .resource_mut::<OidSelection>()
            .hide_by_oids(&[Oid(501)])
            .unwrap();
        app.update();

        let materials = app.world().resource::<Assets<FeatureMaterial>>();
        let material = materials.get(&handle).unwrap();
        assert_eq!(material.extension.capacity, 32);
        assert_eq!(material.extension.table.values[0].x, 1.0);
        assert_eq!(material.extension.table.values[0].y, SENTINEL);
        assert_eq!(material.base.alpha_mode, AlphaMode::Blend);
        let patch = app.world().get::<FeaturePatch>(entity).unwrap();
        assert_eq!(patch.0.applied_capacity(), Some(32));
    }

    #[test]
    #[should_panic(expected = "TileOidPlugin misconfigured")]
    fn test_invalid_config_panics_at_build() {
        App::new().add_plugins(TileOidPlugin {
            config: SelectionConfig::default().with_min_capacity(3),
        });
    }

    #[test]
    fn test_device_table_limit() {
        // WebGL2 guarantees 16 KiB.
        assert_eq!(device_table_limit(16 * 1024), 1024);
        assert_eq!(device_table_limit(1024), 256);
        assert_eq!(device_table_limit(64 * 1024), MAX_TABLE_LEN);
    }
}
