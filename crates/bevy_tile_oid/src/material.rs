//! `StandardMaterial` extended with the hidden-feature discard test.
//!
//! Every fragment compares its interpolated feature id (carried in
//! `UV_1.x`) against the slots of a per-mesh uniform table and is discarded
//! on a match. The number of slots the shader scans is a shader def, so a
//! change of table length re-specialises the pipeline while a change of
//! values only re-uploads the uniform.

use bevy::asset::embedded_asset;
use bevy::mesh::MeshVertexBufferLayoutRef;
use bevy::pbr::{
    ExtendedMaterial, MaterialExtension, MaterialExtensionKey, MaterialExtensionPipeline,
};
use bevy::prelude::*;
use bevy::render::render_resource::{
    AsBindGroup, RenderPipelineDescriptor, ShaderType, SpecializedMeshPipelineError,
};
use bevy::shader::{ShaderDefVal, ShaderRef};
use bytemuck::{Pod, Zeroable};
use tile_oid::{BASE_RENDER_STATE, BlendMode, DiscardTest, SENTINEL, VisibilityTable};

/// Largest table the uniform can hold.
pub const MAX_TABLE_LEN: usize = 1024;

/// Number of `vec4` slots in the uniform.
pub const TABLE_VEC4S: usize = MAX_TABLE_LEN / 4;

/// Plugin that registers the feature material.
pub struct FeatureMaterialPlugin;

impl Plugin for FeatureMaterialPlugin {
    fn build(&self, app: &mut App) {
        embedded_asset!(app, "feature_mask.wgsl");
        app.add_plugins(MaterialPlugin::<FeatureMaterial>::default());
    }
}

/// Feature material: `StandardMaterial` extended with the discard test.
pub type FeatureMaterial = ExtendedMaterial<StandardMaterial, FeatureMaskExtension>;

/// Hidden feature ids, packed four per `vec4`.
#[derive(ShaderType, Debug, Clone)]
pub struct FeatureTable {
    /// Feature ids, or the sentinel for unused slots.
    pub values: [Vec4; TABLE_VEC4S],
}

impl Default for FeatureTable {
    fn default() -> Self {
        Self {
            values: [Vec4::splat(SENTINEL); TABLE_VEC4S],
        }
    }
}

impl FeatureTable {
    /// Pack a visibility table. Slots past its end stay at the sentinel.
    #[must_use]
    pub fn pack(table: &VisibilityTable) -> Self {
        let mut packed = Self::default();
        for (slot, chunk) in packed.values.iter_mut().zip(table.values.chunks(4)) {
            let mut lanes = [SENTINEL; 4];
            lanes[..chunk.len()].copy_from_slice(chunk);
            *slot = Vec4::from_array(lanes);
        }
        packed
    }
}

/// Extension to `StandardMaterial` holding one mesh's hidden-feature table.
#[derive(Asset, AsBindGroup, TypePath, Debug, Clone, Default)]
#[bind_group_data(FeatureMaskKey)]
pub struct FeatureMaskExtension {
    /// Table values; only the first `capacity` slots are scanned.
    #[uniform(100)]
    pub table: FeatureTable,
    /// Table length the pipeline is specialised for.
    pub capacity: u32,
}

impl FeatureMaskExtension {
    /// An extension scanning `capacity` slots, all initially empty.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            table: FeatureTable::default(),
            capacity: clamp_capacity(capacity),
        }
    }

    /// Replace the table and its length.
    pub fn apply(&mut self, table: &VisibilityTable) {
        self.table = FeatureTable::pack(table);
        self.capacity = clamp_capacity(table.capacity());
    }
}

/// Pipeline key: the scanned table length.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct FeatureMaskKey {
    capacity: u32,
}

impl From<&FeatureMaskExtension> for FeatureMaskKey {
    fn from(extension: &FeatureMaskExtension) -> Self {
        Self {
            capacity: extension.capacity,
        }
    }
}

impl MaterialExtension for FeatureMaskExtension {
    fn fragment_shader() -> ShaderRef {
        "embedded://bevy_tile_oid/feature_mask.wgsl".into()
    }

    fn specialize(
        _pipeline: &MaterialExtensionPipeline,
        descriptor: &mut RenderPipelineDescriptor,
        _layout: &MeshVertexBufferLayoutRef,
        key: MaterialExtensionKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        if BASE_RENDER_STATE.double_sided {
            descriptor.primitive.cull_mode = None;
        }
        let test = DiscardTest::new(key.bind_group_data.capacity as usize);
        if let Some(fragment) = descriptor.fragment.as_mut() {
            fragment.shader_defs.push(shader_def(&test));
        }
        tracing::debug!(capacity = test.capacity, "specialised feature mask pipeline");
        Ok(())
    }
}

/// Shader def bounding the slots a discard test scans.
fn shader_def(test: &DiscardTest) -> ShaderDefVal {
    let vec4s = clamp_capacity(test.capacity).div_ceil(4);
    ShaderDefVal::UInt("FEATURE_ID_VEC4_COUNT".into(), vec4s)
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_capacity(capacity: usize) -> u32 {
    capacity.min(MAX_TABLE_LEN) as u32
}

/// Apply the forced render state to a copy of `base`.
#[must_use]
pub fn patch_base_material(mut base: StandardMaterial) -> StandardMaterial {
    let state = BASE_RENDER_STATE;
    base.double_sided = state.double_sided;
    if state.double_sided {
        base.cull_mode = None;
    }
    if state.blend == BlendMode::Translucent {
        base.alpha_mode = AlphaMode::Blend;
        base.base_color = base.base_color.with_alpha(state.opacity);
    }
    base
}
