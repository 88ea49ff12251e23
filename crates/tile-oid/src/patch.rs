//! Bookkeeping for renderer materials carrying the per-pixel discard test.
//!
//! The table length is baked into the compiled pipeline, so the renderer
//! has to know when the length moved versus when only the values did. A
//! [`PatchTracker`] remembers what was last applied to one material and
//! turns the current selection state into the cheapest sufficient action.

use crate::visibility::DISCARD_TOLERANCE;

/// How fragments of patched materials are blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Depth-tested, written opaque.
    Opaque,
    /// Alpha blended.
    Translucent,
}

/// Render state forced onto every patched material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStateOverride {
    /// Disable back-face culling.
    pub double_sided: bool,
    /// Blend mode.
    pub blend: BlendMode,
    /// Fixed opacity applied when blending.
    pub opacity: f32,
}

/// Double-sided, translucent at half opacity.
pub const BASE_RENDER_STATE: RenderStateOverride = RenderStateOverride {
    double_sided: true,
    blend: BlendMode::Translucent,
    opacity: 0.5,
};

/// Parameters of the discard test a patched material runs per fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscardTest {
    /// Number of table slots compared against.
    pub capacity: usize,
    /// Absolute tolerance of the feature-id comparison.
    pub tolerance: f32,
}

impl DiscardTest {
    /// A test over `capacity` slots at the standard tolerance.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tolerance: DISCARD_TOLERANCE,
        }
    }
}

/// What the renderer must do to bring a material up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchAction {
    /// Nothing changed since the last sync.
    None,
    /// Same table length, new values: re-upload only.
    Upload,
    /// Table length changed: rebuild the pipeline, then upload.
    Recompile {
        /// Length the pipeline was built for, if it was built.
        from: Option<usize>,
        /// Length to build for.
        to: usize,
    },
}

impl PatchAction {
    /// Whether the pipeline must be rebuilt.
    #[must_use]
    pub fn needs_recompile(self) -> bool {
        matches!(self, Self::Recompile { .. })
    }

    /// Whether table values must be re-uploaded.
    #[must_use]
    pub fn needs_upload(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Last state applied to one patched material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchTracker {
    applied_capacity: Option<usize>,
    applied_revision: Option<u64>,
}

impl PatchTracker {
    /// A tracker for a material that has not been patched yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// What [`sync`](Self::sync) would return, without recording anything.
    ///
    /// `revision` identifies the table contents; it changes whenever any
    /// mesh's table may have changed.
    #[must_use]
    pub fn pending(&self, capacity: usize, revision: u64) -> PatchAction {
        if self.applied_capacity != Some(capacity) {
            PatchAction::Recompile {
                from: self.applied_capacity,
                to: capacity,
            }
        } else if self.applied_revision != Some(revision) {
            PatchAction::Upload
        } else {
            PatchAction::None
        }
    }

    /// Record that the material now reflects `capacity` and `revision`.
    pub fn sync(&mut self, capacity: usize, revision: u64) -> PatchAction {
        let action = self.pending(capacity, revision);
        self.applied_capacity = Some(capacity);
        self.applied_revision = Some(revision);
        action
    }

    /// The table length the material's pipeline was built for.
    #[must_use]
    pub fn applied_capacity(&self) -> Option<usize> {
        self.applied_capacity
    }
}
