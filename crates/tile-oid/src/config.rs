//! Selection configuration.

use crate::error::{Error, Result};

/// Default smallest lookup table length.
pub const DEFAULT_MIN_CAPACITY: usize = 32;

/// Hardware limit assumed until the renderer reports one.
pub const DEFAULT_HARDWARE_LIMIT: usize = 1024;

/// Sizing policy for the per-draw hidden-feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionConfig {
    /// Smallest table length. Must be a power of two.
    pub min_capacity: usize,
    /// Largest table length the platform supports for the per-pixel lookup.
    pub hardware_limit: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_capacity: DEFAULT_MIN_CAPACITY,
            hardware_limit: DEFAULT_HARDWARE_LIMIT,
        }
    }
}

impl SelectionConfig {
    /// Set the minimum table length.
    #[must_use]
    pub fn with_min_capacity(mut self, min_capacity: usize) -> Self {
        self.min_capacity = min_capacity;
        self
    }

    /// Set the platform limit.
    #[must_use]
    pub fn with_hardware_limit(mut self, hardware_limit: usize) -> Self {
        self.hardware_limit = hardware_limit;
        self
    }

    /// Check that the configuration can produce a table.
    pub fn validate(&self) -> Result<()> {
        if self.min_capacity == 0 || !self.min_capacity.is_power_of_two() {
            return Err(Error::InvalidConfig {
                detail: format!(
                    "min_capacity {} is not a non-zero power of two",
                    self.min_capacity
                ),
            });
        }
        if self.hardware_limit == 0 {
            return Err(Error::InvalidConfig {
                detail: "hardware_limit must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Largest power of two not above the hardware limit.
    ///
    /// Tables are always power-of-two sized, so this is the real ceiling.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        if self.hardware_limit == 0 {
            return 0;
        }
        1 << (usize::BITS - 1 - self.hardware_limit.leading_zeros())
    }

    /// The minimum capacity, lowered to the effective limit on small devices.
    #[must_use]
    pub fn effective_min_capacity(&self) -> usize {
        self.min_capacity.min(self.effective_limit())
    }
}
