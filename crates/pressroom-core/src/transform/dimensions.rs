//! Output dimension resolution.
//!
//! Pure and deterministic: the same source dimensions and resize mode always
//! give the same output size.

use serde::{Deserialize, Serialize};

use crate::settings::ResizeMode;

/// Largest output side, in pixels.
pub const MAX_DIMENSION: u32 = 32_768;

/// Largest output area: 100 megapixels, 400 MB as RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Final output size. Both dimensions are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOutputDimensions {
    pub width: u32,
    pub height: u32,
}

impl ResolvedOutputDimensions {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether a surface of this size may be allocated: no side above
    /// [`MAX_DIMENSION`] and no more than [`MAX_PIXELS`] in total.
    pub fn within_limits(&self) -> bool {
        self.width <= MAX_DIMENSION && self.height <= MAX_DIMENSION && self.pixel_count() <= MAX_PIXELS
    }
}

/// Compute output dimensions for a source of `source_width` x `source_height`.
///
/// - `None`: source dimensions unchanged
/// - `Absolute`: the target dimensions as given
/// - `Percentage`: each side scaled and rounded to the nearest pixel
///
/// Every result is clamped to at least 1x1.
pub fn resolve_output_dimensions(
    source_width: u32,
    source_height: u32,
    resize: &ResizeMode,
) -> ResolvedOutputDimensions {
    let (width, height) = match *resize {
        ResizeMode::None => (source_width, source_height),
        ResizeMode::Absolute { width, height } => (width, height),
        ResizeMode::Percentage { fraction } => {
            (scale(source_width, fraction), scale(source_height, fraction))
        }
    };

    ResolvedOutputDimensions {
        width: width.max(1),
        height: height.max(1),
    }
}

fn scale(value: u32, fraction: f64) -> u32 {
    // `as` saturates, so absurd fractions cannot wrap
    (value as f64 * fraction).round() as u32
}


// ============================================================================
// Property-Based Tests
// ============================================================================
