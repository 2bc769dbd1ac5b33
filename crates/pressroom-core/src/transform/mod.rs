//! Output sizing and rasterization.
//!
//! Sizing is a pure function of the source dimensions and the resolved
//! [`ResizeMode`](crate::settings::ResizeMode). Rasterization draws the
//! decoded source onto a surface of exactly that size.
//!
//! # Coordinate System
//!
//! - Dimensions are whole pixels, never below 1
//! - Percentages are fractions (0.5 = half size) and round to nearest
//! - Outputs above [`MAX_DIMENSION`] per side or [`MAX_PIXELS`] in total are
//!   rejected before any surface is allocated

mod dimensions;
mod raster;

pub use dimensions::{resolve_output_dimensions, ResolvedOutputDimensions, MAX_DIMENSION, MAX_PIXELS};
pub use raster::rasterize;
