//! CPU compositing of extracted panels onto the output canvas.

/// Two-pass panel compositor.
pub mod compositor;
/// Label rasterization.
pub mod label;
/// Cover placement and panel outlines.
pub mod placement;
/// Output raster surface.
pub mod surface;
