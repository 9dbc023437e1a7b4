use crate::foundation::error::{PressError, PressResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Size, Vec2};

/// Side length of the normalized layout space. Panel coordinates run from `0` to this value.
pub const LAYOUT_SPACE: f64 = 100.0;

/// Largest accepted canvas side. A square surface at this size is 1 GiB of RGBA8.
pub const MAX_CANVAS_SIDE: u32 = 16_384;

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated square canvas.
    ///
    /// Sides above [`MAX_CANVAS_SIDE`] are rejected before anything is allocated.
    pub fn square(size: u32) -> PressResult<Self> {
        if size == 0 {
            return Err(PressError::input("canvas size must be > 0"));
        }
        if size > MAX_CANVAS_SIDE {
            return Err(PressError::input(format!(
                "canvas size {size} exceeds {MAX_CANVAS_SIDE}"
            )));
        }
        Ok(Self {
            width: size,
            height: size,
        })
    }

    /// Map one normalized horizontal coordinate (`0..=100`) into canvas pixels.
    pub fn x(self, v: f64) -> f64 {
        v * f64::from(self.width) / LAYOUT_SPACE
    }

    /// Map one normalized vertical coordinate (`0..=100`) into canvas pixels.
    pub fn y(self, v: f64) -> f64 {
        v * f64::from(self.height) / LAYOUT_SPACE
    }

    /// Map a normalized point into canvas pixels.
    pub fn point(self, p: Point) -> Point {
        Point::new(self.x(p.x), self.y(p.y))
    }

    /// Map a normalized `(x, y, w, h)` box into a canvas-space rectangle.
    pub fn rect(self, r: Rect) -> Rect {
        Rect::new(self.x(r.x0), self.y(r.y0), self.x(r.x1), self.y(r.y1))
    }

    /// Number of pixels on the canvas.
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Straight-alpha RGBA8 color used for fills and strokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque color from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Build from an `[r, g, b, a]` array.
    pub const fn from_array([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiply into `[r, g, b, a]` bytes.
    pub fn premultiplied(self) -> [u8; 4] {
        fn premul(c: u8, a: u8) -> u8 {
            ((u16::from(c) * u16::from(a) + 127) / 255) as u8
        }
        [
            premul(self.r, self.a),
            premul(self.g, self.a),
            premul(self.b, self.a),
            self.a,
        ]
    }

    /// Hex notation (`#rrggbb`) used when emitting SVG fragments.
    pub fn to_hex_rgb(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
