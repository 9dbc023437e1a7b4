use crate::{
    foundation::core::{Affine, BezPath, Canvas, Rect},
    markup::model::PanelDescriptor,
};

/// Where and how large an image is drawn inside its target box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Drawn image rectangle in canvas space. Covers the target box and may overflow it on one
    /// axis.
    pub rect: Rect,
    /// Maps image pixel space (`0..width, 0..height`) onto `rect`.
    pub transform: Affine,
}

impl Placement {
    /// Drawn width in canvas pixels.
    pub fn draw_width(&self) -> f64 {
        self.rect.width()
    }

    /// Drawn height in canvas pixels.
    pub fn draw_height(&self) -> f64 {
        self.rect.height()
    }
}

/// Aspect-preserving "cover" placement of a `width x height` image into `target`.
///
/// Images wider than the box are height-constrained and centered horizontally; all others are
/// width-constrained and centered vertically. The overflow is left for the panel clip to crop.
/// Returns `None` for degenerate images or boxes.
pub fn cover_placement(width: u32, height: u32, target: Rect) -> Option<Placement> {
    let (bw, bh) = (target.width(), target.height());
    if width == 0 || height == 0 || !(bw > 0.0 && bh > 0.0) {
        return None;
    }

    let img_aspect = f64::from(width) / f64::from(height);
    let box_aspect = bw / bh;

    let (dw, dh) = if img_aspect > box_aspect {
        (bh * img_aspect, bh)
    } else {
        (bw, bw / img_aspect)
    };
    let x0 = target.x0 + (bw - dw) / 2.0;
    let y0 = target.y0 + (bh - dh) / 2.0;

    let sx = dw / f64::from(width);
    let sy = dh / f64::from(height);
    Some(Placement {
        rect: Rect::new(x0, y0, x0 + dw, y0 + dh),
        transform: Affine::translate((x0, y0)) * Affine::scale_non_uniform(sx, sy),
    })
}

/// Closed canvas-space outline of a panel, used both as its clip region and its border.
///
/// `None` for panels without a recognized shape; their images draw unclipped.
pub fn panel_path(panel: &PanelDescriptor, canvas: Canvas) -> Option<BezPath> {
    panel.shape.as_ref().map(|s| s.canvas_path(canvas))
}

/// Canvas-space box an image of `panel` is fitted into.
pub fn image_target(panel: &PanelDescriptor, canvas: Canvas) -> Option<Rect> {
    panel.image_box().map(|r| canvas.rect(r))
}

#[cfg(test)]
#[path = "../../tests/unit/render/placement.rs"]
mod tests;
