use std::{collections::HashMap, sync::Arc};

use crate::{
    assets::{
        decode::PreparedImage,
        resolve::{ImageError, ImageResolver},
    },
    foundation::{
        core::{Affine, BezPath, Canvas, Point, Rect, Rgba8},
        error::{PressError, PressResult},
    },
    markup::model::PanelDescriptor,
    render::{
        label::{LabelStyle, RasterLabel, rasterize_label},
        placement::{cover_placement, image_target, panel_path},
        surface::RasterSurface,
    },
};

/// Drawing parameters for one composite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorOpts {
    /// Output canvas.
    pub canvas: Canvas,
    /// Background fill.
    pub background: Rgba8,
    /// Width of the border-pass stroke, in canvas pixels.
    pub border_width_px: f64,
    /// Width of the thin interior outline stroked inside each clip, in canvas pixels.
    pub outline_width_px: f64,
    /// Panel-number font size, in canvas pixels.
    pub label_size_px: f64,
    /// Border stroke color.
    pub border_color: Rgba8,
    /// Neutral fill for panels whose image could not be resolved.
    pub placeholder_fill: Rgba8,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 2000,
                height: 2000,
            },
            background: Rgba8::rgb(255, 255, 255),
            border_width_px: 6.0,
            outline_width_px: 2.0,
            label_size_px: 48.0,
            border_color: Rgba8::rgb(0, 0, 0),
            placeholder_fill: Rgba8::rgb(0xe0, 0xe0, 0xe0),
        }
    }
}

/// What the content pass did for one panel.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelStatus {
    /// The panel's image was placed and clipped.
    Drawn,
    /// The panel has no image reference; only its border and label are drawn.
    NoImage,
    /// The image failed to resolve; a placeholder was drawn instead.
    Placeholder {
        /// Resolution failure.
        error: ImageError,
    },
    /// A field needed to draw the image was missing from the markup.
    ExtractionGap {
        /// What was missing.
        reason: String,
    },
}

/// Content-pass outcome for one panel.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PanelOutcome {
    /// 0-based panel index.
    pub index: usize,
    /// What happened.
    pub status: PanelStatus,
}

/// Finished raster plus per-panel outcomes, in panel order.
#[derive(Clone, Debug)]
pub struct Composite {
    /// The flattened page.
    pub surface: RasterSurface,
    /// One entry per panel.
    pub outcomes: Vec<PanelOutcome>,
}

/// One drawing pass over the full panel sequence.
pub trait DrawStage {
    /// Stage name used in logs.
    fn name(&self) -> &'static str;

    /// Draw every panel of this stage into `ctx`.
    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        panels: &[PanelDescriptor],
    ) -> PressResult<()>;
}

/// Fills each panel interior with its image (or a placeholder), in document order.
pub struct ContentStage<'a> {
    opts: CompositorOpts,
    resolver: &'a ImageResolver,
    paints: HashMap<String, vello_cpu::Image>,
    outcomes: Vec<PanelOutcome>,
}

impl<'a> ContentStage<'a> {
    /// Content stage resolving images through `resolver`.
    pub fn new(opts: CompositorOpts, resolver: &'a ImageResolver) -> Self {
        Self {
            opts,
            resolver,
            paints: HashMap::new(),
            outcomes: Vec::new(),
        }
    }

    /// Outcomes recorded so far, in panel order.
    pub fn into_outcomes(self) -> Vec<PanelOutcome> {
        self.outcomes
    }

    fn draw_panel(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        panel: &PanelDescriptor,
    ) -> PressResult<PanelStatus> {
        let Some(image) = panel.image.as_ref() else {
            return Ok(PanelStatus::NoImage);
        };
        let canvas = self.opts.canvas;
        let Some(target) = image_target(panel, canvas) else {
            return Ok(PanelStatus::ExtractionGap {
                reason: "image has no placement box and the panel has no shape".to_string(),
            });
        };
        let clip = panel_path(panel, canvas);

        let resolved = match self.resolver.resolve(&image.href) {
            Ok(r) => r,
            Err(error) => {
                tracing::warn!(panel = panel.number(), %error, "drawing placeholder");
                self.draw_placeholder(ctx, panel, clip.as_ref(), target)?;
                return Ok(PanelStatus::Placeholder { error });
            }
        };

        let Some(placement) =
            cover_placement(resolved.image.width, resolved.image.height, target)
        else {
            return Ok(PanelStatus::ExtractionGap {
                reason: "image placement box is empty".to_string(),
            });
        };

        let paint = match self.paints.get(&resolved.key) {
            Some(p) => p.clone(),
            None => {
                let p = image_paint(&resolved.image)?;
                self.paints.insert(resolved.key.clone(), p.clone());
                p
            }
        };

        if let Some(clip) = clip.as_ref() {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.push_clip_layer(&bezpath_to_cpu(clip));
        }

        ctx.set_transform(affine_to_cpu(placement.transform));
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(resolved.image.width),
            f64::from(resolved.image.height),
        ));

        if let Some(clip) = clip.as_ref() {
            stroke_outline(ctx, clip, self.opts.outline_width_px, self.opts.border_color);
            ctx.pop_layer();
        }
        Ok(PanelStatus::Drawn)
    }

    fn draw_placeholder(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        panel: &PanelDescriptor,
        clip: Option<&BezPath>,
        target: Rect,
    ) -> PressResult<()> {
        let region = clip.cloned().unwrap_or_else(|| rect_path(target));

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        let region_cpu = bezpath_to_cpu(&region);
        ctx.push_clip_layer(&region_cpu);

        ctx.set_paint(color_to_cpu(self.opts.placeholder_fill));
        ctx.fill_path(&region_cpu);
        stroke_outline(
            ctx,
            &region,
            self.opts.outline_width_px,
            Rgba8::rgb(0x80, 0x80, 0x80),
        );

        let text = format!("no image {}", panel.number());
        let style = LabelStyle {
            size_px: self.opts.label_size_px * 0.75,
            fill: Rgba8::rgb(0x55, 0x55, 0x55),
            halo: None,
        };
        let bounds = kurbo::Shape::bounding_box(&region);
        match rasterize_label(&text, Point::ORIGIN, &style) {
            Ok(mut label) => {
                label.origin = Point::new(
                    bounds.center().x - f64::from(label.width) / 2.0,
                    bounds.center().y - f64::from(label.height) / 2.0,
                );
                draw_label(ctx, &label)?;
            }
            Err(err) => tracing::warn!(panel = panel.number(), %err, "placeholder label skipped"),
        }

        ctx.pop_layer();
        Ok(())
    }
}

impl DrawStage for ContentStage<'_> {
    fn name(&self) -> &'static str {
        "content"
    }

    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        panels: &[PanelDescriptor],
    ) -> PressResult<()> {
        for panel in panels {
            let status = self.draw_panel(ctx, panel)?;
            if let PanelStatus::ExtractionGap { reason } = &status {
                tracing::warn!(panel = panel.number(), reason = %reason, "image skipped");
            }
            self.outcomes.push(PanelOutcome {
                index: panel.index,
                status,
            });
        }
        Ok(())
    }
}

/// Strokes every panel border on top of all content, then overlays the panel numbers.
pub struct BorderStage {
    opts: CompositorOpts,
}

impl BorderStage {
    /// Border stage with the given stroke and label settings.
    pub fn new(opts: CompositorOpts) -> Self {
        Self { opts }
    }
}

impl DrawStage for BorderStage {
    fn name(&self) -> &'static str {
        "border"
    }

    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        panels: &[PanelDescriptor],
    ) -> PressResult<()> {
        let canvas = self.opts.canvas;
        for panel in panels {
            if let Some(path) = panel_path(panel, canvas) {
                stroke_outline(ctx, &path, self.opts.border_width_px, self.opts.border_color);
            }
        }

        let style = LabelStyle::panel_number(self.opts.label_size_px);
        for panel in panels {
            let Some(label) = panel.label.as_ref() else {
                continue;
            };
            match rasterize_label(&label.text, canvas.point(label.anchor), &style) {
                Ok(tile) => draw_label(ctx, &tile)?,
                Err(err) => tracing::warn!(panel = panel.number(), %err, "label skipped"),
            }
        }
        Ok(())
    }
}

/// Two-pass panel compositor.
#[derive(Clone, Debug, Default)]
pub struct Compositor {
    opts: CompositorOpts,
}

impl Compositor {
    /// Create a compositor.
    pub fn new(opts: CompositorOpts) -> Self {
        Self { opts }
    }

    /// Drawing parameters in use.
    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    /// Draw `panels` onto a fresh canvas.
    ///
    /// The content pass runs to completion before the border pass starts, so every border lies
    /// above every panel's fill regardless of declaration order. Image failures degrade the
    /// affected panel only.
    #[tracing::instrument(skip_all, fields(panels = panels.len()))]
    pub fn composite(
        &self,
        panels: &[PanelDescriptor],
        resolver: &ImageResolver,
    ) -> PressResult<Composite> {
        let canvas = self.opts.canvas;
        let (w, h) = canvas_u16(canvas)?;
        let mut ctx = vello_cpu::RenderContext::new(w, h);

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(color_to_cpu(self.opts.background));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(canvas.width),
            f64::from(canvas.height),
        ));

        let mut content = ContentStage::new(self.opts, resolver);
        let mut border = BorderStage::new(self.opts);
        for stage in [&mut content as &mut dyn DrawStage, &mut border] {
            tracing::debug!(stage = stage.name(), "drawing stage");
            stage.draw(&mut ctx, panels)?;
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        let surface = RasterSurface::from_premul_bytes(
            canvas.width,
            canvas.height,
            pixmap.data_as_u8_slice().to_vec(),
        )?;

        Ok(Composite {
            surface,
            outcomes: content.into_outcomes(),
        })
    }
}

fn canvas_u16(canvas: Canvas) -> PressResult<(u16, u16)> {
    let w: u16 = canvas
        .width
        .try_into()
        .map_err(|_| PressError::input("canvas width exceeds u16"))?;
    let h: u16 = canvas
        .height
        .try_into()
        .map_err(|_| PressError::input("canvas height exceeds u16"))?;
    if w == 0 || h == 0 {
        return Err(PressError::input("canvas must be non-empty"));
    }
    Ok((w, h))
}

fn stroke_outline(ctx: &mut vello_cpu::RenderContext, path: &BezPath, width: f64, color: Rgba8) {
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
    ctx.set_paint(color_to_cpu(color));
    ctx.stroke_path(&bezpath_to_cpu(path));
}

fn draw_label(ctx: &mut vello_cpu::RenderContext, label: &RasterLabel) -> PressResult<()> {
    let paint = paint_from_premul(&label.rgba8_premul, label.width, label.height)?;
    let origin = Point::new(label.origin.x.round(), label.origin.y.round());
    ctx.set_transform(affine_to_cpu(Affine::translate(origin.to_vec2())));
    ctx.set_paint(paint);
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(label.width),
        f64::from(label.height),
    ));
    Ok(())
}

fn rect_path(r: Rect) -> BezPath {
    let mut p = BezPath::new();
    p.move_to((r.x0, r.y0));
    p.line_to((r.x1, r.y0));
    p.line_to((r.x1, r.y1));
    p.line_to((r.x0, r.y1));
    p.close_path();
    p
}

fn image_paint(image: &PreparedImage) -> PressResult<vello_cpu::Image> {
    paint_from_premul(&image.rgba8_premul, image.width, image.height)
}

fn paint_from_premul(bytes: &[u8], width: u32, height: u32) -> PressResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul_bytes(bytes, width, height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> PressResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| PressError::Other(anyhow::anyhow!("pixmap width exceeds u16")))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| PressError::Other(anyhow::anyhow!("pixmap height exceeds u16")))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(PressError::Other(anyhow::anyhow!("pixmap byte len mismatch")));
    }
    let pixels: Vec<vello_cpu::peniko::color::PremulRgba8> = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect();
    let opaque = bytes.chunks_exact(4).all(|px| px[3] == 255);
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, !opaque,
    ))
}

fn color_to_cpu(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
