use std::sync::{Arc, OnceLock};

use anyhow::Context as _;

use crate::foundation::{
    core::{Point, Rgba8},
    error::{PressError, PressResult},
};

/// Look of a panel-number or placeholder label.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelStyle {
    /// Font size in canvas pixels.
    pub size_px: f64,
    /// Glyph fill.
    pub fill: Rgba8,
    /// Outline drawn behind the glyphs so labels stay legible on top of images.
    pub halo: Option<Rgba8>,
}

impl LabelStyle {
    /// Black bold digits with a white halo.
    pub fn panel_number(size_px: f64) -> Self {
        Self {
            size_px,
            fill: Rgba8::rgb(0, 0, 0),
            halo: Some(Rgba8::rgb(255, 255, 255)),
        }
    }

    fn pad(&self) -> f64 {
        (self.size_px * 0.25).ceil()
    }

    fn halo_width(&self) -> f64 {
        (self.size_px / 8.0).max(1.0)
    }
}

/// A label rasterized into its own premultiplied RGBA8 tile.
#[derive(Clone, Debug)]
pub struct RasterLabel {
    /// Tile width in pixels.
    pub width: u32,
    /// Tile height in pixels.
    pub height: u32,
    /// Canvas position of the tile's top-left corner.
    pub origin: Point,
    /// Tile pixels.
    pub rgba8_premul: Vec<u8>,
}

/// Tile size that fits `text` at `style`, with room for the halo.
pub fn label_tile_size(text: &str, style: &LabelStyle) -> (u32, u32) {
    let chars = text.chars().count().max(1) as f64;
    let w = (chars * style.size_px * 0.62 + 2.0 * style.pad()).ceil();
    let h = (style.size_px * 1.3 + 2.0 * style.pad()).ceil();
    let clamp = |v: f64| (v as u32).clamp(1, u32::from(u16::MAX));
    (clamp(w), clamp(h))
}

/// Standalone SVG document drawing `text` with its baseline start at the tile's padding corner.
pub fn label_svg(text: &str, style: &LabelStyle, width: u32, height: u32) -> String {
    let pad = style.pad();
    let baseline = pad + style.size_px;
    let halo = match style.halo {
        Some(c) => format!(
            r#" stroke="{}" stroke-width="{:.2}" stroke-linejoin="round" paint-order="stroke""#,
            c.to_hex_rgb(),
            style.halo_width()
        ),
        None => String::new(),
    };
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}">"#,
            r#"<text x="{x:.2}" y="{y:.2}" font-family="sans-serif" font-weight="bold" "#,
            r#"font-size="{size:.2}" fill="{fill}" fill-opacity="{opacity:.3}"{halo}>{text}</text>"#,
            r#"</svg>"#
        ),
        w = width,
        h = height,
        x = pad,
        y = baseline,
        size = style.size_px,
        fill = style.fill.to_hex_rgb(),
        opacity = f64::from(style.fill.a) / 255.0,
        halo = halo,
        text = escape_xml(text),
    )
}

/// Rasterize `text` so that its baseline starts at `anchor` (canvas space).
pub fn rasterize_label(text: &str, anchor: Point, style: &LabelStyle) -> PressResult<RasterLabel> {
    let (width, height) = label_tile_size(text, style);
    let svg = label_svg(text, style, width, height);

    let opts = usvg::Options {
        fontdb: Arc::clone(label_fontdb()),
        font_resolver: label_font_resolver(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_data(svg.as_bytes(), &opts).context("parse label svg")?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| PressError::Other(anyhow::anyhow!("failed to allocate label pixmap")))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::identity(),
        &mut pixmap.as_mut(),
    );

    let pad = style.pad();
    Ok(RasterLabel {
        width,
        height,
        origin: Point::new(anchor.x - pad, anchor.y - pad - style.size_px),
        rgba8_premul: pixmap.take(),
    })
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn label_fontdb() -> &'static Arc<usvg::fontdb::Database> {
    static FONTDB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    FONTDB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded label fonts");
        Arc::new(db)
    })
}

// Prefer the requested family, but fall back to any installed face rather than dropping the text.
fn label_font_resolver() -> usvg::FontResolver<'static> {
    let select = usvg::FontResolver::default_font_selector();
    usvg::FontResolver {
        select_font: Box::new(move |font, fontdb| {
            select(font, fontdb).or_else(|| fontdb.faces().next().map(|f| f.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/label.rs"]
mod tests;
