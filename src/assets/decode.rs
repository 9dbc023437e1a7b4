use std::sync::Arc;

use anyhow::{Context, bail};
use base64::Engine as _;

/// Decoded raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Width over height.
    pub fn aspect(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Decode encoded image bytes and convert to premultiplied RGBA8.
///
/// Images must be non-empty and fit the rasterizer's `u16` pixel addressing.
pub fn decode_image(bytes: &[u8]) -> anyhow::Result<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        bail!("image has zero size ({width}x{height})");
    }
    if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        bail!("image too large: {width}x{height}");
    }

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Return `true` for inline `data:` references.
pub fn is_data_url(reference: &str) -> bool {
    reference
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Decode the payload of a `data:[<mime>][;base64],<payload>` URL.
pub fn decode_data_url(data_url: &str) -> anyhow::Result<Vec<u8>> {
    if !is_data_url(data_url) {
        bail!("not a data: URL");
    }
    let (header, payload) = data_url[5..]
        .split_once(',')
        .context("data URL has no payload separator")?;

    let is_base64 = header
        .split(';')
        .any(|seg| seg.trim().eq_ignore_ascii_case("base64"));

    if is_base64 {
        // Inline payloads are frequently wrapped or percent-escaped by markup producers.
        let cleaned: String = percent_encoding::percent_decode_str(payload)
            .decode_utf8()
            .context("data URL payload is not valid UTF-8")?
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned.as_bytes())
            .context("invalid base64 data URL")
    } else {
        Ok(percent_encoding::percent_decode_str(payload).collect())
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
