use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::{
    ExtendedColorType, ImageEncoder,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};

use crate::{
    foundation::error::{PressError, PressResult},
    render::surface::RasterSurface,
};

/// Compression applied to every output.
pub const COMPRESSION: CompressionType = CompressionType::Default;
/// Row filter applied to every output.
pub const FILTER: FilterType = FilterType::Adaptive;

/// Encode `surface` as straight-alpha RGBA8 PNG into `out`.
///
/// Rows are streamed into the writer as they are compressed. The writer is flushed before
/// returning.
pub fn encode_png<W: Write>(surface: &RasterSurface, mut out: W) -> PressResult<()> {
    let straight = surface.to_straight_rgba8();
    PngEncoder::new_with_quality(&mut out, COMPRESSION, FILTER)
        .write_image(
            &straight,
            surface.width,
            surface.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| PressError::encode(format!("png encode failed: {e}")))?;
    out.flush()
        .map_err(|e| PressError::encode(format!("png flush failed: {e}")))
}

/// Encode `surface` to `path`.
///
/// Bytes go to a sibling `.part` file that is synced and then renamed over `path`, so readers
/// never observe a partially written image. The part file is removed on failure.
pub fn write_png_file(surface: &RasterSurface, path: &Path) -> PressResult<()> {
    let part = part_path(path);
    let result = write_part(surface, &part).and_then(|()| {
        std::fs::rename(&part, path).map_err(|e| {
            PressError::encode(format!(
                "rename '{}' -> '{}': {e}",
                part.display(),
                path.display()
            ))
        })
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&part);
    }
    result
}

/// Encode `surface` to `path` unless `path` already exists.
///
/// The finished `.part` file is hard-linked into place, so an existing file is never replaced.
/// Returns `Ok(false)` and leaves `path` untouched when the name is taken.
pub fn write_png_file_new(surface: &RasterSurface, path: &Path) -> PressResult<bool> {
    let part = part_path(path);
    let result = write_part(surface, &part).and_then(|()| match std::fs::hard_link(&part, path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(PressError::encode(format!(
            "link '{}' -> '{}': {e}",
            part.display(),
            path.display()
        ))),
    });
    let _ = std::fs::remove_file(&part);
    result
}

fn write_part(surface: &RasterSurface, part: &Path) -> PressResult<()> {
    let file = File::create(part)
        .map_err(|e| PressError::encode(format!("create '{}': {e}", part.display())))?;
    let mut writer = BufWriter::new(file);
    encode_png(surface, &mut writer)?;
    let file = writer
        .into_inner()
        .map_err(|e| PressError::encode(format!("flush '{}': {}", part.display(), e.error())))?;
    file.sync_all()
        .map_err(|e| PressError::encode(format!("sync '{}': {e}", part.display())))
}

fn part_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".part");
    PathBuf::from(s)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/png.rs"]
mod tests;
