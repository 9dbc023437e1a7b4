use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Context as _;

use crate::{
    encode::png::write_png_file_new,
    foundation::error::{PressError, PressResult},
    render::surface::RasterSurface,
};

/// Stem used when a title is missing or has no usable characters.
pub const DEFAULT_STEM: &str = "comic";

const MAX_STEM_LEN: usize = 40;

/// Name attempts before `persist` gives up on a crowded directory.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Shared by every store in the process, so two stores on one directory never pick the same name.
static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Handle to a persisted output.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct OutputRef {
    /// File name inside the store. This is the retrievable reference.
    pub name: String,
    /// Full path on disk.
    pub path: PathBuf,
}

/// Directory-backed storage for finished PNGs.
///
/// Names look like `<stem>-<unix-millis>-<pid>-<counter>.png`. A persisted file is never
/// replaced by a later one. Retention and age-based deletion belong to whoever owns the
/// directory.
#[derive(Debug)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> PressResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create output dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode `surface` into a freshly named file.
    ///
    /// Returns only after the file has been flushed, synced and linked into place. A name that
    /// is already taken (for example by another process sharing the directory) is skipped.
    pub fn persist(&self, surface: &RasterSurface, title: Option<&str>) -> PressResult<OutputRef> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = next_name(title);
            let path = self.dir.join(&name);
            if write_png_file_new(surface, &path)? {
                tracing::info!(name = %name, "output persisted");
                return Ok(OutputRef { name, path });
            }
            tracing::debug!(name = %name, "output name taken");
        }
        Err(PressError::encode(format!(
            "no free output name in '{}' after {MAX_NAME_ATTEMPTS} attempts",
            self.dir.display()
        )))
    }

    /// Path of a stored output, after validating `name`.
    pub fn path_of(&self, name: &str) -> PressResult<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Open a stored output for reading.
    pub fn open(&self, name: &str) -> PressResult<File> {
        let path = self.path_of(name)?;
        File::open(&path)
            .with_context(|| format!("open output '{}'", path.display()))
            .map_err(PressError::from)
    }
}

fn next_name(title: Option<&str>) -> String {
    let stem = title.map(sanitize_stem).unwrap_or_default();
    let stem = if stem.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        stem
    };
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let n = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{stem}-{millis}-{}-{n}.png", std::process::id())
}

/// Lowercase ASCII alphanumerics, with every other run collapsed into one `-`.
pub fn sanitize_stem(title: &str) -> String {
    let mut out = String::with_capacity(title.len().min(MAX_STEM_LEN));
    for c in title.chars() {
        if out.len() >= MAX_STEM_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Reject names that could escape the store or are not store outputs.
pub fn validate_name(name: &str) -> PressResult<()> {
    if name.is_empty()
        || name.contains(['/', '\\', '\0'])
        || name.contains("..")
        || !name.ends_with(".png")
        || name.len() == ".png".len()
    {
        return Err(PressError::input(format!("invalid output name '{name}'")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/store.rs"]
mod tests;
