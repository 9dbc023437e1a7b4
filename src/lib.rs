//! panelpress flattens comic page layouts into a single PNG.
//!
//! A page is markup made of flat panel groups, each carrying a rectangle or polygon, an optional
//! linked image and an optional panel number. A conversion:
//!
//! - extracts the panels ([`extract_panels`])
//! - resolves every image through a request-scoped cache ([`ImageResolver`])
//! - composites a content pass and then a border pass onto a fixed canvas ([`Compositor`])
//! - encodes the surface to PNG and stores it ([`OutputStore`])
//!
//! [`Converter`] runs the whole sequence. Image failures never abort a conversion; they degrade
//! the affected panel to a placeholder and are reported as [`PanelDiagnostic`]s.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Image loading and caching.
pub mod assets;
/// PNG encoding and output storage.
pub mod encode;
/// Shared primitives and errors.
pub mod foundation;
/// Panel markup model and extraction.
pub mod markup;
/// End-to-end conversion.
pub mod pipeline;
/// Compositing.
pub mod render;

pub use crate::assets::decode::{PreparedImage, decode_image};
pub use crate::assets::fetch::{FetchResponse, HttpFetcher, ImageFetcher, InMemoryFetcher};
pub use crate::assets::resolve::{
    ImageError, ImageResolver, ResolvedImage, ResolverStats, resolution_key,
};
pub use crate::encode::png::{encode_png, write_png_file, write_png_file_new};
pub use crate::encode::store::{OutputRef, OutputStore};
pub use crate::foundation::core::{Affine, BezPath, Canvas, Point, Rect, Rgba8};
pub use crate::foundation::error::{PressError, PressResult};
pub use crate::markup::extract::extract_panels;
pub use crate::markup::model::{ImageRef, PanelDescriptor, PanelLabel, PanelShape};
pub use crate::pipeline::{
    ConversionRequest, ConversionResult, ConvertOpts, Converter, PanelDiagnostic, Rendered,
    RequestContext,
};
pub use crate::render::compositor::{
    BorderStage, Composite, Compositor, CompositorOpts, ContentStage, DrawStage, PanelOutcome,
    PanelStatus,
};
pub use crate::render::placement::{Placement, cover_placement};
pub use crate::render::surface::RasterSurface;
