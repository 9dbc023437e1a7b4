use std::{sync::Arc, time::Duration};

use crate::{
    assets::{
        fetch::{DEFAULT_FETCH_TIMEOUT, HttpFetcher, ImageFetcher},
        resolve::{DEFAULT_MAX_REDIRECTS, ImageResolver, ResolverStats},
    },
    encode::store::{OutputRef, OutputStore},
    foundation::{
        core::{Canvas, Rgba8},
        error::{PressError, PressResult},
    },
    markup::extract::extract_panels,
    render::compositor::{Composite, Compositor, CompositorOpts, PanelOutcome, PanelStatus},
};

/// Base URL used for relative image references when the request context has none.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Conversion settings shared by every request a [`Converter`] handles.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvertOpts {
    /// Side of the square output canvas, in pixels.
    pub canvas_size: u32,
    /// Canvas background.
    pub background_rgba: [u8; 4],
    /// Base for relative image references when the request does not carry one.
    pub default_base_url: String,
    /// Per-GET timeout.
    pub fetch_timeout: Duration,
    /// Redirect hops followed per image.
    pub max_redirects: u8,
    /// Fetch distinct images concurrently before drawing.
    pub parallel_fetch: bool,
    /// Worker count for concurrent fetching (`None`: rayon default).
    pub fetch_threads: Option<usize>,
    /// Border-pass stroke width, in canvas pixels.
    pub border_width_px: f64,
    /// Interior outline width, in canvas pixels.
    pub outline_width_px: f64,
    /// Panel-number font size, in canvas pixels.
    pub label_size_px: f64,
}

impl Default for ConvertOpts {
    fn default() -> Self {
        Self {
            canvas_size: 2000,
            background_rgba: [255, 255, 255, 255],
            default_base_url: DEFAULT_BASE_URL.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            parallel_fetch: false,
            fetch_threads: None,
            border_width_px: 6.0,
            outline_width_px: 2.0,
            label_size_px: 48.0,
        }
    }
}

impl ConvertOpts {
    /// Defaults overridden by `PANELPRESS_*` environment variables.
    ///
    /// Values that fail to parse (or are not positive, for sizes and counts) are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Like [`ConvertOpts::from_env`], reading variables through `get`.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut opts = Self::default();
        if let Some(n) = get("PANELPRESS_CANVAS_SIZE")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|&n| n > 0)
        {
            opts.canvas_size = n;
        }
        if let Some(url) = get("PANELPRESS_BASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            opts.default_base_url = url;
        }
        if let Some(ms) = get("PANELPRESS_FETCH_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&n| n > 0)
        {
            opts.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = get("PANELPRESS_MAX_REDIRECTS").and_then(|v| v.trim().parse::<u8>().ok())
        {
            opts.max_redirects = n;
        }
        if let Some(on) = get("PANELPRESS_PARALLEL_FETCH").and_then(|v| parse_flag(&v)) {
            opts.parallel_fetch = on;
        }
        if let Some(n) = get("PANELPRESS_FETCH_THREADS")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            opts.fetch_threads = Some(n);
        }
        opts
    }

    /// Compositor settings derived from these options.
    pub fn compositor_opts(&self) -> PressResult<CompositorOpts> {
        for (name, v) in [
            ("border_width_px", self.border_width_px),
            ("outline_width_px", self.outline_width_px),
            ("label_size_px", self.label_size_px),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(PressError::input(format!("{name} must be finite and > 0")));
            }
        }
        Ok(CompositorOpts {
            canvas: Canvas::square(self.canvas_size)?,
            background: Rgba8::from_array(self.background_rgba),
            border_width_px: self.border_width_px,
            outline_width_px: self.outline_width_px,
            label_size_px: self.label_size_px,
            ..CompositorOpts::default()
        })
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Per-request facts used to turn relative references into URLs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Effective `scheme://host[:port]` of the incoming request, if known.
    pub base_url: Option<String>,
}

/// One conversion job.
#[derive(Clone, Debug, Default)]
pub struct ConversionRequest {
    /// Layout markup.
    pub markup: String,
    /// Display title, used for the output name.
    pub title: Option<String>,
    /// Known source URLs that image references are matched against by file name.
    pub known_urls: Vec<String>,
    /// Where the request came from.
    pub context: RequestContext,
}

impl ConversionRequest {
    /// Request for `markup` with no title, known URLs or context.
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            ..Self::default()
        }
    }
}

/// A panel that did not draw as declared.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PanelDiagnostic {
    /// 0-based panel index.
    pub index: usize,
    /// Outcome of the content pass.
    pub status: PanelStatus,
    /// Human-readable summary.
    pub message: String,
}

impl PanelDiagnostic {
    fn from_outcome(outcome: &PanelOutcome) -> Option<Self> {
        let message = match &outcome.status {
            PanelStatus::Drawn | PanelStatus::NoImage => return None,
            PanelStatus::Placeholder { error } => {
                format!("panel {}: {error}", outcome.index + 1)
            }
            PanelStatus::ExtractionGap { reason } => {
                format!("panel {}: {reason}", outcome.index + 1)
            }
        };
        Some(Self {
            index: outcome.index,
            status: outcome.status.clone(),
            message,
        })
    }
}

/// Result of a persisted conversion.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ConversionResult {
    /// Where the PNG was stored.
    pub output_ref: OutputRef,
    /// Number of panels extracted.
    pub panels: usize,
    /// Per-panel problems, in panel order. Empty when every panel drew as declared.
    pub diagnostics: Vec<PanelDiagnostic>,
    /// Image resolution counters.
    pub stats: ResolverStats,
}

/// A composite that has not been persisted.
#[derive(Clone, Debug)]
pub struct Rendered {
    /// Surface and per-panel outcomes.
    pub composite: Composite,
    /// Per-panel problems, in panel order.
    pub diagnostics: Vec<PanelDiagnostic>,
    /// Image resolution counters.
    pub stats: ResolverStats,
}

/// Markup-to-PNG converter.
///
/// Every call builds its own resolver, cache and surface, so concurrent conversions share
/// nothing beyond the transport and the output directory.
pub struct Converter {
    opts: ConvertOpts,
    fetcher: Arc<dyn ImageFetcher>,
}

impl Converter {
    /// Converter using `fetcher` for images.
    pub fn new(opts: ConvertOpts, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { opts, fetcher }
    }

    /// Converter fetching over HTTP with the configured timeout.
    pub fn with_http(opts: ConvertOpts) -> Self {
        let fetcher = Arc::new(HttpFetcher::new(opts.fetch_timeout));
        Self::new(opts, fetcher)
    }

    /// Active options.
    pub fn opts(&self) -> &ConvertOpts {
        &self.opts
    }

    /// Extract, resolve and composite without persisting.
    #[tracing::instrument(skip_all, fields(markup_len = req.markup.len()))]
    pub fn render(&self, req: &ConversionRequest) -> PressResult<Rendered> {
        let compositor = Compositor::new(self.opts.compositor_opts()?);
        let panels = extract_panels(&req.markup)?;

        let base = req
            .context
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(self.opts.default_base_url.as_str());
        let resolver = ImageResolver::new(Arc::clone(&self.fetcher), req.known_urls.clone(), base)
            .with_max_redirects(self.opts.max_redirects);

        if self.opts.parallel_fetch {
            resolver.prefetch(
                panels
                    .iter()
                    .filter_map(|p| p.image.as_ref().map(|i| i.href.as_str())),
                self.opts.fetch_threads,
            )?;
        }

        let composite = compositor.composite(&panels, &resolver)?;
        let diagnostics: Vec<PanelDiagnostic> = composite
            .outcomes
            .iter()
            .filter_map(PanelDiagnostic::from_outcome)
            .collect();
        let stats = resolver.stats();
        tracing::debug!(
            panels = panels.len(),
            diagnostics = diagnostics.len(),
            fetches = stats.fetches,
            hits = stats.hits,
            "composited"
        );

        Ok(Rendered {
            composite,
            diagnostics,
            stats,
        })
    }

    /// Render and persist into `store`; the returned reference is valid once this returns.
    #[tracing::instrument(skip_all, fields(title = req.title.as_deref().unwrap_or("")))]
    pub fn convert(
        &self,
        req: &ConversionRequest,
        store: &OutputStore,
    ) -> PressResult<ConversionResult> {
        let rendered = self.render(req)?;
        let output_ref = store.persist(&rendered.composite.surface, req.title.as_deref())?;
        Ok(ConversionResult {
            output_ref,
            panels: rendered.composite.outcomes.len(),
            diagnostics: rendered.diagnostics,
            stats: rendered.stats,
        })
    }
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
