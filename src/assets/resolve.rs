use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use rayon::prelude::*;

use crate::{
    assets::decode::{PreparedImage, decode_data_url, decode_image, is_data_url},
    assets::fetch::ImageFetcher,
    foundation::error::{PressError, PressResult},
};

/// Default hop limit for redirect chains.
pub const DEFAULT_MAX_REDIRECTS: u8 = 5;

/// Per-image failure. Cloneable so a memoized failure can be handed to every panel sharing a key.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageError {
    /// The image could not be reached (transport failure, non-2xx status, redirect problems).
    #[error("fetch failed for {url}: {reason}")]
    Fetch {
        /// Resolution key.
        url: String,
        /// Failure reason.
        reason: String,
    },
    /// The bytes were reached but are not a usable image.
    #[error("decode failed for {url}: {reason}")]
    Decode {
        /// Resolution key.
        url: String,
        /// Failure reason.
        reason: String,
    },
}

impl ImageError {
    fn fetch(key: &str, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: display_key(key),
            reason: reason.into(),
        }
    }

    fn decode(key: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            url: display_key(key),
            reason: reason.into(),
        }
    }
}

impl From<ImageError> for PressError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Fetch { url, reason } => PressError::Fetch { url, reason },
            ImageError::Decode { url, reason } => PressError::Decode { url, reason },
        }
    }
}

/// Image decoded for one resolution key. Shared read-only by every panel resolving to `key`.
#[derive(Clone, Debug)]
pub struct ResolvedImage {
    /// Resolution key (fully-qualified URL, or the data URL itself for inline images).
    pub key: String,
    /// Decoded pixels.
    pub image: PreparedImage,
}

/// Counters for one resolver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResolverStats {
    /// `resolve` calls.
    pub lookups: u64,
    /// Lookups answered from the cache map without I/O.
    pub hits: u64,
    /// Keys loaded (fetched or decoded inline).
    pub fetches: u64,
    /// GET requests issued, redirect hops included.
    pub requests: u64,
    /// Keys whose load failed.
    pub failures: u64,
}

/// Compute the resolution key for an image reference.
///
/// Order of precedence:
///
/// 1. inline `data:` references are their own key;
/// 2. the first entry of `known_urls` containing the reference's bare file name;
/// 3. references that already parse as absolute URLs, unchanged;
/// 4. `base_url` joined with the reference.
pub fn resolution_key(reference: &str, known_urls: &[String], base_url: &str) -> String {
    let reference = reference.trim();
    if is_data_url(reference) {
        return reference.to_string();
    }

    let bare = bare_name(reference);
    if !bare.is_empty()
        && let Some(known) = known_urls.iter().find(|u| {
            percent_encoding::percent_decode_str(u)
                .decode_utf8_lossy()
                .contains(bare.as_str())
        })
    {
        return known.clone();
    }

    if url::Url::parse(reference).is_ok() {
        return reference.to_string();
    }

    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        reference.trim_start_matches('/')
    )
}

/// Final path segment of a percent-decoded reference, without query or fragment.
fn bare_name(reference: &str) -> String {
    let decoded = percent_encoding::percent_decode_str(reference).decode_utf8_lossy();
    let path = decoded
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Shorten inline data URLs so they stay readable in diagnostics.
fn display_key(key: &str) -> String {
    const MAX: usize = 48;
    if is_data_url(key) && key.len() > MAX {
        let cut = key
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= MAX)
            .last()
            .unwrap_or(0);
        format!("{}...", &key[..cut])
    } else {
        key.to_string()
    }
}

fn join_location(current: &str, location: &str) -> String {
    url::Url::parse(current)
        .and_then(|base| base.join(location))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}

type Shared = Result<Arc<ResolvedImage>, ImageError>;

struct InFlight {
    result: Mutex<Option<Shared>>,
    cv: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    fn set(&self, result: Shared) {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(result);
        self.cv.notify_all();
    }

    fn wait(&self) -> Shared {
        let mut guard = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            guard = self.cv.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Default)]
struct CacheState {
    images: HashMap<String, Arc<ResolvedImage>>,
    failures: HashMap<String, ImageError>,
    in_flight: HashMap<String, Arc<InFlight>>,
    stats: ResolverStats,
}

/// Request-scoped image resolver and cache.
///
/// Keys are loaded at most once per resolver: successes land in the cache map, failures in a
/// failure memo, and concurrent callers of a key that is still loading wait for the first
/// caller's result instead of issuing a second request. Unrelated keys never wait on each other.
pub struct ImageResolver {
    fetcher: Arc<dyn ImageFetcher>,
    known_urls: Vec<String>,
    base_url: String,
    max_redirects: u8,
    state: Mutex<CacheState>,
}

impl ImageResolver {
    /// Create a resolver for one conversion request.
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        known_urls: Vec<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            known_urls,
            base_url: base_url.into(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Override the redirect hop limit.
    pub fn with_max_redirects(mut self, max_redirects: u8) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Resolution key for `reference` under this resolver's known URLs and base.
    pub fn key_for(&self, reference: &str) -> String {
        resolution_key(reference, &self.known_urls, &self.base_url)
    }

    /// Resolve `reference` to decoded pixels, loading it on first use.
    #[tracing::instrument(level = "debug", skip_all, fields(key))]
    pub fn resolve(&self, reference: &str) -> Result<Arc<ResolvedImage>, ImageError> {
        let key = self.key_for(reference);
        tracing::Span::current().record("key", display_key(&key).as_str());
        self.resolve_key(&key)
    }

    /// Return the cached image for `key` without any I/O.
    pub fn cached(&self, key: &str) -> Option<Arc<ResolvedImage>> {
        self.lock().images.get(key).cloned()
    }

    /// Snapshot of the resolver counters.
    pub fn stats(&self) -> ResolverStats {
        self.lock().stats
    }

    /// Load every distinct key behind `references` concurrently on a rayon pool.
    ///
    /// Failures are memoized like any other load and surface when the reference is resolved.
    pub fn prefetch<'r>(
        &self,
        references: impl IntoIterator<Item = &'r str>,
        threads: Option<usize>,
    ) -> PressResult<()> {
        let mut seen = HashSet::new();
        let keys: Vec<String> = references
            .into_iter()
            .map(|r| self.key_for(r))
            .filter(|k| seen.insert(k.clone()))
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        let pool = build_fetch_pool(threads)?;
        pool.install(|| {
            keys.par_iter().for_each(|k| {
                let _ = self.resolve_key(k);
            });
        });
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve_key(&self, key: &str) -> Result<Arc<ResolvedImage>, ImageError> {
        let flight = {
            let mut state = self.lock();
            state.stats.lookups += 1;
            if let Some(img) = state.images.get(key).cloned() {
                state.stats.hits += 1;
                tracing::debug!("cache hit");
                return Ok(img);
            }
            if let Some(err) = state.failures.get(key).cloned() {
                return Err(err);
            }
            if let Some(flight) = state.in_flight.get(key).cloned() {
                drop(state);
                return flight.wait();
            }
            let flight = Arc::new(InFlight::new());
            state.in_flight.insert(key.to_string(), Arc::clone(&flight));
            state.stats.fetches += 1;
            flight
        };

        let result = self.load(key).map(|image| {
            Arc::new(ResolvedImage {
                key: key.to_string(),
                image,
            })
        });

        {
            let mut state = self.lock();
            match &result {
                Ok(img) => {
                    state.images.insert(key.to_string(), Arc::clone(img));
                }
                Err(err) => {
                    state.stats.failures += 1;
                    state.failures.insert(key.to_string(), err.clone());
                }
            }
            state.in_flight.remove(key);
        }
        flight.set(result.clone());
        result
    }

    fn load(&self, key: &str) -> Result<PreparedImage, ImageError> {
        let bytes = if is_data_url(key) {
            decode_data_url(key).map_err(|e| ImageError::decode(key, format!("{e:#}")))?
        } else {
            self.fetch_following_redirects(key)?
        };
        decode_image(&bytes).map_err(|e| ImageError::decode(key, format!("{e:#}")))
    }

    fn fetch_following_redirects(&self, key: &str) -> Result<Vec<u8>, ImageError> {
        let mut url = key.to_string();
        let mut hops = 0u8;
        loop {
            self.lock().stats.requests += 1;
            let resp = self
                .fetcher
                .get(&url)
                .map_err(|e| ImageError::fetch(key, format!("{e:#}")))?;

            if resp.is_success() {
                tracing::debug!(url = %url, bytes = resp.body.len(), "fetched image");
                return Ok(resp.body);
            }
            if !resp.is_redirect() {
                return Err(ImageError::fetch(key, format!("HTTP {}", resp.status)));
            }
            let Some(location) = resp.location.as_deref() else {
                return Err(ImageError::fetch(
                    key,
                    format!("HTTP {} without Location header", resp.status),
                ));
            };
            if hops >= self.max_redirects {
                return Err(ImageError::fetch(
                    key,
                    format!("too many redirects (limit {})", self.max_redirects),
                ));
            }
            hops += 1;
            url = join_location(&url, location);
            tracing::debug!(hop = hops, to = %url, "following redirect");
        }
    }
}

fn build_fetch_pool(threads: Option<usize>) -> PressResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(PressError::input("fetch 'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PressError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/resolve.rs"]
mod tests;
