use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use anyhow::Context as _;

/// Default per-request timeout for image fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a fetched image body.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Result of a single GET, without any redirect handling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Location` header, if present.
    pub location: Option<String>,
    /// Response body. Only populated for 2xx responses.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// 200 response carrying `body`.
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            location: None,
            body,
        }
    }

    /// Bodyless response with `status`.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            location: None,
            body: Vec::new(),
        }
    }

    /// Redirect response pointing at `location`.
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            location: Some(location.into()),
            body: Vec::new(),
        }
    }

    /// `true` for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `true` for the redirect statuses that carry a `Location` to follow.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

/// Transport used by the resolver to issue exactly one GET per call.
///
/// Implementations must not follow redirects themselves: the resolver owns redirect policy so
/// the hop limit and the at-most-once-per-key guarantee hold regardless of transport.
/// Transport-level failures (DNS, connect, timeout) are returned as `Err`.
pub trait ImageFetcher: Send + Sync {
    /// Issue one GET for `url`.
    fn get(&self, url: &str) -> anyhow::Result<FetchResponse>;
}

/// Blocking HTTP transport backed by `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Build a fetcher whose requests are aborted after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .max_redirects(0)
            .max_redirects_will_error(false)
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl ImageFetcher for HttpFetcher {
    fn get(&self, url: &str) -> anyhow::Result<FetchResponse> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("GET {url}"))?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("location")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let body = if (200..300).contains(&status) {
            response
                .body_mut()
                .with_config()
                .limit(MAX_BODY_BYTES)
                .read_to_vec()
                .with_context(|| format!("read body of {url}"))?
        } else {
            Vec::new()
        };

        Ok(FetchResponse {
            status,
            location,
            body,
        })
    }
}

enum Route {
    Respond(FetchResponse),
    Fail(String),
}

/// Scripted in-memory transport for tests and offline conversions.
///
/// Unknown URLs answer 404. Every call is counted per URL.
#[derive(Default)]
pub struct InMemoryFetcher {
    routes: HashMap<String, Route>,
    latency: Option<Duration>,
    requests: Mutex<HashMap<String, usize>>,
}

impl InMemoryFetcher {
    /// Create an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with a 200 and `body`.
    pub fn with_body(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.routes
            .insert(url.into(), Route::Respond(FetchResponse::ok(body)));
        self
    }

    /// Answer `url` with a bodyless `status`.
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.routes
            .insert(url.into(), Route::Respond(FetchResponse::status(status)));
        self
    }

    /// Answer `url` with a redirect to `location`.
    pub fn with_redirect(
        mut self,
        url: impl Into<String>,
        status: u16,
        location: impl Into<String>,
    ) -> Self {
        self.routes.insert(
            url.into(),
            Route::Respond(FetchResponse::redirect(status, location)),
        );
        self
    }

    /// Fail `url` at the transport level (as a timeout or refused connection would).
    pub fn with_failure(mut self, url: impl Into<String>, msg: impl Into<String>) -> Self {
        self.routes.insert(url.into(), Route::Fail(msg.into()));
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made for `url`.
    pub fn requests(&self, url: &str) -> usize {
        self.requests
            .lock()
            .map(|m| m.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of calls made for all URLs.
    pub fn total_requests(&self) -> usize {
        self.requests
            .lock()
            .map(|m| m.values().sum())
            .unwrap_or(0)
    }
}

impl ImageFetcher for InMemoryFetcher {
    fn get(&self, url: &str) -> anyhow::Result<FetchResponse> {
        if let Ok(mut m) = self.requests.lock() {
            *m.entry(url.to_string()).or_insert(0) += 1;
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        match self.routes.get(url) {
            Some(Route::Respond(resp)) => Ok(resp.clone()),
            Some(Route::Fail(msg)) => Err(anyhow::anyhow!("{msg}")),
            None => Ok(FetchResponse::status(404)),
        }
    }
}
