//! Results-page fetching, direct or through a proxy.
//!
//! Provides configured [`reqwest::Client`]s with browser-like headers,
//! cookie support and rotating User-Agent strings, plus the
//! [`PageFetcher`] seam the resolver depends on.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::StatusCode;

use crate::cache::PageCache;
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::host::origin;
use crate::types::{ProxyEndpoint, Route};

/// Realistic browser User-Agent strings, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Markers engines put in their CAPTCHA interstitials.
const CAPTCHA_MARKERS: &[&str] = &["name=\"captcha\"", "id=\"captcha\""];

/// Something that can turn a query URL into a raw results-page body.
///
/// Implementations must be `Send + Sync` so one fetcher can serve every
/// concurrent keyword resolution.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` over `route`.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Fetch`] for transport errors, timeouts and any
    ///   non-200 response.
    /// - [`SearchError::CaptchaDetected`] when the body is a CAPTCHA page.
    async fn fetch(&self, url: &str, route: &Route) -> Result<String, SearchError>;
}

/// Build a [`reqwest::Client`] configured for results-page scraping.
///
/// The client has:
/// - Cookie store enabled (for consent pages, etc.)
/// - Overall and connect timeouts from config
/// - Redirects bounded by `max_redirects`
/// - Brotli and gzip decompression
/// - When `proxy` is given, all traffic routed through it, with certificate
///   verification governed by `accept_invalid_proxy_certs`
///
/// # Errors
///
/// Returns [`SearchError::Fetch`] if the proxy endpoint is unusable or the
/// client cannot be constructed.
pub fn build_client(
    config: &SearchConfig,
    proxy: Option<&ProxyEndpoint>,
) -> Result<reqwest::Client, SearchError> {
    let mut builder = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects));

    if let Some(proxy) = proxy {
        // Never format the reqwest error here: it may echo credentials.
        let proxy_cfg = reqwest::Proxy::all(proxy.as_str())
            .map_err(|_| SearchError::Fetch(format!("invalid proxy endpoint {proxy}")))?;
        builder = builder.proxy(proxy_cfg);
        if config.accept_invalid_proxy_certs {
            tracing::warn!(%proxy, "TLS certificate verification disabled for proxied fetch");
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|e| SearchError::Fetch(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // SAFETY: USER_AGENTS is a non-empty const array, choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}

/// Random pause to wait between two page requests of one keyword.
pub fn request_delay(config: &SearchConfig) -> Duration {
    let (min, max) = config.request_delay_ms;
    if max <= min {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// Whether `body` looks like a CAPTCHA interstitial rather than results.
pub fn is_captcha_page(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    CAPTCHA_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// The production [`PageFetcher`], backed by `reqwest`.
///
/// Direct requests share one client; proxied requests get a client bound
/// to the chosen endpoint. Successful, non-CAPTCHA bodies are cached by URL.
pub struct HttpFetcher {
    config: SearchConfig,
    direct: reqwest::Client,
    cache: PageCache,
}

impl HttpFetcher {
    /// Validate `config` and build the direct client and page cache.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid configuration and
    /// [`SearchError::Fetch`] if the HTTP client cannot be built.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let direct = build_client(&config, None)?;
        let cache = PageCache::new(config.cache_ttl_seconds);
        Ok(Self {
            config,
            direct,
            cache,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn user_agent(&self) -> &str {
        match self.config.user_agent {
            Some(ref custom) => custom.as_str(),
            None => random_user_agent(),
        }
    }

    async fn get(&self, client: &reqwest::Client, url: &str) -> Result<String, SearchError> {
        let mut request = client.get(url).header(USER_AGENT, self.user_agent());
        if let Some(referer) = origin(url) {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await.map_err(describe_transport_error)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(SearchError::Fetch(format!("unexpected HTTP status {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| SearchError::Fetch(format!("failed to read body: {}", e.without_url())))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, route: &Route) -> Result<String, SearchError> {
        if let Some(body) = self.cache.get(url).await {
            tracing::debug!("results page served from cache");
            return Ok(body);
        }

        tracing::trace!(%url, proxied = route.is_proxied(), "fetching results page");
        let body = match route {
            Route::Direct => self.get(&self.direct, url).await?,
            Route::Proxy(endpoint) => {
                let client = build_client(&self.config, Some(endpoint))?;
                self.get(&client, url).await?
            }
        };

        if is_captcha_page(&body) {
            return Err(SearchError::CaptchaDetected(
                origin(url).unwrap_or_else(|| "search engine".into()),
            ));
        }

        tracing::debug!(bytes = body.len(), "results page fetched");
        self.cache.insert(url, body.clone()).await;
        Ok(body)
    }
}

fn describe_transport_error(err: reqwest::Error) -> SearchError {
    let kind = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_redirect() {
        "too many redirects"
    } else {
        "request failed"
    };
    SearchError::Fetch(format!("{kind}: {}", err.without_url()))
}
