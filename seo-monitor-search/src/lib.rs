//! # seo-monitor-search
//!
//! Search-engine side of the SEO rank monitor: how to ask an engine for a
//! results page, how to fetch it, and how to read organic listings out of it.
//!
//! ## Design
//!
//! - One [`EngineQueryStrategy`] per engine (Google, Bing), resolved through
//!   an explicit [`StrategyRegistry`] keyed by engine short name
//! - Strategies hand CSS selectors and an optional redirect-unwrapping regex
//!   to the extractor, which yields [`ResultEntry`]s in on-page order
//! - Fetching goes through the [`PageFetcher`] seam; [`HttpFetcher`] adds
//!   User-Agent rotation, bounded timeouts and redirects, proxy routing and a
//!   TTL page cache
//! - Lenient HTML parsing: broken markup yields fewer entries, never an error
//!
//! ## Security
//!
//! - Raw query URLs are logged only at trace level
//! - Proxy credentials never appear in logs or error messages
//! - TLS verification on proxied requests is controlled by
//!   [`SearchConfig::accept_invalid_proxy_certs`]; it is on by default for
//!   compatibility and should be switched off wherever proxies allow

pub mod cache;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod extract;
pub mod host;
pub mod http;
pub mod types;

pub use config::SearchConfig;
pub use engine::{EngineQueryStrategy, ResolvedStrategy, StrategyRegistry};
pub use error::{Result, SearchError};
pub use extract::{extract, ExtractionRules};
pub use http::{HttpFetcher, PageFetcher};
pub use types::{ProxyEndpoint, QueryRequest, ResultEntry, Route, SelectorConfig};

/// Fetch one results page for `request` and extract its entries.
///
/// Convenience wrapper tying a resolved strategy, a fetcher and the
/// extractor together for a single page.
///
/// # Errors
///
/// Propagates query-building errors from the strategy and fetch errors
/// (including [`SearchError::CaptchaDetected`]) from the fetcher.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> seo_monitor_search::Result<()> {
/// use seo_monitor_search::{HttpFetcher, QueryRequest, Route, SearchConfig, StrategyRegistry};
///
/// let registry = StrategyRegistry::with_defaults();
/// let google = registry.resolve("google")?;
/// let fetcher = HttpFetcher::new(SearchConfig::default())?;
/// let request = QueryRequest::new("rust programming", "us", "en");
/// let entries = seo_monitor_search::fetch_entries(
///     &google,
///     google.strategy().default_base_url(),
///     &request,
///     &fetcher,
///     &Route::Direct,
/// )
/// .await?;
/// for (position, entry) in entries.iter().enumerate() {
///     println!("{}: {}", position + 1, entry.link);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn fetch_entries(
    strategy: &ResolvedStrategy,
    base_url: &str,
    request: &QueryRequest,
    fetcher: &dyn PageFetcher,
    route: &Route,
) -> Result<Vec<ResultEntry>> {
    let url = strategy.strategy().build_query(base_url, request)?;
    let body = fetcher.fetch(&url, route).await?;
    Ok(extract(&body, strategy.rules()))
}
