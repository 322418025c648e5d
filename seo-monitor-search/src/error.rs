//! Error types for the seo-monitor-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. Proxy credentials never appear in error
//! messages.

/// Errors that can occur while querying a search engine.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// No strategy is registered under the requested engine key.
    #[error("no search engine strategy registered for '{0}'")]
    StrategyNotFound(String),

    /// A strategy is registered but cannot be used (missing or invalid
    /// selector configuration, zero pages to fetch, bad base URL).
    #[error("search engine strategy misconfigured: {0}")]
    StrategyMisconfigured(String),

    /// The results page could not be fetched (transport error, timeout,
    /// or a non-200 response).
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The engine answered with a CAPTCHA challenge instead of results.
    #[error("captcha detected: {0}")]
    CaptchaDetected(String),

    /// Caller supplied an unusable query (empty keyword, page 0, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for seo-monitor-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
