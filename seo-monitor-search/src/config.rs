//! Fetch configuration with sensible defaults.
//!
//! [`SearchConfig`] controls timeouts, redirects, caching and request
//! pacing. The defaults are tuned for reliable, polite scraping.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Upper bound for [`SearchConfig::timeout_seconds`].
pub const MAX_TIMEOUT_SECONDS: u64 = 30;
/// Upper bound for [`SearchConfig::connect_timeout_seconds`].
pub const MAX_CONNECT_TIMEOUT_SECONDS: u64 = 10;
/// Upper bound for [`SearchConfig::max_redirects`].
pub const MAX_REDIRECTS: usize = 5;

/// Configuration for fetching results pages.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Overall request timeout in seconds (connect + transfer).
    pub timeout_seconds: u64,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_seconds: u64,
    /// Maximum redirect hops followed per request.
    pub max_redirects: usize,
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// How long to cache fetched pages in seconds. Set to 0 to disable caching.
    pub cache_ttl_seconds: u64,
    /// Random delay range in milliseconds `(min, max)` between page requests
    /// of one keyword.
    pub request_delay_ms: (u64, u64),
    /// Skip TLS certificate verification on proxied requests.
    ///
    /// Enabled by default for compatibility with intercepting proxies. This
    /// weakens transport security; turn it off whenever the proxies in use
    /// present valid certificates.
    pub accept_invalid_proxy_certs: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            max_redirects: 5,
            user_agent: None,
            cache_ttl_seconds: 600,
            request_delay_ms: (100, 500),
            accept_invalid_proxy_certs: true,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `timeout_seconds` must be in `1..=30`
    /// - `connect_timeout_seconds` must be in `1..=10` and <= `timeout_seconds`
    /// - `max_redirects` must be <= 5
    /// - `request_delay_ms.0` must be <= `request_delay_ms.1`
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(SearchError::Config(format!(
                "timeout_seconds must be <= {MAX_TIMEOUT_SECONDS}"
            )));
        }
        if self.connect_timeout_seconds == 0 {
            return Err(SearchError::Config(
                "connect_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.connect_timeout_seconds > MAX_CONNECT_TIMEOUT_SECONDS {
            return Err(SearchError::Config(format!(
                "connect_timeout_seconds must be <= {MAX_CONNECT_TIMEOUT_SECONDS}"
            )));
        }
        if self.max_redirects > MAX_REDIRECTS {
            return Err(SearchError::Config(format!(
                "max_redirects must be <= {MAX_REDIRECTS}"
            )));
        }
        if self.connect_timeout_seconds > self.timeout_seconds {
            return Err(SearchError::Config(
                "connect_timeout_seconds must be <= timeout_seconds".into(),
            ));
        }
        if self.request_delay_ms.0 > self.request_delay_ms.1 {
            return Err(SearchError::Config(
                "request_delay_ms min must be <= max".into(),
            ));
        }
        Ok(())
    }
}
