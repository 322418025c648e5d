//! In-memory cache for fetched results pages.
//!
//! Caches raw SERP bodies keyed by the fully-encoded query URL. Uses
//! [`moka`] for async-friendly caching with a TTL and automatic eviction.
//! Each [`crate::http::HttpFetcher`] owns its own cache instance.

use std::time::Duration;

use moka::future::Cache;

/// Maximum number of cached pages.
const MAX_CACHE_ENTRIES: u64 = 500;

/// TTL-bounded page cache. A TTL of zero disables caching entirely.
#[derive(Clone)]
pub struct PageCache {
    inner: Option<Cache<String, String>>,
}

impl PageCache {
    /// Create a cache whose entries expire after `ttl_seconds`.
    pub fn new(ttl_seconds: u64) -> Self {
        let inner = (ttl_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build()
        });
        Self { inner }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Look up a cached body for `url`.
    pub async fn get(&self, url: &str) -> Option<String> {
        match &self.inner {
            Some(cache) => cache.get(url).await,
            None => None,
        }
    }

    /// Store a body for `url`.
    pub async fn insert(&self, url: &str, body: String) {
        if let Some(cache) = &self.inner {
            cache.insert(url.to_string(), body).await;
        }
    }
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
