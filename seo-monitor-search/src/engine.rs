//! Pluggable per-engine query strategies and the registry that resolves them.
//!
//! Each search engine (Google, Bing) implements [`EngineQueryStrategy`] to
//! describe how its results page is requested and where organic result
//! links live in the returned HTML. Registering a new engine means providing
//! one implementation and adding it to a [`StrategyRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::engines::{BingStrategy, GoogleStrategy};
use crate::error::SearchError;
use crate::extract::ExtractionRules;
use crate::types::{QueryRequest, SelectorConfig};

/// A search engine's query-building and selector capabilities.
///
/// All implementations must be `Send + Sync`; a single registered instance
/// is shared by every concurrent keyword resolution.
pub trait EngineQueryStrategy: Send + Sync {
    /// Registry key, matched against the engine short name (e.g. `google`).
    fn key(&self) -> &str;

    /// Base URL used when the registered engine does not override it.
    fn default_base_url(&self) -> &str;

    /// Number of results requested per page.
    fn results_per_page(&self) -> u32;

    /// How many result pages to fetch per keyword.
    fn pages_to_fetch(&self) -> u32 {
        1
    }

    /// Build the fully-encoded results-page URL against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidInput`] for an empty keyword or a page
    /// number below 1, and [`SearchError::StrategyMisconfigured`] when
    /// `base_url` is not an absolute URL.
    fn build_query(&self, base_url: &str, request: &QueryRequest) -> Result<String, SearchError>;

    /// Selector configuration for the extractor. `None` marks a strategy
    /// that cannot parse its own results page yet.
    fn selectors(&self) -> Option<SelectorConfig>;
}

/// A strategy whose selector configuration has been checked and compiled.
#[derive(Clone)]
pub struct ResolvedStrategy {
    strategy: Arc<dyn EngineQueryStrategy>,
    rules: ExtractionRules,
    pages: u32,
}

impl ResolvedStrategy {
    pub fn strategy(&self) -> &dyn EngineQueryStrategy {
        self.strategy.as_ref()
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    pub fn pages_to_fetch(&self) -> u32 {
        self.pages
    }

    pub fn key(&self) -> &str {
        self.strategy.key()
    }
}

impl std::fmt::Debug for ResolvedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedStrategy")
            .field("key", &self.strategy.key())
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

/// Explicit mapping from engine key to strategy, populated at startup.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn EngineQueryStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in Google and Bing strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GoogleStrategy::default()));
        registry.register(Arc::new(BingStrategy::default()));
        registry
    }

    /// Register (or replace) a strategy under its lowercased key.
    pub fn register(&mut self, strategy: Arc<dyn EngineQueryStrategy>) {
        let key = strategy.key().trim().to_lowercase();
        tracing::debug!(%key, "search engine strategy registered");
        self.strategies.insert(key, strategy);
    }

    /// Keys of all registered strategies, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.strategies.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Look up a strategy by engine key and compile its selectors.
    ///
    /// # Errors
    ///
    /// - [`SearchError::StrategyNotFound`] if no strategy is registered under `key`.
    /// - [`SearchError::StrategyMisconfigured`] if the strategy exposes no
    ///   selector configuration, an invalid one, or zero pages to fetch.
    pub fn resolve(&self, key: &str) -> Result<ResolvedStrategy, SearchError> {
        let normalised = key.trim().to_lowercase();
        let strategy = self
            .strategies
            .get(&normalised)
            .cloned()
            .ok_or_else(|| SearchError::StrategyNotFound(normalised.clone()))?;

        let selectors = strategy.selectors().ok_or_else(|| {
            SearchError::StrategyMisconfigured(format!(
                "strategy '{normalised}' provides no selector configuration"
            ))
        })?;
        let rules = ExtractionRules::compile(&selectors)?;

        let pages = strategy.pages_to_fetch();
        if pages == 0 {
            return Err(SearchError::StrategyMisconfigured(format!(
                "strategy '{normalised}' fetches zero pages"
            )));
        }

        Ok(ResolvedStrategy {
            strategy,
            rules,
            pages,
        })
    }
}

/// Shared input checks for [`EngineQueryStrategy::build_query`] implementations.
pub(crate) fn validate_request(request: &QueryRequest) -> Result<(), SearchError> {
    if request.keyword.trim().is_empty() {
        return Err(SearchError::InvalidInput("keyword text is empty".into()));
    }
    if request.page_number == 0 {
        return Err(SearchError::InvalidInput(
            "page numbers start at 1".into(),
        ));
    }
    Ok(())
}

/// Join `path` onto `base_url`, tolerating a trailing slash on the base.
pub(crate) fn endpoint(base_url: &str, path: &str) -> Result<url::Url, SearchError> {
    let joined = format!("{}/{}", base_url.trim().trim_end_matches('/'), path);
    let url = url::Url::parse(&joined).map_err(|e| {
        SearchError::StrategyMisconfigured(format!("invalid base URL '{base_url}': {e}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SearchError::StrategyMisconfigured(format!(
            "base URL '{base_url}' must use http or https"
        )));
    }
    Ok(url)
}
