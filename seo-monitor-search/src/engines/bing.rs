//! Bing strategy behind the same capability interface.
//!
//! Bing links organic results directly from `li.b_algo h2 > a`, so no
//! href cleaning is needed. Its offset parameter `first` is 1-based.

use crate::engine::{endpoint, validate_request, EngineQueryStrategy};
use crate::error::SearchError;
use crate::types::{QueryRequest, SelectorConfig};

/// Default Bing base URL.
pub const BING_BASE_URL: &str = "https://www.bing.com";

/// Bing results-page query strategy.
#[derive(Debug, Clone)]
pub struct BingStrategy {
    per_page: u32,
    pages: u32,
}

impl Default for BingStrategy {
    fn default() -> Self {
        Self {
            per_page: 50,
            pages: 1,
        }
    }
}

impl BingStrategy {
    pub fn new(per_page: u32, pages: u32) -> Self {
        Self {
            per_page: per_page.clamp(1, 50),
            pages,
        }
    }
}

impl EngineQueryStrategy for BingStrategy {
    fn key(&self) -> &str {
        "bing"
    }

    fn default_base_url(&self) -> &str {
        BING_BASE_URL
    }

    fn results_per_page(&self) -> u32 {
        self.per_page
    }

    fn pages_to_fetch(&self) -> u32 {
        self.pages
    }

    fn build_query(&self, base_url: &str, request: &QueryRequest) -> Result<String, SearchError> {
        validate_request(request)?;

        let start = (request.page_number - 1) * self.per_page;
        let mut url = endpoint(base_url, "search")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", request.keyword.trim())
                .append_pair("count", &self.per_page.to_string())
                .append_pair("first", &(start + 1).to_string())
                .append_pair("adlt", "off");
            if !request.language.trim().is_empty() {
                query.append_pair("setlang", request.language.trim());
            }
            if let Some(geo) = request.geo() {
                query.append_pair("cc", geo);
            }
        }

        tracing::trace!(query = %url, "Bing query built");
        Ok(url.into())
    }

    fn selectors(&self) -> Option<SelectorConfig> {
        Some(SelectorConfig::new("li.b_algo h2 > a"))
    }
}
