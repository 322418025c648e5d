//! Google strategy, the reference engine.
//!
//! Google wraps organic result links in a `/url?q=<target>&sa=U&...`
//! redirect on its basic HTML results page, so the strategy ships a clean
//! regex that unwraps the target. Regional variants (`google.co.uk`,
//! `google.nl`, ...) share this strategy and differ only by base URL.

use crate::engine::{endpoint, validate_request, EngineQueryStrategy};
use crate::error::SearchError;
use crate::types::{QueryRequest, SelectorConfig};

/// Default Google base URL.
pub const GOOGLE_BASE_URL: &str = "https://www.google.com";

/// Organic result anchors on the basic HTML results page.
const LINK_SELECTOR: &str = "h3.r > a";

/// Unwraps `/url?q=<target>&sa=U...` redirect links.
const CLEAN_REGEX: &str = r"/url\?q=(.*?)&sa=U";

/// Google results-page query strategy.
#[derive(Debug, Clone)]
pub struct GoogleStrategy {
    per_page: u32,
    pages: u32,
}

impl Default for GoogleStrategy {
    fn default() -> Self {
        Self {
            per_page: 100,
            pages: 1,
        }
    }
}

impl GoogleStrategy {
    /// Strategy fetching `pages` pages of `per_page` results each.
    ///
    /// Google serves at most 100 results per page; larger values are clamped.
    pub fn new(per_page: u32, pages: u32) -> Self {
        Self {
            per_page: per_page.clamp(1, 100),
            pages,
        }
    }
}

impl EngineQueryStrategy for GoogleStrategy {
    fn key(&self) -> &str {
        "google"
    }

    fn default_base_url(&self) -> &str {
        GOOGLE_BASE_URL
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
        let language = match request.language.trim() {
            "" => "en",
            lang => lang,
        };

        let mut url = endpoint(base_url, "search")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", request.keyword.trim())
                .append_pair("num", &self.per_page.to_string())
                .append_pair("start", &start.to_string())
                .append_pair("client", "firefox-a")
                // Personalisation off, omitted results included.
                .append_pair("pws", "0")
                .append_pair("filter", "0")
                .append_pair("safe", "off")
                .append_pair("ie", "UTF-8")
                .append_pair("oe", "UTF-8")
                .append_pair("access", "a");
            if let Some(geo) = request.geo() {
                query.append_pair("gl", geo);
            }
            query
                .append_pair("btnG", "Search")
                .append_pair("hl", language)
                .append_pair("channel", "fs");
        }

        tracing::trace!(query = %url, "Google query built");
        Ok(url.into())
    }

    fn selectors(&self) -> Option<SelectorConfig> {
        Some(SelectorConfig::new(LINK_SELECTOR).with_clean_regex(CLEAN_REGEX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn params(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .expect("valid url")
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn param(url: &str, key: &str) -> Option<String> {
        params(url).into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[test]
    fn builds_first_page_query() {
        let strategy = GoogleStrategy::default();
        let req = QueryRequest::new("blue widgets", "us", "en");
        let url = strategy
            .build_query(GOOGLE_BASE_URL, &req)
            .expect("query builds");

        assert!(url.starts_with("https://www.google.com/search?"));
        assert!(url.contains("q=blue+widgets"));
        assert_eq!(param(&url, "num").as_deref(), Some("100"));
        assert_eq!(param(&url, "start").as_deref(), Some("0"));
        assert_eq!(param(&url, "gl").as_deref(), Some("us"));
        assert_eq!(param(&url, "hl").as_deref(), Some("en"));
        assert_eq!(param(&url, "pws").as_deref(), Some("0"));
        assert_eq!(param(&url, "safe").as_deref(), Some("off"));
        assert_eq!(param(&url, "ie").as_deref(), Some("UTF-8"));
        assert_eq!(param(&url, "oe").as_deref(), Some("UTF-8"));
    }

    #[test]
    fn offset_derives_from_page_number() {
        let strategy = GoogleStrategy::new(10, 3);
        let base = QueryRequest::new("widgets", "all", "en");
        for (page, expected) in [(1, "0"), (2, "10"), (3, "20")] {
            let url = strategy
                .build_query(GOOGLE_BASE_URL, &base.page(page))
                .expect("query builds");
            assert_eq!(param(&url, "start").as_deref(), Some(expected));
        }
    }

    #[test]
    fn location_all_omits_geo() {
        let strategy = GoogleStrategy::default();
        let url = strategy
            .build_query(GOOGLE_BASE_URL, &QueryRequest::new("widgets", "all", "nl"))
            .expect("query builds");
        assert_eq!(param(&url, "gl"), None);
        assert_eq!(param(&url, "hl").as_deref(), Some("nl"));
    }

    #[test]
    fn keyword_is_percent_encoded() {
        let strategy = GoogleStrategy::default();
        let url = strategy
            .build_query(GOOGLE_BASE_URL, &QueryRequest::new("café & bar", "fr", "fr"))
            .expect("query builds");
        assert!(url.contains("q=caf%C3%A9+%26+bar"));
        assert_eq!(param(&url, "q").as_deref(), Some("café & bar"));
    }

    #[test]
    fn regional_base_url_override() {
        let strategy = GoogleStrategy::default();
        let url = strategy
            .build_query("http://www.google.co.uk/", &QueryRequest::new("widgets", "gb", "en"))
            .expect("query builds");
        assert!(url.starts_with("http://www.google.co.uk/search?"));
    }

    #[test]
    fn empty_language_defaults_to_english() {
        let strategy = GoogleStrategy::default();
        let url = strategy
            .build_query(GOOGLE_BASE_URL, &QueryRequest::new("widgets", "us", ""))
            .expect("query builds");
        assert_eq!(param(&url, "hl").as_deref(), Some("en"));
    }

    #[test]
    fn rejects_empty_keyword() {
        let strategy = GoogleStrategy::default();
        let err = strategy
            .build_query(GOOGLE_BASE_URL, &QueryRequest::new("", "us", "en"))
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidInput(_)));
    }

    #[test]
    fn per_page_is_clamped() {
        let strategy = GoogleStrategy::new(500, 1);
        assert_eq!(strategy.results_per_page(), 100);
    }

    #[test]
    fn exposes_selectors_with_clean_regex() {
        let selectors = GoogleStrategy::default().selectors().expect("selectors");
        assert_eq!(selectors.link, "h3.r > a");
        assert_eq!(selectors.clean_regex.as_deref(), Some(r"/url\?q=(.*?)&sa=U"));
    }

    #[test]
    fn is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GoogleStrategy>();
    }
}
