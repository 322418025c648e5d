//! Result extraction from raw SERP HTML.
//!
//! Parsing is lenient: html5ever builds a tree out of any input, so broken
//! markup never fails the pipeline. It only yields fewer (or zero) entries.

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::SearchError;
use crate::types::{ResultEntry, SelectorConfig};

/// Compiled form of a [`SelectorConfig`].
///
/// Compiling up front turns an unusable strategy configuration into a
/// [`SearchError::StrategyMisconfigured`] before any request is made.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    link: Selector,
    clean: Option<Regex>,
}

impl ExtractionRules {
    /// Compile the link selector and optional clean regex.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::StrategyMisconfigured`] if the selector or the
    /// regex does not parse, or if the regex has no capture group.
    pub fn compile(config: &SelectorConfig) -> Result<Self, SearchError> {
        if config.link.trim().is_empty() {
            return Err(SearchError::StrategyMisconfigured(
                "link selector is empty".into(),
            ));
        }
        let link = Selector::parse(&config.link).map_err(|e| {
            SearchError::StrategyMisconfigured(format!(
                "invalid link selector '{}': {e:?}",
                config.link
            ))
        })?;

        let clean = match config.clean_regex.as_deref() {
            Some(pattern) => {
                let re = Regex::new(pattern).map_err(|e| {
                    SearchError::StrategyMisconfigured(format!("invalid clean regex: {e}"))
                })?;
                if re.captures_len() < 2 {
                    return Err(SearchError::StrategyMisconfigured(
                        "clean regex needs a capture group".into(),
                    ));
                }
                Some(re)
            }
            None => None,
        };

        Ok(Self { link, clean })
    }

    /// Unwrap `href` with this rule set's clean regex.
    pub fn clean_url(&self, href: &str) -> String {
        clean_url(href, self.clean.as_ref())
    }
}

/// Extract result entries from `html` in document order.
///
/// Every node matched by the link selector yields one entry. A node without
/// an `href` still occupies its position, with an empty link.
pub fn extract(html: &str, rules: &ExtractionRules) -> Vec<ResultEntry> {
    let document = Html::parse_document(html);

    let entries: Vec<ResultEntry> = document
        .select(&rules.link)
        .map(|node| {
            let text = node.text().collect::<String>();
            let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
            let href = node.value().attr("href").unwrap_or_default();
            ResultEntry {
                title,
                link: rules.clean_url(href),
            }
        })
        .collect();

    tracing::debug!(count = entries.len(), "result entries extracted");
    entries
}

/// Apply a redirect-unwrapping regex to `href`.
///
/// Returns the first capture group when the regex matches with a non-empty
/// capture, otherwise `href` unchanged.
pub fn clean_url(href: &str, regex: Option<&Regex>) -> String {
    regex
        .and_then(|re| re.captures(href))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|inner| !inner.is_empty())
        .unwrap_or(href)
        .to_string()
}
