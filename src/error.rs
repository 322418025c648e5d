//! Error types for the rank monitor.

use seo_monitor_search::SearchError;

use crate::model::{EngineId, KeywordId, RankOutcome};
use crate::store::StoreError;

/// Top-level error type for rank resolution and catalog maintenance.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// No query strategy is registered for the engine's short name.
    #[error("no search engine strategy registered for '{0}'")]
    StrategyNotFound(String),

    /// The registered strategy cannot be used.
    #[error("search engine strategy misconfigured: {0}")]
    StrategyMisconfigured(String),

    /// No results page could be fetched.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The search engine answered with a CAPTCHA instead of results.
    #[error("captcha detected: {0}")]
    CaptchaDetected(String),

    /// The rank store is unavailable or rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// A rank was resolved but could not be persisted. The computed outcome
    /// is carried back so callers can still display it.
    #[error("rank {} resolved but not recorded: {reason}", .outcome.rank)]
    RecordFailed {
        outcome: Box<RankOutcome>,
        reason: String,
    },

    /// Unusable caller input (empty keyword text, site URL without host, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced keyword, site or engine does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A search engine cannot be removed while a site still uses it.
    #[error("search engine {0} is still used by at least one site")]
    EngineInUse(EngineId),

    /// Another resolution of the same keyword is in flight.
    #[error("keyword {0} is already being resolved")]
    ResolutionInProgress(KeywordId),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// Whether this failure means the engine blocked us, as opposed to a
    /// legitimately unranked keyword or a local fault.
    pub fn is_captcha(&self) -> bool {
        matches!(self, Self::CaptchaDetected(_))
    }
}

impl From<SearchError> for MonitorError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::StrategyNotFound(key) => Self::StrategyNotFound(key),
            SearchError::StrategyMisconfigured(reason) => Self::StrategyMisconfigured(reason),
            SearchError::Fetch(reason) => Self::Fetch(reason),
            SearchError::CaptchaDetected(source) => Self::CaptchaDetected(source),
            SearchError::InvalidInput(reason) => Self::InvalidInput(reason),
            SearchError::Config(reason) => Self::Config(reason),
        }
    }
}

impl From<StoreError> for MonitorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::EngineInUse(id) => Self::EngineInUse(id),
            StoreError::Invalid(reason) => Self::InvalidInput(reason),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RankStatus;

    #[test]
    fn search_errors_keep_their_kind() {
        let err: MonitorError = SearchError::StrategyNotFound("yahoo".into()).into();
        assert!(matches!(err, MonitorError::StrategyNotFound(ref k) if k == "yahoo"));

        let err: MonitorError = SearchError::CaptchaDetected("https://www.google.com".into()).into();
        assert!(err.is_captcha());

        let err: MonitorError = SearchError::Fetch("HTTP 503".into()).into();
        assert_eq!(err.to_string(), "fetch failed: HTTP 503");
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: MonitorError = StoreError::NotFound("keyword 7".into()).into();
        assert!(matches!(err, MonitorError::NotFound(_)));
        assert_eq!(err.to_string(), "not found: keyword 7");
    }

    #[test]
    fn store_lock_maps_to_storage() {
        let err: MonitorError = StoreError::Lock("poisoned".into()).into();
        assert!(matches!(err, MonitorError::Storage(_)));
    }

    #[test]
    fn record_failed_is_distinguishable_from_zero_rank() {
        let err = MonitorError::RecordFailed {
            outcome: Box::new(RankOutcome {
                rank: 0,
                url: String::new(),
                title: String::new(),
                status: RankStatus::Success,
                message: None,
            }),
            reason: "database is locked".into(),
        };
        assert_eq!(
            err.to_string(),
            "rank 0 resolved but not recorded: database is locked"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MonitorError>();
    }
}
