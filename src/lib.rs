//! SEO rank monitor: tracks where a site ranks for its keywords on search
//! engines, day after day.
//!
//! # Architecture
//!
//! A resolution runs through independent stages:
//! - **Strategy**: the engine's query builder and result selectors, resolved
//!   by engine short name from a [`StrategyRegistry`]
//! - **Fetch**: results pages via `reqwest`, directly or through a rotating
//!   proxy, with a TTL page cache
//! - **Extract**: organic result links in on-page order via `scraper`
//! - **Match**: first result whose host equals the site's host ([`matcher`])
//! - **Record**: live rank fields and an append-only history row, in one
//!   SQLite transaction ([`recorder`], [`store`])
//!
//! [`RankResolver`] ties the stages together for one keyword and runs the
//! daily sweep over every keyword not yet checked today.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod event_log;
pub mod locks;
pub mod matcher;
pub mod model;
pub mod orchestrator;
pub mod paths;
pub mod proxy;
pub mod recorder;
pub mod store;

pub use config::{ConflictPolicy, MonitorConfig};
pub use error::{MonitorError, Result};
pub use event_log::{EventSink, TracingSink};
pub use matcher::match_rank;
pub use model::{
    BatchSummary, Keyword, KeywordFilter, RankOutcome, RankStatus, RankingRecord,
    SearchEngineRecord, Severity, Site,
};
pub use orchestrator::RankResolver;
pub use recorder::{RankRecorder, RecordedRank};
pub use seo_monitor_search::StrategyRegistry;
pub use store::SqliteStore;
