//! Core data model: engines, sites, keywords, rank history and outcomes.
//!
//! Rank values use `0` for "unranked" throughout; positive ranks are
//! 1-based SERP positions.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub type EngineId = i64;
pub type SiteId = i64;
pub type KeywordId = i64;
pub type RecordId = i64;

/// A registered search engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEngineRecord {
    pub id: EngineId,
    /// Human-readable name, e.g. `Google UK`.
    pub name: String,
    /// Base URL queries are built against, e.g. `https://www.google.co.uk`.
    pub base_url: String,
    /// Strategy key, e.g. `google`.
    pub short_name: String,
    /// Free-form grouping tag.
    pub group: Option<String>,
}

/// A site whose rankings are monitored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    /// Canonical URL; only its host matters for matching.
    pub url: String,
    /// Country code, or `all` for no geo restriction.
    pub location: String,
    /// Interface language code.
    pub language: String,
    /// Engines this site is ranked on.
    pub engine_ids: Vec<EngineId>,
}

/// A tracked (site, engine, keyword text) triple with its live rank fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub text: String,
    pub site_id: SiteId,
    pub engine_id: EngineId,
    pub rank: u32,
    pub previous: u32,
    pub top_rank: u32,
    /// `None` until the first resolution reaches the recording step.
    pub last_check: Option<NaiveDateTime>,
}

impl Keyword {
    pub fn state(&self) -> RankState {
        RankState {
            rank: self.rank,
            previous: self.previous,
            top_rank: self.top_rank,
        }
    }
}

/// An immutable rank history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    pub id: RecordId,
    pub keyword_id: KeywordId,
    pub rank: u32,
    /// Matched result URL, empty when unranked.
    pub rank_link: String,
    pub observed_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStatus {
    Success,
    Error,
}

/// Result of matching a site against extracted SERP entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankOutcome {
    /// 1-based position, `0` when not found.
    pub rank: u32,
    /// Matched result URL, empty when not found.
    pub url: String,
    /// Title of the matched result, empty when not found.
    pub title: String,
    pub status: RankStatus,
    pub message: Option<String>,
}

impl RankOutcome {
    pub fn is_ranked(&self) -> bool {
        self.rank > 0
    }
}

/// The live rank fields of a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RankState {
    pub rank: u32,
    pub previous: u32,
    pub top_rank: u32,
}

impl RankState {
    /// State after observing `new_rank`.
    ///
    /// `previous` takes the old rank. `top_rank` only ever moves to a
    /// better (lower, nonzero) rank; an unranked observation leaves it alone.
    #[must_use]
    pub fn advance(self, new_rank: u32) -> Self {
        let top_rank = if new_rank > 0 && (self.top_rank == 0 || new_rank < self.top_rank) {
            new_rank
        } else {
            self.top_rank
        };
        Self {
            rank: new_rank,
            previous: self.rank,
            top_rank,
        }
    }
}

/// Whether a keyword last checked at `last_check` is due again on `today`.
///
/// A pure calendar-date comparison: anything checked on an earlier date
/// (or never) is due, regardless of how many hours have passed.
pub fn is_due(last_check: Option<NaiveDateTime>, today: NaiveDate) -> bool {
    match last_check {
        Some(checked) => checked.date() < today,
        None => true,
    }
}

/// Keyword listing filter. All set criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    pub id: Option<KeywordId>,
    pub site_id: Option<SiteId>,
    pub engine_id: Option<EngineId>,
    /// Case-insensitive substring of the keyword text.
    pub text: Option<String>,
    /// Only keywords due for a refresh on this date.
    pub due_on: Option<NaiveDate>,
}

impl KeywordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn due_on(today: NaiveDate) -> Self {
        Self {
            due_on: Some(today),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn site(mut self, site_id: SiteId) -> Self {
        self.site_id = Some(site_id);
        self
    }

    #[must_use]
    pub fn engine(mut self, engine_id: EngineId) -> Self {
        self.engine_id = Some(engine_id);
        self
    }

    #[must_use]
    pub fn text(mut self, needle: impl Into<String>) -> Self {
        self.text = Some(needle.into());
        self
    }

    #[must_use]
    pub fn id(mut self, id: KeywordId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Ordering for rank history listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Tally of one batch sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures caused by a CAPTCHA challenge (included in `failed`).
    pub captcha_blocked: usize,
}

/// Event log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Event,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Event => "event",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "debug" => Some(Self::Debug),
            "event" => Some(Self::Event),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted event log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub id: i64,
    pub category: String,
    pub message: String,
    pub severity: Severity,
    pub logged_at: NaiveDateTime,
}
