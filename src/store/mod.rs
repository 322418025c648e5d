//! Rank store ports and the SQLite implementation.
//!
//! The resolver only sees the traits below; [`SqliteStore`] implements all
//! of them over a single database file.

pub mod schema;
pub mod sqlite;

use chrono::NaiveDateTime;

use crate::model::{
    EngineId, Keyword, KeywordFilter, KeywordId, RankingRecord, RecordOrder, SearchEngineRecord,
    Site, SiteId,
};

pub use sqlite::SqliteStore;

/// Errors from the rank store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("search engine {0} is still used by at least one site")]
    EngineInUse(EngineId),

    #[error("invalid value: {0}")]
    Invalid(String),
}

/// Read-only site lookup.
pub trait SiteLookup: Send + Sync {
    fn get_site(&self, id: SiteId) -> Result<Site, StoreError>;
}

/// Read-only engine lookup.
pub trait EngineLookup: Send + Sync {
    fn get_engine(&self, id: EngineId) -> Result<SearchEngineRecord, StoreError>;
}

/// Keyword reads and whole-row updates.
pub trait KeywordStore: Send + Sync {
    fn get_keyword(&self, id: KeywordId) -> Result<Keyword, StoreError>;

    fn list_keywords(&self, filter: &KeywordFilter) -> Result<Vec<Keyword>, StoreError>;

    /// Overwrite the mutable fields (text, rank fields, last check) of an
    /// existing keyword.
    fn update_keyword(&self, keyword: &Keyword) -> Result<(), StoreError>;
}

/// Append-only rank history.
pub trait RankingHistoryStore: Send + Sync {
    fn append_record(
        &self,
        keyword_id: KeywordId,
        rank: u32,
        rank_link: &str,
        observed_at: NaiveDateTime,
    ) -> Result<RankingRecord, StoreError>;

    fn list_records(
        &self,
        keyword_id: KeywordId,
        order: RecordOrder,
        limit: Option<usize>,
    ) -> Result<Vec<RankingRecord>, StoreError>;

    /// Delete every record of a keyword, returning how many were removed.
    fn delete_records(&self, keyword_id: KeywordId) -> Result<usize, StoreError>;
}

/// Atomic "advance live rank fields and append history" for one keyword.
///
/// Implementations must apply both writes in one transaction so readers
/// never observe a history record without the matching keyword update
/// (or the reverse).
pub trait RankLedger: Send + Sync {
    fn record_rank(
        &self,
        keyword_id: KeywordId,
        rank: u32,
        rank_link: &str,
        observed_at: NaiveDateTime,
    ) -> Result<(Keyword, RankingRecord), StoreError>;
}

/// Everything the resolver needs from storage.
pub trait MonitorStore:
    SiteLookup + EngineLookup + KeywordStore + RankingHistoryStore + RankLedger
{
}

impl<T> MonitorStore for T where
    T: SiteLookup + EngineLookup + KeywordStore + RankingHistoryStore + RankLedger
{
}
