//! SQLite-backed rank store.
//!
//! Holds engines, sites, keywords, rank history and the event log in a
//! single database file (default `{data_dir}/seo-monitor.db`).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use seo_monitor_search::host::engine_key_from_base_url;

use super::schema::{apply_schema, read_schema_version};
use super::{EngineLookup, KeywordStore, RankLedger, RankingHistoryStore, SiteLookup, StoreError};
use crate::event_log::{EventSink, TracingSink};
use crate::model::{
    EngineId, EventRecord, Keyword, KeywordFilter, KeywordId, RankingRecord, RecordOrder,
    SearchEngineRecord, Severity, Site, SiteId, is_due,
};

/// Storage format of every timestamp column.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const KEYWORD_COLUMNS: &str = "id, keyword, site_id, engine_id, rank, previous, top_rank, last_check";

/// Parameters for registering a search engine.
pub struct NewEngine<'a> {
    pub name: &'a str,
    pub base_url: &'a str,
    /// Strategy key; derived from `base_url` when `None`.
    pub short_name: Option<&'a str>,
    pub group: Option<&'a str>,
}

/// Parameters for registering a site.
pub struct NewSite<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub location: &'a str,
    pub language: &'a str,
}

/// SQLite-backed rank store.
///
/// Thread-safe via an internal `Mutex<Connection>`. All writes are
/// serialized, which also serializes rank recording per keyword.
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    ///
    /// Applies the schema if the database is new.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        tracing::debug!(path = %path.display(), "rank store opened");
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// A private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    // ── Engines ──────────────────────────────────────────────────────────

    /// Register a search engine.
    ///
    /// # Errors
    ///
    /// [`StoreError::Invalid`] for an empty name, a non-http(s) base URL, or
    /// a base URL no short name can be derived from.
    pub fn add_engine(&self, engine: NewEngine<'_>) -> Result<SearchEngineRecord, StoreError> {
        let name = engine.name.trim();
        if name.is_empty() {
            return Err(StoreError::Invalid("engine name is empty".into()));
        }
        let base_url = engine.base_url.trim().trim_end_matches('/');
        match url::Url::parse(base_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
            _ => {
                return Err(StoreError::Invalid(format!(
                    "engine base URL '{base_url}' is not an http(s) URL"
                )));
            }
        }
        let short_name = match engine.short_name.map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => explicit.to_lowercase(),
            None => engine_key_from_base_url(base_url).ok_or_else(|| {
                StoreError::Invalid(format!("cannot derive engine key from '{base_url}'"))
            })?,
        };
        let group = engine.group.map(str::trim).filter(|g| !g.is_empty());

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO search_engines (name, base_url, short_name, engine_group) \
             VALUES (?1, ?2, ?3, ?4)",
            params![name, base_url, short_name, group],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(id, %short_name, "search engine registered");

        Ok(SearchEngineRecord {
            id,
            name: name.to_string(),
            base_url: base_url.to_string(),
            short_name,
            group: group.map(str::to_string),
        })
    }

    pub fn list_engines(&self) -> Result<Vec<SearchEngineRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, base_url, short_name, engine_group FROM search_engines ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_engine)?;

        let mut engines = Vec::new();
        for r in rows {
            engines.push(r?);
        }
        Ok(engines)
    }

    /// Delete a search engine and any keywords left on it.
    ///
    /// # Errors
    ///
    /// [`StoreError::EngineInUse`] while any site or keyword still
    /// references it.
    pub fn delete_engine(&self, id: EngineId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM search_engines WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound(format!("search engine {id}")));
        }

        let users: i64 = tx.query_row(
            "SELECT (SELECT COUNT(*) FROM site_engines WHERE engine_id = ?1) \
                  + (SELECT COUNT(*) FROM keywords WHERE engine_id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if users > 0 {
            return Err(StoreError::EngineInUse(id));
        }

        tx.execute("DELETE FROM search_engines WHERE id = ?1", params![id])?;
        tx.commit()?;
        tracing::debug!(id, "search engine deleted");
        Ok(())
    }

    // ── Sites ────────────────────────────────────────────────────────────

    /// Register a site with no engines or keywords yet.
    pub fn add_site(&self, site: NewSite<'_>) -> Result<Site, StoreError> {
        let name = site.name.trim();
        let url = site.url.trim();
        if url.is_empty() {
            return Err(StoreError::Invalid("site URL is empty".into()));
        }
        let location = match site.location.trim() {
            "" => "all",
            loc => loc,
        };
        let language = match site.language.trim() {
            "" => "en",
            lang => lang,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sites (name, url, location, language) VALUES (?1, ?2, ?3, ?4)",
            params![name, url, location, language],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Site {
            id,
            name: name.to_string(),
            url: url.to_string(),
            location: location.to_string(),
            language: language.to_string(),
            engine_ids: Vec::new(),
        })
    }

    pub fn list_sites(&self) -> Result<Vec<Site>, StoreError> {
        let conn = self.lock()?;
        let ids: Vec<SiteId> = {
            let mut stmt = conn.prepare("SELECT id FROM sites ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            let mut ids = Vec::new();
            for r in rows {
                ids.push(r?);
            }
            ids
        };

        let mut sites = Vec::with_capacity(ids.len());
        for id in ids {
            sites.push(load_site(&conn, id)?);
        }
        Ok(sites)
    }

    /// Delete a site together with its keywords and their rank history.
    pub fn delete_site(&self, id: SiteId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM sites WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("site {id}")));
        }
        tracing::debug!(id, "site deleted");
        Ok(())
    }

    /// Replace a site's engine set and apply a keyword diff in one transaction.
    ///
    /// Removed keywords take their rank history with them. Additions that
    /// already exist are ignored.
    pub fn apply_keyword_sync(
        &self,
        site_id: SiteId,
        engine_ids: &[EngineId],
        add: &[(EngineId, String)],
        remove: &[KeywordId],
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sites WHERE id = ?1)",
            params![site_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound(format!("site {site_id}")));
        }
        for engine_id in engine_ids {
            let known: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM search_engines WHERE id = ?1)",
                params![engine_id],
                |row| row.get(0),
            )?;
            if !known {
                return Err(StoreError::NotFound(format!("search engine {engine_id}")));
            }
        }

        tx.execute("DELETE FROM site_engines WHERE site_id = ?1", params![site_id])?;
        for engine_id in engine_ids {
            tx.execute(
                "INSERT OR IGNORE INTO site_engines (site_id, engine_id) VALUES (?1, ?2)",
                params![site_id, engine_id],
            )?;
        }
        for keyword_id in remove {
            tx.execute(
                "DELETE FROM keywords WHERE id = ?1 AND site_id = ?2",
                params![keyword_id, site_id],
            )?;
        }
        for (engine_id, text) in add {
            tx.execute(
                "INSERT OR IGNORE INTO keywords (keyword, site_id, engine_id) VALUES (?1, ?2, ?3)",
                params![text, site_id, engine_id],
            )?;
        }

        tx.commit()?;
        tracing::debug!(
            site_id,
            added = add.len(),
            removed = remove.len(),
            "site keywords synchronised"
        );
        Ok(())
    }

    // ── Keywords ─────────────────────────────────────────────────────────

    /// Track `text` for a site on one engine, linking the engine to the
    /// site if it was not already.
    pub fn add_keyword(
        &self,
        site_id: SiteId,
        engine_id: EngineId,
        text: &str,
    ) -> Result<Keyword, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::Invalid("keyword text is empty".into()));
        }
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO site_engines (site_id, engine_id) VALUES (?1, ?2)",
            params![site_id, engine_id],
        )?;
        tx.execute(
            "INSERT INTO keywords (keyword, site_id, engine_id) VALUES (?1, ?2, ?3)",
            params![text, site_id, engine_id],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Keyword {
            id,
            text: text.to_string(),
            site_id,
            engine_id,
            rank: 0,
            previous: 0,
            top_rank: 0,
            last_check: None,
        })
    }

    /// Delete a keyword and its rank history.
    pub fn delete_keyword(&self, id: KeywordId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM keywords WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("keyword {id}")));
        }
        Ok(())
    }

    // ── Event log ────────────────────────────────────────────────────────

    pub fn insert_event(
        &self,
        category: &str,
        message: &str,
        severity: Severity,
        at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO event_log (category, message, severity, logged_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                category,
                message,
                severity.as_str(),
                at.format(TIMESTAMP_FORMAT).to_string()
            ],
        )?;
        Ok(())
    }

    /// Most recent event log entries, newest first.
    pub fn list_events(&self, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, category, message, severity, logged_at FROM event_log \
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit_param(Some(limit))], row_to_event)?;

        let mut events = Vec::new();
        for r in rows {
            events.push(r?);
        }
        Ok(events)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl SiteLookup for SqliteStore {
    fn get_site(&self, id: SiteId) -> Result<Site, StoreError> {
        let conn = self.lock()?;
        load_site(&conn, id)
    }
}

impl EngineLookup for SqliteStore {
    fn get_engine(&self, id: EngineId) -> Result<SearchEngineRecord, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, base_url, short_name, engine_group FROM search_engines WHERE id = ?1",
            params![id],
            row_to_engine,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("search engine {id}")))
    }
}

impl KeywordStore for SqliteStore {
    fn get_keyword(&self, id: KeywordId) -> Result<Keyword, StoreError> {
        let conn = self.lock()?;
        load_keyword(&conn, id)
    }

    fn list_keywords(&self, filter: &KeywordFilter) -> Result<Vec<Keyword>, StoreError> {
        let mut sql = format!("SELECT {KEYWORD_COLUMNS} FROM keywords WHERE 1 = 1");
        let mut args: Vec<Value> = Vec::new();
        if let Some(id) = filter.id {
            sql.push_str(" AND id = ?");
            args.push(Value::Integer(id));
        }
        if let Some(site_id) = filter.site_id {
            sql.push_str(" AND site_id = ?");
            args.push(Value::Integer(site_id));
        }
        if let Some(engine_id) = filter.engine_id {
            sql.push_str(" AND engine_id = ?");
            args.push(Value::Integer(engine_id));
        }
        sql.push_str(" ORDER BY id");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_keyword)?;

        // SQLite's LOWER() only folds ASCII, so text matching happens here.
        let needle = filter
            .text
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        let mut keywords = Vec::new();
        for r in rows {
            let keyword = r?;
            if let Some(ref needle) = needle {
                if !keyword.text.to_lowercase().contains(needle.as_str()) {
                    continue;
                }
            }
            if let Some(today) = filter.due_on {
                if !is_due(keyword.last_check, today) {
                    continue;
                }
            }
            keywords.push(keyword);
        }
        Ok(keywords)
    }

    fn update_keyword(&self, keyword: &Keyword) -> Result<(), StoreError> {
        let text = keyword.text.trim();
        if text.is_empty() {
            return Err(StoreError::Invalid("keyword text is empty".into()));
        }
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE keywords SET keyword = ?1, rank = ?2, previous = ?3, top_rank = ?4, \
             last_check = ?5 WHERE id = ?6",
            params![
                text,
                keyword.rank,
                keyword.previous,
                keyword.top_rank,
                keyword
                    .last_check
                    .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
                keyword.id
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("keyword {}", keyword.id)));
        }
        Ok(())
    }
}

impl RankingHistoryStore for SqliteStore {
    fn append_record(
        &self,
        keyword_id: KeywordId,
        rank: u32,
        rank_link: &str,
        observed_at: NaiveDateTime,
    ) -> Result<RankingRecord, StoreError> {
        let conn = self.lock()?;
        // Fails with NotFound before the foreign key does.
        load_keyword(&conn, keyword_id)?;
        insert_record(&conn, keyword_id, rank, rank_link, observed_at)
    }

    fn list_records(
        &self,
        keyword_id: KeywordId,
        order: RecordOrder,
        limit: Option<usize>,
    ) -> Result<Vec<RankingRecord>, StoreError> {
        let sql = match order {
            RecordOrder::NewestFirst => {
                "SELECT id, keyword_id, rank, rank_link, time FROM ranks \
                 WHERE keyword_id = ?1 ORDER BY time DESC, id DESC LIMIT ?2"
            }
            RecordOrder::OldestFirst => {
                "SELECT id, keyword_id, rank, rank_link, time FROM ranks \
                 WHERE keyword_id = ?1 ORDER BY time ASC, id ASC LIMIT ?2"
            }
        };
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![keyword_id, limit_param(limit)], row_to_record)?;

        let mut records = Vec::new();
        for r in rows {
            records.push(r?);
        }
        Ok(records)
    }

    fn delete_records(&self, keyword_id: KeywordId) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM ranks WHERE keyword_id = ?1", params![keyword_id])?)
    }
}

impl RankLedger for SqliteStore {
    fn record_rank(
        &self,
        keyword_id: KeywordId,
        rank: u32,
        rank_link: &str,
        observed_at: NaiveDateTime,
    ) -> Result<(Keyword, RankingRecord), StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut keyword = load_keyword(&tx, keyword_id)?;
        let next = keyword.state().advance(rank);
        tx.execute(
            "UPDATE keywords SET rank = ?1, previous = ?2, top_rank = ?3, last_check = ?4 \
             WHERE id = ?5",
            params![
                next.rank,
                next.previous,
                next.top_rank,
                observed_at.format(TIMESTAMP_FORMAT).to_string(),
                keyword_id
            ],
        )?;
        let record = insert_record(&tx, keyword_id, rank, rank_link, observed_at)?;
        tx.commit()?;

        keyword.rank = next.rank;
        keyword.previous = next.previous;
        keyword.top_rank = next.top_rank;
        keyword.last_check = Some(observed_at);
        Ok((keyword, record))
    }
}

impl EventSink for SqliteStore {
    fn log(&self, category: &str, message: &str, severity: Severity, at: NaiveDateTime) {
        TracingSink.log(category, message, severity, at);
        if let Err(e) = self.insert_event(category, message, severity, at) {
            tracing::warn!(error = %e, %category, "failed to persist event log entry");
        }
    }
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

fn load_site(conn: &Connection, id: SiteId) -> Result<Site, StoreError> {
    let mut site = conn
        .query_row(
            "SELECT id, name, url, location, language FROM sites WHERE id = ?1",
            params![id],
            |row| {
                Ok(Site {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                    location: row.get(3)?,
                    language: row.get(4)?,
                    engine_ids: Vec::new(),
                })
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("site {id}")))?;

    let mut stmt =
        conn.prepare("SELECT engine_id FROM site_engines WHERE site_id = ?1 ORDER BY engine_id")?;
    let rows = stmt.query_map(params![id], |row| row.get(0))?;
    for r in rows {
        site.engine_ids.push(r?);
    }
    Ok(site)
}

fn load_keyword(conn: &Connection, id: KeywordId) -> Result<Keyword, StoreError> {
    conn.query_row(
        &format!("SELECT {KEYWORD_COLUMNS} FROM keywords WHERE id = ?1"),
        params![id],
        row_to_keyword,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("keyword {id}")))
}

fn insert_record(
    conn: &Connection,
    keyword_id: KeywordId,
    rank: u32,
    rank_link: &str,
    observed_at: NaiveDateTime,
) -> Result<RankingRecord, StoreError> {
    conn.execute(
        "INSERT INTO ranks (keyword_id, rank, rank_link, time) VALUES (?1, ?2, ?3, ?4)",
        params![
            keyword_id,
            rank,
            rank_link,
            observed_at.format(TIMESTAMP_FORMAT).to_string()
        ],
    )?;
    Ok(RankingRecord {
        id: conn.last_insert_rowid(),
        keyword_id,
        rank,
        rank_link: rank_link.to_string(),
        observed_at,
    })
}

/// SQLite treats a negative LIMIT as "no limit".
fn limit_param(limit: Option<usize>) -> i64 {
    limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1)
}

fn parse_timestamp(col: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_engine(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchEngineRecord> {
    Ok(SearchEngineRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        base_url: row.get(2)?,
        short_name: row.get(3)?,
        group: row.get(4)?,
    })
}

fn row_to_keyword(row: &rusqlite::Row<'_>) -> rusqlite::Result<Keyword> {
    let last_check: Option<String> = row.get(7)?;
    Ok(Keyword {
        id: row.get(0)?,
        text: row.get(1)?,
        site_id: row.get(2)?,
        engine_id: row.get(3)?,
        rank: row.get(4)?,
        previous: row.get(5)?,
        top_rank: row.get(6)?,
        last_check: last_check
            .as_deref()
            .map(|raw| parse_timestamp(7, raw))
            .transpose()?,
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RankingRecord> {
    let time: String = row.get(4)?;
    Ok(RankingRecord {
        id: row.get(0)?,
        keyword_id: row.get(1)?,
        rank: row.get(2)?,
        rank_link: row.get(3)?,
        observed_at: parse_timestamp(4, &time)?,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRecord> {
    let severity: String = row.get(3)?;
    let logged_at: String = row.get(4)?;
    Ok(EventRecord {
        id: row.get(0)?,
        category: row.get(1)?,
        message: row.get(2)?,
        severity: Severity::parse(&severity).unwrap_or(Severity::Event),
        logged_at: parse_timestamp(4, &logged_at)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
