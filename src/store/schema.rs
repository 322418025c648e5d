//! SQLite DDL definitions for the rank store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

/// Schema version stamped into fresh databases.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Complete DDL for the rank database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- Enable WAL mode for concurrent reads during writes.
PRAGMA journal_mode = WAL;

-- Enforce foreign key constraints (cascading deletes depend on this).
PRAGMA foreign_keys = ON;

-- Schema version tracking.
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS search_engines (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL,
    base_url     TEXT NOT NULL,
    short_name   TEXT NOT NULL,      -- strategy registry key
    engine_group TEXT
);

CREATE TABLE IF NOT EXISTS sites (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL,
    url      TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT 'all',
    language TEXT NOT NULL DEFAULT 'en'
);

-- Engines a site is ranked on. RESTRICT backs the engine removal guard.
CREATE TABLE IF NOT EXISTS site_engines (
    site_id   INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    engine_id INTEGER NOT NULL REFERENCES search_engines(id) ON DELETE RESTRICT,
    PRIMARY KEY (site_id, engine_id)
);

CREATE TABLE IF NOT EXISTS keywords (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    keyword    TEXT NOT NULL,
    site_id    INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    engine_id  INTEGER NOT NULL REFERENCES search_engines(id) ON DELETE CASCADE,
    rank       INTEGER NOT NULL DEFAULT 0,
    previous   INTEGER NOT NULL DEFAULT 0,
    top_rank   INTEGER NOT NULL DEFAULT 0,
    last_check TEXT,                 -- 'YYYY-MM-DD HH:MM:SS', NULL = never
    UNIQUE (site_id, engine_id, keyword)
);

CREATE INDEX IF NOT EXISTS idx_keywords_site   ON keywords(site_id);
CREATE INDEX IF NOT EXISTS idx_keywords_engine ON keywords(engine_id);

-- Append-only rank history.
CREATE TABLE IF NOT EXISTS ranks (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    keyword_id INTEGER NOT NULL REFERENCES keywords(id) ON DELETE CASCADE,
    rank       INTEGER NOT NULL,
    rank_link  TEXT NOT NULL DEFAULT '',
    time       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ranks_keyword ON ranks(keyword_id, time);

CREATE TABLE IF NOT EXISTS event_log (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    category  TEXT NOT NULL,
    message   TEXT NOT NULL,
    severity  TEXT NOT NULL,         -- debug | event | error
    logged_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_event_log_at ON event_log(logged_at);
"#;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times: all statements use `IF NOT EXISTS`.
/// Inserts the current schema version into `schema_meta` if not already
/// present.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Read the current schema version from the database.
///
/// Returns `None` if the `schema_meta` table is empty or the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare")
            .query_map([], |row| row.get(0))
            .expect("query")
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn apply_schema_creates_tables() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("first apply_schema");

        let tables = table_names(&conn);
        for expected in [
            "event_log",
            "keywords",
            "ranks",
            "schema_meta",
            "search_engines",
            "site_engines",
            "sites",
        ] {
            assert!(tables.contains(&expected.to_owned()), "missing {expected}");
        }
    }

    #[test]
    fn apply_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("first apply_schema");
        apply_schema(&conn).expect("second apply_schema");
        assert_eq!(
            read_schema_version(&conn).expect("read version"),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("apply_schema");
        let result = conn.execute(
            "INSERT INTO ranks (keyword_id, rank, rank_link, time) VALUES (999, 1, '', '2024-01-01 00:00:00')",
            [],
        );
        assert!(result.is_err());
    }
}
