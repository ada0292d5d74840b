//! Forward-only schema migrations (§10.4).

use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 2;

const SCHEMA_V1: &str = r#"
CREATE TABLE jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    library_book_id INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    voice TEXT NOT NULL,
    source_path TEXT NOT NULL,
    series TEXT,
    series_index REAL,
    status TEXT NOT NULL CHECK (status IN ('pending','extracting','synthesizing','building','complete','failed')),
    chapters_total INTEGER NOT NULL DEFAULT 0,
    chapters_done INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    output_path TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    started_at TEXT,
    completed_at TEXT
);

CREATE TABLE settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE schema_version (
    version INTEGER NOT NULL
);
"#;

const SCHEMA_V2: &str = r#"
CREATE TABLE jobs_new (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    library_book_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    voice TEXT NOT NULL,
    source_path TEXT NOT NULL,
    series TEXT,
    series_index REAL,
    status TEXT NOT NULL CHECK (status IN ('pending','extracting','synthesizing','building','complete','failed')),
    chapters_total INTEGER NOT NULL DEFAULT 0,
    chapters_done INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    output_path TEXT,
    queue_position INTEGER,
    duration_seconds INTEGER,
    file_size_bytes INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    started_at TEXT,
    completed_at TEXT
);

INSERT INTO jobs_new (id, library_book_id, title, author, voice, source_path, series, series_index,
                      status, chapters_total, chapters_done, error_message, output_path,
                      created_at, started_at, completed_at)
SELECT id, library_book_id, title, author, voice, source_path, series, series_index,
       status, chapters_total, chapters_done, error_message, output_path,
       created_at, started_at, completed_at
FROM jobs;

DROP TABLE jobs;
ALTER TABLE jobs_new RENAME TO jobs;
"#;

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let version = current_version(conn)?;

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }
    if version < 2 {
        conn.execute_batch(SCHEMA_V2)?;
        conn.execute("UPDATE schema_version SET version = 2", [])?;
    }
    Ok(())
}

fn current_version(conn: &Connection) -> rusqlite::Result<i64> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if !exists {
        return Ok(0);
    }
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
}
