//! Durable job persistence (C6): a single SQLite file in WAL mode with
//! foreign keys enforced, migrated forward, wrapping a sequenced job queue.

mod migrations;
mod models;
mod store;

pub use models::{Job, JobStatus, NewJob};
pub use store::JobStore;

use rusqlite::Connection;
use std::path::Path;

/// Opens (creating if absent) the SQLite-backed job store at `path`,
/// applying pending migrations before handing back the connection.
pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// In-memory store, for tests.
#[cfg(test)]
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}
