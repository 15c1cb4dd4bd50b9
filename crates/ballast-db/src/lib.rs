//! # ballast-db
//!
//! SQLite persistence for the Ballast daemon, stored at
//! `$BALLAST_DATA_DIR/ballast.db`.
//!
//! ## Schema
//!
//! - WAL mode
//! - Append-only `rebase_history` and `price_observations`
//! - `settings` key/value store for controller state
//! - Prices, supplies and deltas are stored as decimal TEXT because they do
//!   not fit in SQLite's 64-bit integers
//! - Schema version stored in `PRAGMA user_version`

pub mod migrations;
pub mod queries;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the database at `path` and run pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    prepare(Connection::open(path)?)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Connection> {
    // In-memory databases stay in "memory" journal mode
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    let version = migrations::run(&conn)?;
    tracing::debug!(version, "database ready");
    Ok(conn)
}

/// Parse a decimal TEXT column into an integer.
pub(crate) fn parse_int<T: std::str::FromStr>(column: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| DbError::Serialization(format!("{column}: invalid integer '{value}'")))
}
