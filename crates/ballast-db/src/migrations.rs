//! Forward-only schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Bring the schema up to [`SCHEMA_VERSION`]. Returns the resulting version.
///
/// # Errors
///
/// - [`DbError::Migration`] if the database was written by a newer build
pub fn run(conn: &Connection) -> Result<u32> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    match found {
        0 => {
            tracing::info!(version = SCHEMA_VERSION, "creating database schema");
            conn.execute_batch(schema::SCHEMA_V1)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        v if v > SCHEMA_VERSION => {
            return Err(DbError::Migration(format!(
                "schema version {v} is newer than supported {SCHEMA_VERSION}"
            )));
        }
        v => {
            for next in (v + 1)..=SCHEMA_VERSION {
                tracing::info!(from = next - 1, to = next, "migrating database schema");
                upgrade_to(conn, next)?;
                conn.pragma_update(None, "user_version", next)?;
            }
        }
    }

    Ok(SCHEMA_VERSION)
}

/// Steps from `version - 1` to `version`. Version 1 is created directly.
fn upgrade_to(_conn: &Connection, version: u32) -> Result<()> {
    Err(DbError::Migration(format!("no upgrade path to schema v{version}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_migration() {
        let conn = Connection::open_in_memory().expect("open");
        run(&conn).expect("migrate");

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("version");
        assert_eq!(version, SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('rebase_history', 'price_observations', 'settings')",
                [],
                |row| row.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().expect("open");
        assert_eq!(run(&conn).expect("first run"), SCHEMA_VERSION);
        assert_eq!(run(&conn).expect("second run"), SCHEMA_VERSION);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().expect("open");
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .expect("set version");
        assert!(matches!(run(&conn), Err(DbError::Migration(_))));
    }
}
