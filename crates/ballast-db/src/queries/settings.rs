//! Key/value settings, including persisted controller state.

use rusqlite::{Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use crate::{DbError, Result};

/// Key under which the stabilizer's runtime state is stored.
pub const CONTROLLER_STATE_KEY: &str = "controller_state";

/// Key under which the token's supply is stored.
pub const TOKEN_STATE_KEY: &str = "token_state";

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Read and deserialize a JSON value.
pub fn get_json<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    match get(conn, key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| DbError::Serialization(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

/// Serialize and store a JSON value.
pub fn set_json<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let raw =
        serde_json::to_string(value).map_err(|e| DbError::Serialization(format!("{key}: {e}")))?;
    set(conn, key, &raw)
}
