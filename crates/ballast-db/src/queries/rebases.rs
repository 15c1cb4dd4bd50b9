//! Rebase history queries.

use rusqlite::{Connection, Row};

use ballast_types::RebaseRecord;

use crate::{parse_int, Result};

const COLUMNS: &str =
    "timestamp, price, supply_delta, new_supply, band, deviation, circuit_breaker_triggered";

/// Append a record. Returns its row id.
pub fn insert(conn: &Connection, record: &RebaseRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO rebase_history
         (timestamp, price, supply_delta, new_supply, band, deviation, circuit_breaker_triggered)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            record.timestamp as i64,
            record.price.to_string(),
            record.supply_delta.to_string(),
            record.new_supply.to_string(),
            record.band,
            record.deviation.to_string(),
            record.circuit_breaker_triggered,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Records with `from <= timestamp <= to`, oldest first.
pub fn range(conn: &Connection, from: u64, to: u64) -> Result<Vec<RebaseRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM rebase_history
         WHERE timestamp >= ?1 AND timestamp <= ?2 ORDER BY id ASC"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![from as i64, to as i64], RawRecord::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(RawRecord::into_record).collect()
}

/// The newest `limit` records, oldest first.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<RebaseRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM (
             SELECT id, {COLUMNS} FROM rebase_history ORDER BY id DESC LIMIT ?1
         ) ORDER BY id ASC"
    ))?;
    let rows = stmt
        .query_map([limit], RawRecord::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(RawRecord::into_record).collect()
}

/// Every record, oldest first.
pub fn all(conn: &Connection) -> Result<Vec<RebaseRecord>> {
    range(conn, 0, i64::MAX as u64)
}

/// Number of stored records.
pub fn count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM rebase_history", [], |row| row.get(0))?;
    Ok(count as u64)
}

struct RawRecord {
    timestamp: i64,
    price: String,
    supply_delta: String,
    new_supply: String,
    band: u8,
    deviation: String,
    circuit_breaker_triggered: bool,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            timestamp: row.get(0)?,
            price: row.get(1)?,
            supply_delta: row.get(2)?,
            new_supply: row.get(3)?,
            band: row.get(4)?,
            deviation: row.get(5)?,
            circuit_breaker_triggered: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<RebaseRecord> {
        Ok(RebaseRecord {
            timestamp: self.timestamp as u64,
            price: parse_int("price", &self.price)?,
            supply_delta: parse_int("supply_delta", &self.supply_delta)?,
            new_supply: parse_int("new_supply", &self.new_supply)?,
            band: self.band,
            deviation: parse_int("deviation", &self.deviation)?,
            circuit_breaker_triggered: self.circuit_breaker_triggered,
        })
    }
}
