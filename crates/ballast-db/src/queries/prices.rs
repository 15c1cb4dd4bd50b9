//! Recorded aggregate price queries.

use rusqlite::Connection;
use serde::Serialize;

use ballast_types::{AggregatedPrice, Timestamp};

use crate::{parse_int, Result};

/// A stored aggregate price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceObservationRow {
    pub recorded_at: Timestamp,
    pub price: AggregatedPrice,
}

pub fn insert(conn: &Connection, recorded_at: Timestamp, price: &AggregatedPrice) -> Result<()> {
    conn.execute(
        "INSERT INTO price_observations (recorded_at, price, source_timestamp, confidence)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            recorded_at as i64,
            price.price.to_string(),
            price.timestamp as i64,
            price.confidence,
        ],
    )?;
    Ok(())
}

/// The newest `limit` observations, oldest first.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<PriceObservationRow>> {
    let mut stmt = conn.prepare(
        "SELECT recorded_at, price, source_timestamp, confidence FROM (
             SELECT id, recorded_at, price, source_timestamp, confidence
             FROM price_observations ORDER BY id DESC LIMIT ?1
         ) ORDER BY id ASC",
    )?;
    let raw = stmt
        .query_map([limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, u8>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raw.into_iter()
        .map(|(recorded_at, price, timestamp, confidence)| {
            Ok(PriceObservationRow {
                recorded_at: recorded_at as u64,
                price: AggregatedPrice {
                    price: parse_int("price", &price)?,
                    timestamp: timestamp as u64,
                    confidence,
                },
            })
        })
        .collect()
}

/// Delete observations recorded before `cutoff`. Returns the number removed.
pub fn prune_before(conn: &Connection, cutoff: Timestamp) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM price_observations WHERE recorded_at < ?1",
        [cutoff as i64],
    )?;
    if removed > 0 {
        tracing::debug!(removed, cutoff, "pruned price observations");
    }
    Ok(removed)
}
