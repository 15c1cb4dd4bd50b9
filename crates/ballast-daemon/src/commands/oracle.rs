//! Oracle command handlers.

use std::sync::Arc;

use serde_json::{json, Value};

use ballast_db::queries::prices;
use ballast_oracle::{OracleError, SourceOutcome};
use ballast_types::fixed::from_bps;

use super::{caller, opt_u64_param, str_param, u64_param, wad, Result};
use crate::config::SourceConfig;
use crate::feeds::build_feed;
use crate::rpc::RpcError;
use crate::scheduler::unix_now;
use crate::DaemonState;

const DEFAULT_HISTORY_LIMIT: u64 = 100;
const MAX_HISTORY_LIMIT: u64 = 1_000;
const DEFAULT_TWAP_WINDOW: u64 = 60 * 60;

/// Current aggregated price.
pub async fn get_aggregated_price(state: &Arc<DaemonState>) -> Result {
    let now = unix_now();
    let oracle = state.oracle_read()?;
    let price = oracle.aggregated_price(now)?;

    Ok(json!({
        "price": wad(price.price),
        "timestamp": price.timestamp,
        "confidence": price.confidence,
        "emergency_mode": oracle.is_emergency_mode(),
    }))
}

/// Health summary and the outcome of reading every active source.
pub async fn get_oracle_health(state: &Arc<DaemonState>) -> Result {
    let now = unix_now();
    let oracle = state.oracle_read()?;

    let sources: Vec<Value> = oracle
        .collect(now)
        .into_iter()
        .map(|outcome| match outcome {
            SourceOutcome::Accepted(valid) => json!({
                "key": valid.key,
                "accepted": true,
                "price": wad(valid.price),
                "updated_at": valid.updated_at,
            }),
            SourceOutcome::Rejected { key, reason } => json!({
                "key": key,
                "accepted": false,
                "reason": reason.to_string(),
            }),
        })
        .collect();

    Ok(json!({
        "healthy": oracle.is_healthy(now),
        "emergency_mode": oracle.is_emergency_mode(),
        "active_sources": oracle.active_source_count(),
        "min_oracles_for_consensus": oracle.config().min_oracles_for_consensus,
        "latest": oracle.latest().map(|p| json!({
            "price": wad(p.price),
            "timestamp": p.timestamp,
            "confidence": p.confidence,
        })),
        "volatility": oracle.recent_volatility().ok().map(wad),
        "sources": sources,
    }))
}

/// Every registered source, active or not.
pub async fn get_sources(state: &Arc<DaemonState>) -> Result {
    let sources = state.oracle_read()?.sources();
    super::to_json(&sources)
}

/// Recorded prices from the database, oldest first.
pub async fn get_price_history(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = opt_u64_param(params, "limit")
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT) as u32;

    let db = state.db.lock().await;
    let rows = prices::recent(&db, limit)?;

    let result: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "recorded_at": row.recorded_at,
                "price": wad(row.price.price),
                "source_timestamp": row.price.timestamp,
                "confidence": row.price.confidence,
            })
        })
        .collect();

    Ok(json!(result))
}

/// Time-weighted average over the in-memory history.
pub async fn get_twap(state: &Arc<DaemonState>, params: &Value) -> Result {
    let window = opt_u64_param(params, "window").unwrap_or(DEFAULT_TWAP_WINDOW);
    let now = unix_now();
    let twap = state.oracle_read()?.twap(now, window)?;

    Ok(json!({
        "twap": wad(twap),
        "window": window,
    }))
}

/// Register a new source. Params follow the `[[oracle.sources]]` config shape.
pub async fn add_source(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = caller(params)?;
    let source: SourceConfig = serde_json::from_value(params.clone())
        .map_err(|e| RpcError::invalid_params(&e.to_string()))?;

    let (handle, fixed) = build_feed(&source.feed);
    state
        .oracle_write()?
        .add_source(caller, source.params(), handle, unix_now())?;
    state.flush_oracle_events();

    if let Some(feed) = fixed {
        state.fixed_feeds.lock().await.insert(source.key.clone(), feed);
    }

    Ok(json!({ "added": source.key }))
}

/// Deactivate a source.
pub async fn remove_source(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = caller(params)?;
    let key = str_param(params, "key")?;

    state.oracle_write()?.remove_source(caller, key, unix_now())?;
    state.flush_oracle_events();

    Ok(json!({ "removed": key }))
}

/// Bring a removed source back.
pub async fn reactivate_source(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = caller(params)?;
    let key = str_param(params, "key")?;

    state
        .oracle_write()?
        .reactivate_source(caller, key, unix_now())?;
    state.flush_oracle_events();

    Ok(json!({ "reactivated": key }))
}

pub async fn update_source_weight(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = caller(params)?;
    let key = str_param(params, "key")?;
    let weight = u32::try_from(u64_param(params, "weight")?)
        .map_err(|_| RpcError::invalid_params("weight out of range"))?;

    state
        .oracle_write()?
        .update_source_weight(caller, key, weight, unix_now())?;
    state.flush_oracle_events();

    Ok(json!({ "key": key, "weight": weight }))
}

/// Enter or leave emergency mode. `fallback_price_bps` optionally replaces
/// the fallback price (10000 = $1.00).
pub async fn set_emergency_mode(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = caller(params)?;
    let enabled = params
        .get("enabled")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| RpcError::invalid_params("enabled required"))?;
    let fallback = match opt_u64_param(params, "fallback_price_bps") {
        Some(bps) => Some(from_bps(
            u32::try_from(bps).map_err(|_| RpcError::invalid_params("fallback_price_bps out of range"))?,
        )),
        None => None,
    };

    state
        .oracle_write()?
        .set_emergency_mode(caller, enabled, fallback, unix_now())?;
    state.flush_oracle_events();

    Ok(json!({ "emergency_mode": enabled }))
}

/// Set the price of a fixed feed (dev only).
pub async fn dev_set_feed_price(state: &Arc<DaemonState>, params: &Value) -> Result {
    if !state.config.advanced.dev_commands {
        return Err(RpcError::dev_commands_disabled());
    }
    let key = str_param(params, "key")?;
    let price = params
        .get("price")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RpcError::invalid_params("price required"))?;

    let feeds = state.fixed_feeds.lock().await;
    let feed = feeds
        .get(key)
        .ok_or_else(|| RpcError::from(OracleError::NotFound(key.to_string())))?;
    feed.set_price(price);

    Ok(json!({ "key": key, "price": price }))
}
