//! Stabilizer command handlers.

use std::sync::Arc;

use serde_json::{json, Value};

use ballast_db::queries::rebases;
use ballast_stabilizer::{RebaseOutcome, RebaseToken};
use ballast_types::RebaseRecord;

use super::{caller, opt_u64_param, wad, Result};
use crate::scheduler::{persist_outcome, persist_state, unix_now};
use crate::DaemonState;

const DEFAULT_HISTORY_LIMIT: u64 = 50;
const MAX_HISTORY_LIMIT: u64 = 1_000;

fn record_json(record: &RebaseRecord) -> Value {
    json!({
        "timestamp": record.timestamp,
        "price": wad(record.price),
        "supply_delta": record.supply_delta.to_string(),
        "new_supply": record.new_supply.to_string(),
        "band": record.band,
        "deviation": wad(record.deviation),
        "circuit_breaker_triggered": record.circuit_breaker_triggered,
    })
}

fn outcome_name(outcome: &RebaseOutcome) -> &'static str {
    match outcome {
        RebaseOutcome::Applied { .. } => "applied",
        RebaseOutcome::NoChange { .. } => "no_change",
        RebaseOutcome::CircuitBreakerTriggered { .. } => "circuit_breaker_triggered",
        RebaseOutcome::CircuitBreakerHeld => "circuit_breaker_held",
        RebaseOutcome::CooldownActive { .. } => "cooldown_active",
    }
}

/// Controller state, supply, cooldown and bands.
pub async fn get_stabilizer_status(state: &Arc<DaemonState>) -> Result {
    let now = unix_now();
    let controller = state.controller.lock().await;
    let status = controller.status(now);
    let breaker = controller.circuit_breaker();

    let bands: Vec<Value> = controller
        .bands()
        .iter()
        .map(|b| {
            json!({
                "threshold": wad(b.threshold),
                "damping_factor": wad(b.damping_factor),
                "max_rebase_amount": wad(b.max_rebase_amount),
                "min_cooldown": b.min_cooldown,
            })
        })
        .collect();

    Ok(json!({
        "paused": status.state.paused,
        "total_supply": status.total_supply.to_string(),
        "rebase_count": status.state.rebase_count,
        "last_rebase_time": status.state.last_rebase_time,
        "last_deviation": status.last_deviation.map(wad),
        "cooldown": status.cooldown,
        "dynamic_cooldown": status.dynamic_cooldown,
        "next_rebase_at": status.next_rebase_at,
        "history_len": status.history_len,
        "circuit_breaker": {
            "active": breaker.is_active(),
            "activated_at": breaker.activated_at(),
            "recovery_not_before": breaker.recovery_not_before(),
            "consecutive_rebases": breaker.consecutive_rebases(),
        },
        "bands": bands,
    }))
}

pub async fn can_rebase(state: &Arc<DaemonState>) -> Result {
    let now = unix_now();
    let controller = state.controller.lock().await;
    Ok(json!({
        "can_rebase": controller.can_rebase(now),
        "next_rebase_at": controller.next_rebase_at(now),
    }))
}

/// Attempt a rebase immediately. Anyone may call; the controller enforces
/// the cooldown.
pub async fn rebase_now(state: &Arc<DaemonState>) -> Result {
    let now = unix_now();
    let mut controller = state.controller.lock().await;
    let result = controller.rebase(now);
    state.flush_oracle_events();
    state.flush_controller_events(&mut controller);
    let outcome = result?;

    {
        let db = state.db.lock().await;
        persist_outcome(&db, &controller, &outcome)?;
    }

    Ok(json!({
        "outcome": outcome_name(&outcome),
        "supply_delta": outcome.supply_delta().to_string(),
        "record": outcome.record().map(record_json),
        "total_supply": controller.token().total_supply().to_string(),
    }))
}

pub async fn reset_circuit_breaker(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = caller(params)?;
    let mut controller = state.controller.lock().await;
    controller.reset_circuit_breaker(caller, unix_now())?;
    state.flush_controller_events(&mut controller);

    let db = state.db.lock().await;
    persist_state(&db, &controller)?;
    Ok(json!({ "reset": true }))
}

pub async fn pause(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = caller(params)?;
    let mut controller = state.controller.lock().await;
    controller.pause(caller, unix_now())?;
    state.flush_controller_events(&mut controller);

    let db = state.db.lock().await;
    persist_state(&db, &controller)?;
    Ok(json!({ "paused": true }))
}

pub async fn unpause(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = caller(params)?;
    let mut controller = state.controller.lock().await;
    controller.unpause(caller, unix_now())?;
    state.flush_controller_events(&mut controller);

    let db = state.db.lock().await;
    persist_state(&db, &controller)?;
    Ok(json!({ "paused": false }))
}

/// Stored rebase records, oldest first. Either a `from`/`to` timestamp
/// range (inclusive) or the most recent `limit`.
pub async fn get_rebase_history(state: &Arc<DaemonState>, params: &Value) -> Result {
    let from = opt_u64_param(params, "from");
    let to = opt_u64_param(params, "to");

    let db = state.db.lock().await;
    let records = if from.is_some() || to.is_some() {
        rebases::range(&db, from.unwrap_or(0), to.unwrap_or(i64::MAX as u64))?
    } else {
        let limit = opt_u64_param(params, "limit")
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT) as u32;
        rebases::recent(&db, limit)?
    };

    Ok(json!(records.iter().map(record_json).collect::<Vec<_>>()))
}
