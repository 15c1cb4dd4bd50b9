//! Periodic stabilization.
//!
//! Each tick runs, in order:
//! 1. Record the aggregated price (memory and database)
//! 2. Attempt a rebase (the controller enforces the cooldown)
//! 3. Persist the outcome and controller state
//! 4. Broadcast queued events
//! 5. Prune old price observations

use std::time::Duration;

use rusqlite::Connection;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use ballast_db::queries::{prices, rebases, settings};
use ballast_stabilizer::{RebaseOutcome, StabilizerError};
use ballast_types::{AggregatedPrice, Timestamp};

use crate::{Controller, DaemonState};

/// Current Unix time in seconds.
pub fn unix_now() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// What a single tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Price recorded this tick, if any.
    pub recorded: Option<AggregatedPrice>,
    /// Rebase outcome, if the attempt got that far.
    pub outcome: Option<RebaseOutcome>,
}

/// Run ticks forever at the configured interval.
pub async fn run(state: std::sync::Arc<DaemonState>) {
    let period = Duration::from_secs(state.config.advanced.tick_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = period.as_secs(), "Scheduler started");

    loop {
        interval.tick().await;
        let report = tick(&state, unix_now()).await;
        match &report.outcome {
            Some(RebaseOutcome::Applied { record }) => info!(
                supply_delta = %record.supply_delta,
                new_supply = %record.new_supply,
                band = record.band,
                "Rebase applied"
            ),
            Some(RebaseOutcome::CircuitBreakerTriggered { record }) => {
                warn!(band = record.band, "Rebase halted by circuit breaker")
            }
            _ => debug!(recorded = report.recorded.is_some(), "Tick complete"),
        }
    }
}

/// Run one tick at `now`.
pub async fn tick(state: &DaemonState, now: Timestamp) -> TickReport {
    let mut report = TickReport::default();

    // 1. Record price
    let recorded = state.oracle_write().and_then(|mut oracle| {
        let emergency = oracle.is_emergency_mode();
        oracle.record_price(now).map(|price| (price, emergency))
    });
    match recorded {
        Ok((price, false)) => {
            let db = state.db.lock().await;
            if let Err(e) = prices::insert(&db, now, &price) {
                error!("Failed to store price observation: {}", e);
            }
            report.recorded = Some(price);
        }
        Ok((_, true)) => debug!("emergency mode: price not recorded"),
        Err(e) => debug!(error = %e, "no price recorded this tick"),
    }

    // 2-3. Rebase and persist
    {
        let mut controller = state.controller.lock().await;
        match controller.rebase(now) {
            Ok(outcome) => {
                if let RebaseOutcome::CooldownActive { next_allowed } = outcome {
                    debug!(next_allowed, "rebase cooldown active");
                } else {
                    let db = state.db.lock().await;
                    if let Err(e) = persist_outcome(&db, &controller, &outcome) {
                        error!("Failed to persist rebase outcome: {}", e);
                    }
                }
                report.outcome = Some(outcome);
            }
            Err(StabilizerError::Paused) => debug!("stabilizer paused"),
            Err(e) => warn!(error = %e, "rebase attempt failed"),
        }

        // 4. Events
        state.flush_oracle_events();
        state.flush_controller_events(&mut controller);
    }

    // 5. Prune
    let cutoff = now.saturating_sub(state.config.advanced.price_retention_secs);
    let db = state.db.lock().await;
    if let Err(e) = prices::prune_before(&db, cutoff) {
        error!("Failed to prune price observations: {}", e);
    }

    report
}

/// Store the outcome's record (if any) and the controller state.
pub fn persist_outcome(
    conn: &Connection,
    controller: &Controller,
    outcome: &RebaseOutcome,
) -> ballast_db::Result<()> {
    if let Some(record) = outcome.record() {
        rebases::insert(conn, record)?;
    }
    persist_state(conn, controller)
}

/// Store the controller state and token supply.
pub fn persist_state(conn: &Connection, controller: &Controller) -> ballast_db::Result<()> {
    settings::set_json(conn, settings::CONTROLLER_STATE_KEY, &controller.state())?;
    settings::set_json(conn, settings::TOKEN_STATE_KEY, controller.token())
}
