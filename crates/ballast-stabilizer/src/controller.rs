//! The stabilization controller.
//!
//! ## Rebase
//!
//! ```text
//! deviation = |price - target| / target
//! raw       = supply * deviation
//! damped    = raw * band.damping_factor
//! capped    = min(damped, supply * max_rebase_percentage, supply * band.max_rebase_amount)
//! delta     = 0                                   if capped < supply * dust_threshold
//!           = +min(capped, supply * max_change)   if price > target
//!           = -min(capped, supply * max_change)   otherwise
//! ```
//!
//! The token call happens before any bookkeeping, so a rejected supply
//! change leaves the controller exactly as it was and the attempt can be
//! retried.
//!
//! ## History
//!
//! Every attempt that reaches band evaluation appends one record, including
//! zero-delta attempts and breaker trips. Attempts held by the breaker or
//! the cooldown append nothing.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use ballast_oracle::PriceOracle;
use ballast_params::{BandTable, ParameterStrategy, StabilityContext};
use ballast_types::events::{Event, EventType};
use ballast_types::fixed::{mul_wad, relative_deviation, to_signed};
use ballast_types::{
    AdminAction, AggregatedPrice, Authorizer, RebaseRecord, Timestamp, Wad, TARGET_PRICE, WAD,
};

use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerState, DEFAULT_AUTO_RECOVERY_THRESHOLD,
    DEFAULT_BREAKER_COOLDOWN, MAX_CONSECUTIVE_REBASES,
};
use crate::history::RebaseHistory;
use crate::token::RebaseToken;
use crate::{Result, StabilizerError};

/// Maximum number of undrained events kept in the queue.
const MAX_QUEUED_EVENTS: usize = 1024;

const HOUR: u64 = 60 * 60;

/// Band whose threshold gates manual reset and the consecutive-rebase trip.
const SEVERE_BAND: u8 = 3;

/// Controller parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Peg, 18 decimals.
    pub target_price: Wad,
    /// Minimum oracle confidence for a usable reading.
    pub min_confidence: u8,
    /// Maximum age of the aggregated price in seconds.
    pub max_price_age: u64,
    /// Fixed cooldown between rebases, used when no parameter strategy is set.
    ///
    /// This is an operator override: band `min_cooldown` floors are not
    /// applied to it. Attach a strategy to get band-aware cooldowns.
    pub rebase_cooldown: u64,
    /// Global cap on a single adjustment as a fraction of supply.
    pub max_rebase_percentage: Wad,
    /// Final cap applied just before the token call.
    pub max_supply_change_per_rebase: Wad,
    /// Adjustments smaller than this fraction of supply are dropped.
    pub dust_threshold: Wad,
    /// Seconds the breaker stays active before automatic recovery.
    pub breaker_cooldown: u64,
    /// Deviation at or below which the breaker recovers automatically.
    pub auto_recovery_threshold: Wad,
    /// Consecutive severe rebases that trip the breaker.
    pub max_consecutive_rebases: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_price: TARGET_PRICE,
            min_confidence: 60,
            max_price_age: HOUR,
            rebase_cooldown: 12 * HOUR,
            max_rebase_percentage: WAD / 10,
            max_supply_change_per_rebase: WAD / 10,
            dust_threshold: WAD / 10_000,
            breaker_cooldown: DEFAULT_BREAKER_COOLDOWN,
            auto_recovery_threshold: DEFAULT_AUTO_RECOVERY_THRESHOLD,
            max_consecutive_rebases: MAX_CONSECUTIVE_REBASES,
        }
    }
}

impl ControllerConfig {
    /// # Errors
    ///
    /// - [`StabilizerError::InvalidParameter`] naming the offending field
    pub fn validate(&self) -> Result<()> {
        if self.target_price == 0 {
            return Err(invalid("target_price must be positive"));
        }
        if self.min_confidence > 100 {
            return Err(invalid("min_confidence must be at most 100"));
        }
        for (name, value) in [
            ("max_rebase_percentage", self.max_rebase_percentage),
            ("max_supply_change_per_rebase", self.max_supply_change_per_rebase),
        ] {
            if value == 0 || value > WAD {
                return Err(invalid(&format!("{name} must be in (0, 1]")));
            }
        }
        if self.dust_threshold >= WAD {
            return Err(invalid("dust_threshold must be below 1"));
        }
        if self.auto_recovery_threshold >= WAD {
            return Err(invalid("auto_recovery_threshold must be below 1"));
        }
        if self.max_consecutive_rebases == 0 {
            return Err(invalid("max_consecutive_rebases must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> StabilizerError {
    StabilizerError::InvalidParameter(msg.to_string())
}

/// What a call to [`StabilizationController::rebase`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RebaseOutcome {
    /// Supply changed.
    Applied { record: RebaseRecord },
    /// Evaluated but the delta was zero (band 0 or dust).
    NoChange { record: RebaseRecord },
    /// The breaker tripped on this reading; supply unchanged.
    CircuitBreakerTriggered { record: RebaseRecord },
    /// The breaker is active and recovery conditions are not met.
    CircuitBreakerHeld,
    /// The cooldown has not elapsed.
    CooldownActive { next_allowed: Timestamp },
}

impl RebaseOutcome {
    /// The appended history record, if any.
    pub fn record(&self) -> Option<&RebaseRecord> {
        match self {
            Self::Applied { record }
            | Self::NoChange { record }
            | Self::CircuitBreakerTriggered { record } => Some(record),
            Self::CircuitBreakerHeld | Self::CooldownActive { .. } => None,
        }
    }

    /// Signed supply change applied by this call.
    pub fn supply_delta(&self) -> i128 {
        self.record().map_or(0, |r| r.supply_delta)
    }
}

/// Mutable controller state that survives restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub paused: bool,
    pub circuit_breaker: CircuitBreakerState,
    pub last_rebase_time: Option<Timestamp>,
    pub rebase_count: u64,
    /// Deviation of the last accepted observation.
    #[serde(default)]
    pub last_deviation: Option<Wad>,
    /// Start of the current run below the first band threshold.
    #[serde(default)]
    pub stable_since: Option<Timestamp>,
}

/// Point-in-time status report.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub state: ControllerState,
    pub total_supply: u128,
    pub last_deviation: Option<Wad>,
    pub cooldown: u64,
    pub next_rebase_at: Option<Timestamp>,
    pub dynamic_cooldown: bool,
    pub history_len: usize,
}

/// A validated oracle reading.
#[derive(Debug, Clone, Copy)]
struct Observation {
    price: AggregatedPrice,
    deviation: Wad,
    band: u8,
}

/// The supply control loop.
///
/// Every operation takes `now` explicitly; the controller never reads a
/// clock. `rebase` takes `&mut self`, so hosts sharing a controller must
/// serialize calls behind a lock.
pub struct StabilizationController<O, T> {
    config: ControllerConfig,
    bands: BandTable,
    oracle: O,
    token: T,
    authorizer: Arc<dyn Authorizer>,
    strategy: Option<Arc<dyn ParameterStrategy>>,
    breaker: CircuitBreaker,
    history: RebaseHistory,
    paused: bool,
    last_rebase_time: Option<Timestamp>,
    rebase_count: u64,
    last_deviation: Option<Wad>,
    stable_since: Option<Timestamp>,
    events: VecDeque<Event>,
}

impl<O: PriceOracle, T: RebaseToken> StabilizationController<O, T> {
    /// # Errors
    ///
    /// - [`StabilizerError::InvalidParameter`] if `config` is inconsistent
    pub fn new(
        config: ControllerConfig,
        bands: BandTable,
        oracle: O,
        token: T,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self> {
        config.validate()?;
        let breaker = CircuitBreaker::new(
            config.breaker_cooldown,
            config.auto_recovery_threshold,
            config.max_consecutive_rebases,
        );
        Ok(Self {
            config,
            bands,
            oracle,
            token,
            authorizer,
            strategy: None,
            breaker,
            history: RebaseHistory::new(),
            paused: false,
            last_rebase_time: None,
            rebase_count: 0,
            last_deviation: None,
            stable_since: None,
            events: VecDeque::new(),
        })
    }

    /// Take cooldowns from `strategy` instead of the fixed `rebase_cooldown`.
    pub fn with_strategy(mut self, strategy: Arc<dyn ParameterStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Reload persisted state and history.
    pub fn restore(&mut self, state: ControllerState, records: Vec<RebaseRecord>) {
        self.paused = state.paused;
        self.breaker.restore(state.circuit_breaker);
        self.last_rebase_time = state.last_rebase_time;
        self.rebase_count = state.rebase_count;
        self.last_deviation = state.last_deviation;
        self.stable_since = state.stable_since;
        self.history = RebaseHistory::from(records);
        tracing::info!(
            paused = state.paused,
            breaker_active = state.circuit_breaker.active,
            rebase_count = state.rebase_count,
            records = self.history.len(),
            "stabilizer state restored"
        );
    }

    // ------------------------------------------------------------------
    // Rebase loop
    // ------------------------------------------------------------------

    /// Run one stabilization step.
    ///
    /// Oracle failures return an error without touching any state. While the
    /// breaker is active, the call only re-evaluates automatic recovery.
    ///
    /// # Errors
    ///
    /// - [`StabilizerError::Paused`]
    /// - [`StabilizerError::OracleUnhealthy`], [`StabilizerError::OracleValidationFailed`]
    /// - [`StabilizerError::Token`] if the supply change is rejected
    /// - [`StabilizerError::ArithmeticOverflow`]
    pub fn rebase(&mut self, now: Timestamp) -> Result<RebaseOutcome> {
        if self.paused {
            return Err(StabilizerError::Paused);
        }

        let observation = if self.breaker.is_active() {
            let observation = match self.observe(now) {
                Ok(observation) => observation,
                Err(e) => {
                    tracing::debug!(error = %e, "circuit breaker held: no usable price");
                    return Ok(RebaseOutcome::CircuitBreakerHeld);
                }
            };
            self.note_deviation(now, observation.deviation);
            if !self.breaker.recovery_due(now, observation.deviation) {
                tracing::debug!(deviation = observation.deviation, "circuit breaker held");
                return Ok(RebaseOutcome::CircuitBreakerHeld);
            }
            self.breaker.recover(observation.deviation);
            self.emit(
                EventType::CircuitBreakerRecovered,
                now,
                json!({ "deviation": observation.deviation.to_string() }),
            );
            observation
        } else {
            if let Some(next_allowed) = self.next_rebase_at(now) {
                if now < next_allowed {
                    tracing::trace!(next_allowed, "rebase skipped: cooldown active");
                    return Ok(RebaseOutcome::CooldownActive { next_allowed });
                }
            }
            let observation = self.observe(now)?;
            self.note_deviation(now, observation.deviation);
            observation
        };

        self.execute(now, observation).map_err(|e| {
            if matches!(
                e,
                StabilizerError::ArithmeticOverflow(_) | StabilizerError::Token(_)
            ) {
                tracing::error!(error = %e, "rebase failed");
            }
            e
        })
    }

    /// Whether a call to [`rebase`](Self::rebase) could change supply now.
    ///
    /// With the breaker active this takes a fresh oracle reading; any read
    /// failure yields `false`.
    pub fn can_rebase(&self, now: Timestamp) -> bool {
        if self.paused {
            return false;
        }
        if self.breaker.is_active() {
            return self
                .observe(now)
                .map(|o| self.breaker.recovery_due(now, o.deviation))
                .unwrap_or(false);
        }
        self.next_rebase_at(now).map_or(true, |next| now >= next)
    }

    /// Cooldown currently in force, in seconds.
    ///
    /// Without a strategy this is the fixed `rebase_cooldown`, independent of
    /// the band of the last deviation.
    pub fn current_cooldown(&self, now: Timestamp) -> u64 {
        let Some(strategy) = &self.strategy else {
            return self.config.rebase_cooldown;
        };
        let deviation = self.last_deviation.unwrap_or(0);
        let volatility = self.oracle.recent_volatility().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "volatility unavailable, assuming calm");
            0
        });
        let context = StabilityContext {
            stable_duration: self.stable_since.map_or(0, |since| now.saturating_sub(since)),
            consecutive_rebases: self.breaker.consecutive_rebases(),
        };
        strategy
            .calculate_dynamic_cooldown(deviation, volatility, &context)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "dynamic cooldown failed, using fixed cooldown");
                self.config.rebase_cooldown
            })
    }

    /// Earliest time the next supply change is allowed, if one has happened.
    pub fn next_rebase_at(&self, now: Timestamp) -> Option<Timestamp> {
        self.last_rebase_time
            .map(|last| last.saturating_add(self.current_cooldown(now)))
    }

    fn observe(&self, now: Timestamp) -> Result<Observation> {
        // One aggregation pass per observation
        let price = self.oracle.healthy_price(now).map_err(|e| {
            tracing::debug!(error = %e, "oracle unhealthy");
            StabilizerError::OracleUnhealthy
        })?;
        if price.confidence < self.config.min_confidence {
            return Err(StabilizerError::OracleValidationFailed(format!(
                "confidence {} below {}",
                price.confidence, self.config.min_confidence
            )));
        }
        let age = price.age(now);
        if age > self.config.max_price_age {
            return Err(StabilizerError::OracleValidationFailed(format!(
                "price age {age}s exceeds {}s",
                self.config.max_price_age
            )));
        }

        let deviation = relative_deviation(price.price, self.config.target_price)?;
        Ok(Observation {
            price,
            deviation,
            band: self.bands.classify(deviation),
        })
    }

    fn note_deviation(&mut self, now: Timestamp, deviation: Wad) {
        self.last_deviation = Some(deviation);
        if deviation >= self.bands.threshold_or_top(1) {
            self.stable_since = None;
        } else if self.stable_since.is_none() {
            self.stable_since = Some(now);
        }
    }

    fn execute(&mut self, now: Timestamp, observation: Observation) -> Result<RebaseOutcome> {
        let supply = self.token.total_supply();

        if observation.deviation >= self.bands.top().threshold {
            self.breaker.activate(now, observation.deviation);
            let record = self.append_record(now, &observation, 0, supply, true);
            self.emit_breaker_activated(now, &observation, "deviation");
            return Ok(RebaseOutcome::CircuitBreakerTriggered { record });
        }

        let delta = self.compute_delta(supply, &observation)?;
        let new_supply = if delta != 0 {
            let new_supply = self.token.rebase(delta)?;
            self.last_rebase_time = Some(now);
            self.rebase_count += 1;
            self.breaker.record_rebase();
            new_supply
        } else {
            supply
        };

        if observation.deviation < self.bands.threshold_or_top(1) {
            self.breaker.reset_consecutive();
        }

        let severe = self.bands.threshold_or_top(SEVERE_BAND);
        let triggered = self
            .breaker
            .consecutive_limit_reached(observation.deviation, severe);
        if triggered {
            self.breaker.activate(now, observation.deviation);
        }

        let record = self.append_record(now, &observation, delta, new_supply, triggered);
        if triggered {
            self.emit_breaker_activated(now, &observation, "consecutive_rebases");
        }

        if delta == 0 {
            tracing::debug!(
                band = observation.band,
                deviation = observation.deviation,
                "rebase evaluated: no supply change"
            );
            return Ok(RebaseOutcome::NoChange { record });
        }

        tracing::info!(
            band = observation.band,
            deviation = observation.deviation,
            delta,
            new_supply,
            "rebase applied"
        );
        self.emit(
            EventType::RebaseExecuted,
            now,
            json!({
                "price": observation.price.price.to_string(),
                "deviation": observation.deviation.to_string(),
                "band": observation.band,
                "supply_delta": delta.to_string(),
                "new_supply": new_supply.to_string(),
                "rebase_count": self.rebase_count,
            }),
        );
        Ok(RebaseOutcome::Applied { record })
    }

    fn compute_delta(&self, supply: u128, observation: &Observation) -> Result<i128> {
        let Some(band) = self.bands.get(observation.band) else {
            return Ok(0);
        };

        let raw = mul_wad(supply, observation.deviation)?;
        let damped = mul_wad(raw, band.damping_factor)?;
        let global_cap = mul_wad(supply, self.config.max_rebase_percentage)?;
        let band_cap = mul_wad(supply, band.max_rebase_amount)?;
        let capped = damped.min(global_cap).min(band_cap);

        let dust = mul_wad(supply, self.config.dust_threshold)?;
        if capped < dust {
            tracing::debug!(capped, dust, "rebase delta below dust threshold");
            return Ok(0);
        }

        let limit = mul_wad(supply, self.config.max_supply_change_per_rebase)?;
        let magnitude = to_signed(capped.min(limit))?;
        if observation.price.price > self.config.target_price {
            Ok(magnitude)
        } else {
            Ok(-magnitude)
        }
    }

    fn append_record(
        &mut self,
        now: Timestamp,
        observation: &Observation,
        supply_delta: i128,
        new_supply: u128,
        circuit_breaker_triggered: bool,
    ) -> RebaseRecord {
        let record = RebaseRecord {
            timestamp: now,
            price: observation.price.price,
            supply_delta,
            new_supply,
            band: observation.band,
            deviation: observation.deviation,
            circuit_breaker_triggered,
        };
        self.history.append(record.clone());
        record
    }

    fn emit_breaker_activated(&mut self, now: Timestamp, observation: &Observation, cause: &str) {
        self.emit(
            EventType::CircuitBreakerActivated,
            now,
            json!({
                "cause": cause,
                "price": observation.price.price.to_string(),
                "deviation": observation.deviation.to_string(),
                "consecutive_rebases": self.breaker.consecutive_rebases(),
            }),
        );
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Clear an active breaker by hand.
    ///
    /// Requires a fresh, confident reading with deviation at or below the
    /// band-3 threshold.
    ///
    /// # Errors
    ///
    /// - [`StabilizerError::Unauthorized`]
    /// - [`StabilizerError::CircuitBreakerNotActive`]
    /// - [`StabilizerError::ResetConditionsNotMet`]
    pub fn reset_circuit_breaker(&mut self, caller: &str, now: Timestamp) -> Result<()> {
        self.authorize(caller, AdminAction::ResetCircuitBreaker)?;
        if !self.breaker.is_active() {
            return Err(StabilizerError::CircuitBreakerNotActive);
        }
        let observation = self
            .observe(now)
            .map_err(|e| StabilizerError::ResetConditionsNotMet(e.to_string()))?;
        let severe = self.bands.threshold_or_top(SEVERE_BAND);
        if observation.deviation > severe {
            return Err(StabilizerError::ResetConditionsNotMet(format!(
                "deviation {} above {severe}",
                observation.deviation
            )));
        }

        self.note_deviation(now, observation.deviation);
        self.breaker.reset();
        self.emit(
            EventType::CircuitBreakerReset,
            now,
            json!({ "caller": caller, "deviation": observation.deviation.to_string() }),
        );
        Ok(())
    }

    pub fn pause(&mut self, caller: &str, now: Timestamp) -> Result<()> {
        self.authorize(caller, AdminAction::Pause)?;
        if !self.paused {
            self.paused = true;
            tracing::warn!(caller, "stabilizer paused");
            self.emit(EventType::Paused, now, json!({ "caller": caller }));
        }
        Ok(())
    }

    pub fn unpause(&mut self, caller: &str, now: Timestamp) -> Result<()> {
        self.authorize(caller, AdminAction::Unpause)?;
        if self.paused {
            self.paused = false;
            tracing::info!(caller, "stabilizer unpaused");
            self.emit(EventType::Unpaused, now, json!({ "caller": caller }));
        }
        Ok(())
    }

    /// Replace the band table.
    pub fn set_bands(&mut self, caller: &str, bands: BandTable, now: Timestamp) -> Result<()> {
        self.authorize(caller, AdminAction::UpdateStabilizerParameters)?;
        tracing::info!(count = bands.len(), "stability bands updated");
        self.emit(
            EventType::StabilizerParametersUpdated,
            now,
            json!({ "bands": bands.len() }),
        );
        self.bands = bands;
        Ok(())
    }

    /// Replace the fixed rebase cooldown.
    pub fn set_cooldown(&mut self, caller: &str, seconds: u64, now: Timestamp) -> Result<()> {
        self.authorize(caller, AdminAction::UpdateStabilizerParameters)?;
        if seconds == 0 {
            return Err(invalid("rebase_cooldown must be positive"));
        }
        let previous = std::mem::replace(&mut self.config.rebase_cooldown, seconds);
        tracing::info!(previous, seconds, "rebase cooldown updated");
        self.emit(
            EventType::StabilizerParametersUpdated,
            now,
            json!({ "rebase_cooldown": seconds, "previous": previous }),
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn bands(&self) -> &BandTable {
        &self.bands
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn history(&self) -> &RebaseHistory {
        &self.history
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn last_rebase_time(&self) -> Option<Timestamp> {
        self.last_rebase_time
    }

    pub fn rebase_count(&self) -> u64 {
        self.rebase_count
    }

    /// State to persist across restarts.
    pub fn state(&self) -> ControllerState {
        ControllerState {
            paused: self.paused,
            circuit_breaker: self.breaker.state(),
            last_rebase_time: self.last_rebase_time,
            rebase_count: self.rebase_count,
            last_deviation: self.last_deviation,
            stable_since: self.stable_since,
        }
    }

    pub fn status(&self, now: Timestamp) -> ControllerStatus {
        ControllerStatus {
            state: self.state(),
            total_supply: self.token.total_supply(),
            last_deviation: self.last_deviation,
            cooldown: self.current_cooldown(now),
            next_rebase_at: self.next_rebase_at(now),
            dynamic_cooldown: self.strategy.is_some(),
            history_len: self.history.len(),
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    fn authorize(&self, caller: &str, action: AdminAction) -> Result<()> {
        if self.authorizer.authorize(caller, action) {
            return Ok(());
        }
        tracing::warn!(caller, ?action, "unauthorized stabilizer administration attempt");
        Err(StabilizerError::Unauthorized {
            caller: caller.to_string(),
            action,
        })
    }

    fn emit(&mut self, event_type: EventType, now: Timestamp, payload: serde_json::Value) {
        if self.events.len() >= MAX_QUEUED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(Event::new(event_type, now, payload));
    }
}
