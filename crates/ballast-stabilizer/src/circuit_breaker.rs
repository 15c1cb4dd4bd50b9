//! Circuit breaker for the rebase loop.
//!
//! The breaker halts supply adjustments when the peg is badly broken or when
//! the controller keeps rebasing at high severity without settling.
//!
//! ## Transitions
//!
//! - Normal → Active: deviation at or above the top band threshold, or
//!   [`MAX_CONSECUTIVE_REBASES`] consecutive rebases with deviation at or
//!   above the band-3 threshold.
//! - Active → Normal (automatic): the breaker cooldown has elapsed and the
//!   deviation is at or below the auto-recovery threshold.
//! - Active → Normal (manual): [`CircuitBreaker::reset`], gated by the
//!   controller.

use serde::{Deserialize, Serialize};

use ballast_types::{Timestamp, Wad, WAD};

/// Consecutive high-severity rebases that trip the breaker.
pub const MAX_CONSECUTIVE_REBASES: u32 = 3;

/// Deviation at or below which the breaker may recover on its own (5%).
pub const DEFAULT_AUTO_RECOVERY_THRESHOLD: Wad = WAD * 5 / 100;

/// Minimum time the breaker stays active before automatic recovery (24 hours).
pub const DEFAULT_BREAKER_COOLDOWN: u64 = 24 * 60 * 60;

/// Persistable breaker state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub active: bool,
    pub activated_at: Option<Timestamp>,
    pub consecutive_rebases: u32,
}

/// Breaker state plus its recovery parameters.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitBreakerState,
    /// Seconds the breaker stays active before automatic recovery.
    cooldown: u64,
    /// Deviation at or below which automatic recovery is allowed.
    auto_recovery_threshold: Wad,
    /// Consecutive rebases counted towards a trip.
    max_consecutive: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: u64, auto_recovery_threshold: Wad, max_consecutive: u32) -> Self {
        Self {
            state: CircuitBreakerState::default(),
            cooldown,
            auto_recovery_threshold,
            max_consecutive,
        }
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.state
    }

    /// Replace the state, e.g. after a restart.
    pub fn restore(&mut self, state: CircuitBreakerState) {
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn activated_at(&self) -> Option<Timestamp> {
        self.state.activated_at
    }

    pub fn consecutive_rebases(&self) -> u32 {
        self.state.consecutive_rebases
    }

    /// Earliest time automatic recovery may happen.
    pub fn recovery_not_before(&self) -> Option<Timestamp> {
        self.state
            .activated_at
            .map(|at| at.saturating_add(self.cooldown))
    }

    /// Whether the streak of supply changes has reached the limit while the
    /// deviation is still at least `severe_threshold`.
    ///
    /// The top-band trip is decided by the controller before any supply
    /// change, so it is not part of this check.
    pub fn consecutive_limit_reached(&self, deviation: Wad, severe_threshold: Wad) -> bool {
        self.state.consecutive_rebases >= self.max_consecutive && deviation >= severe_threshold
    }

    /// Whether the breaker is active and may now recover on its own.
    pub fn recovery_due(&self, now: Timestamp, deviation: Wad) -> bool {
        if !self.state.active {
            return false;
        }
        let elapsed = self
            .recovery_not_before()
            .is_some_and(|not_before| now >= not_before);
        elapsed && deviation <= self.auto_recovery_threshold
    }

    /// Trip the breaker.
    pub fn activate(&mut self, now: Timestamp, deviation: Wad) {
        tracing::warn!(
            deviation,
            consecutive = self.state.consecutive_rebases,
            "circuit breaker: activated"
        );
        self.state.active = true;
        self.state.activated_at = Some(now);
    }

    /// Automatic recovery.
    pub fn recover(&mut self, deviation: Wad) {
        tracing::info!(deviation, "circuit breaker: recovered");
        self.clear();
    }

    /// Manual reset.
    pub fn reset(&mut self) {
        tracing::warn!("circuit breaker: manually reset");
        self.clear();
    }

    pub fn record_rebase(&mut self) {
        self.state.consecutive_rebases = self.state.consecutive_rebases.saturating_add(1);
    }

    pub fn reset_consecutive(&mut self) {
        self.state.consecutive_rebases = 0;
    }

    fn clear(&mut self) {
        self.state = CircuitBreakerState::default();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(
            DEFAULT_BREAKER_COOLDOWN,
            DEFAULT_AUTO_RECOVERY_THRESHOLD,
            MAX_CONSECUTIVE_REBASES,
        )
    }
}
