//! Source registry and price aggregation.
//!
//! ## Aggregation pass
//!
//! 1. Emergency mode short-circuits to the fallback price with confidence 0.
//! 2. Every active source is read once; each read becomes a [`SourceOutcome`].
//! 3. Accepted readings are filtered around their median.
//! 4. Survivors are averaged by weight.
//!
//! ```text
//! price      = sum(p_i * w_i) / sum(w_i)
//! timestamp  = min(updated_at_i)
//! confidence = survivors * 100 / active_sources
//! ```
//!
//! A feed failure never aborts the pass; it only lowers the number of
//! contributing sources.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use serde_json::json;

use ballast_types::events::{Event, EventType};
use ballast_types::fixed::normalize_decimals;
use ballast_types::{
    AdminAction, AggregatedPrice, ArithmeticError, Authorizer, Timestamp, Wad, TARGET_PRICE, WAD,
};

use crate::feed::FeedHandle;
use crate::history::{PriceHistory, PricePoint, DEFAULT_HISTORY_CAPACITY};
use crate::outlier::{remove_outliers, ValidPrice, DEFAULT_OUTLIER_THRESHOLD};
use crate::source::{
    validate_heartbeat, validate_weight, OracleSource, SourceInfo, SourceParams, MAX_SOURCES,
};
use crate::twap::compute_twap;
use crate::{OracleError, Result};

/// Maximum number of undrained events kept in the queue.
const MAX_QUEUED_EVENTS: usize = 1024;

/// Read-only price access used by the stabilizer.
pub trait PriceOracle: Send + Sync {
    /// Aggregate every active source at `now`.
    fn aggregated_price(&self, now: Timestamp) -> Result<AggregatedPrice>;

    /// Aggregate once, failing unless the result is trustworthy.
    fn healthy_price(&self, now: Timestamp) -> Result<AggregatedPrice>;

    /// Whether the oracle can currently serve a trustworthy price.
    fn is_healthy(&self, now: Timestamp) -> bool {
        self.healthy_price(now).is_ok()
    }

    /// Mean relative change between recent recorded prices.
    fn recent_volatility(&self) -> Result<Wad> {
        Ok(0)
    }
}

/// Aggregator parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Valid readings required before and after outlier removal.
    pub min_oracles_for_consensus: usize,
    /// Lowest acceptable price, 18 decimals.
    pub min_price: Wad,
    /// Highest acceptable price, 18 decimals.
    pub max_price: Wad,
    /// Maximum relative distance from the median.
    pub outlier_threshold: Wad,
    /// Maximum number of active sources.
    pub max_sources: usize,
    /// Confidence required by [`OracleAggregator::is_healthy`].
    pub healthy_confidence: u8,
    /// Number of recorded prices retained.
    pub history_capacity: usize,
    /// Price reported while in emergency mode.
    pub fallback_price: Wad,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_oracles_for_consensus: 3,
            min_price: WAD / 10,
            max_price: 10 * WAD,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            max_sources: MAX_SOURCES,
            healthy_confidence: 50,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            fallback_price: TARGET_PRICE,
        }
    }
}

impl AggregatorConfig {
    /// Check that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidParameter`] naming the offending field
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SOURCES).contains(&self.max_sources) {
            return Err(OracleError::InvalidParameter(format!(
                "max_sources {} outside [1, {MAX_SOURCES}]",
                self.max_sources
            )));
        }
        validate_min_oracles(self.min_oracles_for_consensus, self.max_sources)?;
        validate_price_bounds(self.min_price, self.max_price)?;
        if self.outlier_threshold == 0 || self.outlier_threshold > WAD {
            return Err(OracleError::InvalidParameter(
                "outlier_threshold must be in (0, 1]".to_string(),
            ));
        }
        if self.healthy_confidence > 100 {
            return Err(OracleError::InvalidParameter(format!(
                "healthy_confidence {} above 100",
                self.healthy_confidence
            )));
        }
        if self.fallback_price == 0 {
            return Err(OracleError::InvalidParameter(
                "fallback_price must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_min_oracles(min: usize, max_sources: usize) -> Result<()> {
    if min == 0 || min > max_sources {
        return Err(OracleError::InvalidParameter(format!(
            "min_oracles_for_consensus {min} outside [1, {max_sources}]"
        )));
    }
    Ok(())
}

fn validate_price_bounds(min: Wad, max: Wad) -> Result<()> {
    if min == 0 || min >= max {
        return Err(OracleError::InvalidParameter(format!(
            "price bounds [{min}, {max}] must satisfy 0 < min < max"
        )));
    }
    Ok(())
}

/// Why a source reading was not used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("non-positive price {0}")]
    NonPositivePrice(i128),

    #[error("zero timestamp")]
    ZeroTimestamp,

    #[error("stale: age {age}s exceeds heartbeat {heartbeat}s")]
    Stale { age: u64, heartbeat: u64 },

    #[error("price {0} outside bounds")]
    OutOfBounds(Wad),

    #[error("normalization overflow")]
    Overflow,
}

/// Result of reading one source during an aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Accepted(ValidPrice),
    Rejected { key: String, reason: RejectReason },
}

/// Multi-source price aggregator.
pub struct OracleAggregator {
    config: AggregatorConfig,
    sources: Vec<OracleSource>,
    emergency_mode: bool,
    history: PriceHistory,
    latest: Option<AggregatedPrice>,
    authorizer: Arc<dyn Authorizer>,
    events: VecDeque<Event>,
}

impl OracleAggregator {
    /// Create an aggregator with no sources.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidParameter`] if `config` is inconsistent
    pub fn new(config: AggregatorConfig, authorizer: Arc<dyn Authorizer>) -> Result<Self> {
        config.validate()?;
        let history = PriceHistory::new(config.history_capacity);
        Ok(Self {
            config,
            sources: Vec::new(),
            emergency_mode: false,
            history,
            latest: None,
            authorizer,
            events: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn is_emergency_mode(&self) -> bool {
        self.emergency_mode
    }

    /// Number of active sources.
    pub fn active_source_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_active()).count()
    }

    /// Snapshots of every registered source, active or not, in registration order.
    pub fn sources(&self) -> Vec<SourceInfo> {
        self.sources.iter().map(OracleSource::info).collect()
    }

    /// Snapshot of one source.
    pub fn source(&self, key: &str) -> Option<SourceInfo> {
        self.sources
            .iter()
            .find(|s| s.key() == key)
            .map(OracleSource::info)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Register a new source after probing its feed.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`], [`OracleError::EmergencyMode`]
    /// - [`OracleError::InvalidParameter`] on out-of-range parameters
    /// - [`OracleError::DuplicateKey`] if the key was ever registered
    /// - [`OracleError::CapacityExceeded`] if the active registry is full
    /// - [`OracleError::ProbeFailed`] if the feed gives no usable reading
    pub fn add_source(
        &mut self,
        caller: &str,
        params: SourceParams,
        feed: FeedHandle,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, AdminAction::AddSource)?;
        if self.emergency_mode {
            return Err(OracleError::EmergencyMode);
        }
        params.validate()?;
        if self.sources.iter().any(|s| s.key() == params.key) {
            return Err(OracleError::DuplicateKey(params.key));
        }
        self.ensure_capacity()?;
        probe(&params.key, &feed)?;

        tracing::info!(
            key = %params.key,
            weight = params.weight,
            heartbeat = params.heartbeat,
            decimals = params.decimals,
            "oracle source added"
        );
        self.emit(
            EventType::SourceAdded,
            now,
            json!({
                "key": params.key,
                "weight": params.weight,
                "heartbeat": params.heartbeat,
                "decimals": params.decimals,
            }),
        );
        self.sources.push(OracleSource::new(params, feed, now));
        Ok(())
    }

    /// Deactivate a source. Its statistics are retained.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`]
    /// - [`OracleError::NotFound`], [`OracleError::SourceInactive`]
    /// - [`OracleError::BelowConsensusMinimum`] if too few sources would remain
    pub fn remove_source(&mut self, caller: &str, key: &str, now: Timestamp) -> Result<()> {
        self.authorize(caller, AdminAction::RemoveSource)?;
        let index = self.index_of(key)?;
        if !self.sources[index].is_active() {
            return Err(OracleError::SourceInactive(key.to_string()));
        }
        let remaining = self.active_source_count() - 1;
        if remaining < self.config.min_oracles_for_consensus {
            return Err(OracleError::BelowConsensusMinimum {
                active: remaining,
                minimum: self.config.min_oracles_for_consensus,
            });
        }

        self.sources[index].active = false;
        tracing::info!(key, remaining, "oracle source removed");
        self.emit(EventType::SourceRemoved, now, json!({ "key": key }));
        Ok(())
    }

    /// Re-activate a removed source. The feed is probed again.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`], [`OracleError::EmergencyMode`]
    /// - [`OracleError::NotFound`], [`OracleError::SourceAlreadyActive`]
    /// - [`OracleError::CapacityExceeded`], [`OracleError::ProbeFailed`]
    pub fn reactivate_source(&mut self, caller: &str, key: &str, now: Timestamp) -> Result<()> {
        self.authorize(caller, AdminAction::ReactivateSource)?;
        if self.emergency_mode {
            return Err(OracleError::EmergencyMode);
        }
        let index = self.index_of(key)?;
        if self.sources[index].is_active() {
            return Err(OracleError::SourceAlreadyActive(key.to_string()));
        }
        self.ensure_capacity()?;
        probe(key, &self.sources[index].feed)?;

        self.sources[index].active = true;
        tracing::info!(key, "oracle source reactivated");
        self.emit(EventType::SourceReactivated, now, json!({ "key": key }));
        Ok(())
    }

    /// Change a source's weight.
    pub fn update_source_weight(
        &mut self,
        caller: &str,
        key: &str,
        weight: u32,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, AdminAction::UpdateSource)?;
        validate_weight(weight)?;
        let index = self.index_of(key)?;
        let previous = std::mem::replace(&mut self.sources[index].params.weight, weight);

        tracing::info!(key, previous, weight, "oracle source weight updated");
        self.emit(
            EventType::SourceUpdated,
            now,
            json!({ "key": key, "weight": weight, "previous_weight": previous }),
        );
        Ok(())
    }

    /// Change a source's heartbeat.
    pub fn update_source_heartbeat(
        &mut self,
        caller: &str,
        key: &str,
        heartbeat: u64,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, AdminAction::UpdateSource)?;
        validate_heartbeat(heartbeat)?;
        let index = self.index_of(key)?;
        let previous = std::mem::replace(&mut self.sources[index].params.heartbeat, heartbeat);

        tracing::info!(key, previous, heartbeat, "oracle source heartbeat updated");
        self.emit(
            EventType::SourceUpdated,
            now,
            json!({ "key": key, "heartbeat": heartbeat, "previous_heartbeat": previous }),
        );
        Ok(())
    }

    /// Change the consensus minimum.
    pub fn set_min_oracles(&mut self, caller: &str, min: usize, now: Timestamp) -> Result<()> {
        self.authorize(caller, AdminAction::UpdateOracleParameters)?;
        validate_min_oracles(min, self.config.max_sources)?;
        self.config.min_oracles_for_consensus = min;

        tracing::info!(min, "oracle consensus minimum updated");
        self.emit(
            EventType::OracleParametersUpdated,
            now,
            json!({ "min_oracles_for_consensus": min }),
        );
        Ok(())
    }

    /// Change the global price bounds.
    pub fn set_price_bounds(
        &mut self,
        caller: &str,
        min_price: Wad,
        max_price: Wad,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, AdminAction::UpdateOracleParameters)?;
        validate_price_bounds(min_price, max_price)?;
        self.config.min_price = min_price;
        self.config.max_price = max_price;

        tracing::info!(min_price, max_price, "oracle price bounds updated");
        self.emit(
            EventType::OracleParametersUpdated,
            now,
            json!({ "min_price": min_price.to_string(), "max_price": max_price.to_string() }),
        );
        Ok(())
    }

    /// Enter or leave emergency mode, optionally replacing the fallback price.
    pub fn set_emergency_mode(
        &mut self,
        caller: &str,
        enabled: bool,
        fallback_price: Option<Wad>,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, AdminAction::SetEmergencyMode)?;
        if let Some(price) = fallback_price {
            if price == 0 {
                return Err(OracleError::InvalidParameter(
                    "fallback_price must be positive".to_string(),
                ));
            }
            self.config.fallback_price = price;
        }
        self.emergency_mode = enabled;

        tracing::warn!(
            enabled,
            fallback_price = self.config.fallback_price,
            "oracle emergency mode changed"
        );
        self.emit(
            EventType::EmergencyModeChanged,
            now,
            json!({
                "enabled": enabled,
                "fallback_price": self.config.fallback_price.to_string(),
            }),
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------------

    /// Read every active source once, in registration order.
    pub fn collect(&self, now: Timestamp) -> Vec<SourceOutcome> {
        self.sources
            .iter()
            .filter(|s| s.is_active())
            .map(|s| self.read_source(s, now))
            .collect()
    }

    /// Aggregate every active source at `now`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InsufficientOracles`]
    /// - [`OracleError::InsufficientOraclesAfterOutlierRemoval`]
    /// - [`OracleError::PriceOutOfBounds`]
    /// - [`OracleError::ArithmeticOverflow`]
    pub fn aggregated_price(&self, now: Timestamp) -> Result<AggregatedPrice> {
        if self.emergency_mode {
            return Ok(AggregatedPrice {
                price: self.config.fallback_price,
                timestamp: now,
                confidence: 0,
            });
        }

        let valid: Vec<ValidPrice> = self
            .collect(now)
            .into_iter()
            .filter_map(|outcome| match outcome {
                SourceOutcome::Accepted(price) => Some(price),
                SourceOutcome::Rejected { .. } => None,
            })
            .collect();

        let required = self.config.min_oracles_for_consensus;
        if valid.len() < required {
            return Err(OracleError::InsufficientOracles {
                required,
                available: valid.len(),
            });
        }

        let survivors = remove_outliers(&valid, self.config.outlier_threshold)?;
        if survivors.len() < required {
            return Err(OracleError::InsufficientOraclesAfterOutlierRemoval {
                required,
                available: survivors.len(),
            });
        }

        let price = weighted_average(&survivors)?;
        let timestamp = survivors
            .iter()
            .map(|s| s.updated_at)
            .min()
            .unwrap_or(now);
        let confidence = confidence(survivors.len(), self.active_source_count());

        if price < self.config.min_price || price > self.config.max_price {
            return Err(OracleError::PriceOutOfBounds {
                price,
                min: self.config.min_price,
                max: self.config.max_price,
            });
        }

        Ok(AggregatedPrice {
            price,
            timestamp,
            confidence,
        })
    }

    /// Aggregate once and return the price only if the oracle is healthy:
    /// not in emergency mode, enough active sources, and at least the
    /// healthy confidence.
    ///
    /// Each active source is read exactly once per call.
    ///
    /// # Errors
    ///
    /// - [`OracleError::EmergencyMode`]
    /// - [`OracleError::InsufficientOracles`] if too few sources are active
    /// - [`OracleError::LowConfidence`]
    /// - any error of [`OracleAggregator::aggregated_price`]
    pub fn healthy_price(&self, now: Timestamp) -> Result<AggregatedPrice> {
        if self.emergency_mode {
            return Err(OracleError::EmergencyMode);
        }
        let active = self.active_source_count();
        if active < self.config.min_oracles_for_consensus {
            return Err(OracleError::InsufficientOracles {
                required: self.config.min_oracles_for_consensus,
                available: active,
            });
        }
        let price = self.aggregated_price(now)?;
        if price.confidence < self.config.healthy_confidence {
            return Err(OracleError::LowConfidence {
                confidence: price.confidence,
                required: self.config.healthy_confidence,
            });
        }
        Ok(price)
    }

    /// Whether [`OracleAggregator::healthy_price`] succeeds at `now`.
    pub fn is_healthy(&self, now: Timestamp) -> bool {
        match self.healthy_price(now) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "oracle health check failed");
                false
            }
        }
    }

    /// Aggregate, cache the result and append it to the price history.
    ///
    /// Fallback prices served in emergency mode are returned but not recorded.
    ///
    /// # Errors
    ///
    /// - any aggregation error
    /// - [`OracleError::NonMonotonicTimestamp`] if `now` is not after the last recorded point
    pub fn record_price(&mut self, now: Timestamp) -> Result<AggregatedPrice> {
        let aggregate = self.aggregated_price(now)?;
        if self.emergency_mode {
            tracing::debug!("emergency mode: fallback price not recorded");
            return Ok(aggregate);
        }
        if let Some(last) = self.history.latest() {
            if now <= last.timestamp {
                return Err(OracleError::NonMonotonicTimestamp {
                    new: now,
                    last: last.timestamp,
                });
            }
        }

        self.history.push(PricePoint::recorded(now, &aggregate));
        self.latest = Some(aggregate);
        tracing::debug!(
            price = aggregate.price,
            confidence = aggregate.confidence,
            "aggregated price recorded"
        );
        self.emit(
            EventType::PriceUpdated,
            now,
            json!({
                "price": aggregate.price.to_string(),
                "timestamp": aggregate.timestamp,
                "confidence": aggregate.confidence,
            }),
        );
        Ok(aggregate)
    }

    /// Last recorded aggregate.
    pub fn latest(&self) -> Option<AggregatedPrice> {
        self.latest
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    /// TWAP over recorded points in `[now - window, now]`.
    pub fn twap(&self, now: Timestamp, window: u64) -> Result<Wad> {
        let start = now.saturating_sub(window);
        let points: Vec<PricePoint> = self
            .history
            .since(start)
            .into_iter()
            .filter(|p| p.timestamp <= now)
            .collect();
        compute_twap(&points)
    }

    /// Volatility of the recorded history.
    pub fn recent_volatility(&self) -> Result<Wad> {
        self.history.volatility()
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn read_source(&self, source: &OracleSource, now: Timestamp) -> SourceOutcome {
        let params = &source.params;
        match self.validate_reading(source, now) {
            Ok((price, updated_at)) => {
                source.stats.record_success(updated_at);
                SourceOutcome::Accepted(ValidPrice {
                    key: params.key.clone(),
                    price,
                    weight: params.weight,
                    updated_at,
                })
            }
            Err(reason) => {
                source.stats.record_failure();
                tracing::debug!(key = %params.key, %reason, "source reading rejected");
                SourceOutcome::Rejected {
                    key: params.key.clone(),
                    reason,
                }
            }
        }
    }

    fn validate_reading(
        &self,
        source: &OracleSource,
        now: Timestamp,
    ) -> std::result::Result<(Wad, Timestamp), RejectReason> {
        let reading = source
            .feed
            .latest_value()
            .map_err(|e| RejectReason::Unreachable(e.to_string()))?;

        let Ok(raw) = u128::try_from(reading.price) else {
            return Err(RejectReason::NonPositivePrice(reading.price));
        };
        if raw == 0 {
            return Err(RejectReason::NonPositivePrice(reading.price));
        }
        if reading.updated_at == 0 {
            return Err(RejectReason::ZeroTimestamp);
        }
        let age = now.saturating_sub(reading.updated_at);
        if age > source.params.heartbeat {
            return Err(RejectReason::Stale {
                age,
                heartbeat: source.params.heartbeat,
            });
        }

        let price =
            normalize_decimals(raw, source.params.decimals).map_err(|_| RejectReason::Overflow)?;
        if price < self.config.min_price || price > self.config.max_price {
            return Err(RejectReason::OutOfBounds(price));
        }
        Ok((price, reading.updated_at))
    }

    fn authorize(&self, caller: &str, action: AdminAction) -> Result<()> {
        if self.authorizer.authorize(caller, action) {
            return Ok(());
        }
        tracing::warn!(caller, ?action, "unauthorized oracle administration attempt");
        Err(OracleError::Unauthorized {
            caller: caller.to_string(),
            action,
        })
    }

    fn index_of(&self, key: &str) -> Result<usize> {
        self.sources
            .iter()
            .position(|s| s.key() == key)
            .ok_or_else(|| OracleError::NotFound(key.to_string()))
    }

    fn ensure_capacity(&self) -> Result<()> {
        if self.active_source_count() >= self.config.max_sources {
            return Err(OracleError::CapacityExceeded {
                max: self.config.max_sources,
            });
        }
        Ok(())
    }

    fn emit(&mut self, event_type: EventType, now: Timestamp, payload: serde_json::Value) {
        if self.events.len() >= MAX_QUEUED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(Event::new(event_type, now, payload));
    }
}

impl std::fmt::Debug for OracleAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleAggregator")
            .field("config", &self.config)
            .field("sources", &self.sources)
            .field("emergency_mode", &self.emergency_mode)
            .field("latest", &self.latest)
            .finish_non_exhaustive()
    }
}

/// Probe a feed before it joins the registry: positive price, nonzero timestamp.
fn probe(key: &str, feed: &FeedHandle) -> Result<()> {
    let failed = |reason: RejectReason| OracleError::ProbeFailed {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let reading = feed
        .latest_value()
        .map_err(|e| failed(RejectReason::Unreachable(e.to_string())))?;
    if reading.price <= 0 {
        return Err(failed(RejectReason::NonPositivePrice(reading.price)));
    }
    if reading.updated_at == 0 {
        return Err(failed(RejectReason::ZeroTimestamp));
    }
    Ok(())
}

/// `sum(p * w) / sum(w)`, truncating.
fn weighted_average(entries: &[ValidPrice]) -> Result<Wad> {
    let mut weighted_sum: u128 = 0;
    let mut total_weight: u128 = 0;
    for entry in entries {
        let weighted = entry
            .price
            .checked_mul(u128::from(entry.weight))
            .ok_or(ArithmeticError::Overflow)?;
        weighted_sum = weighted_sum
            .checked_add(weighted)
            .ok_or(ArithmeticError::Overflow)?;
        total_weight += u128::from(entry.weight);
    }
    if total_weight == 0 {
        return Err(ArithmeticError::DivisionByZero.into());
    }
    Ok(weighted_sum / total_weight)
}

fn confidence(survivors: usize, active: usize) -> u8 {
    if active == 0 {
        return 0;
    }
    let pct = (survivors * 100 / active).min(100);
    u8::try_from(pct).unwrap_or(ballast_types::FULL_CONFIDENCE)
}

impl PriceOracle for OracleAggregator {
    fn aggregated_price(&self, now: Timestamp) -> Result<AggregatedPrice> {
        OracleAggregator::aggregated_price(self, now)
    }

    fn healthy_price(&self, now: Timestamp) -> Result<AggregatedPrice> {
        OracleAggregator::healthy_price(self, now)
    }

    fn is_healthy(&self, now: Timestamp) -> bool {
        OracleAggregator::is_healthy(self, now)
    }

    fn recent_volatility(&self) -> Result<Wad> {
        OracleAggregator::recent_volatility(self)
    }
}

impl PriceOracle for RwLock<OracleAggregator> {
    fn aggregated_price(&self, now: Timestamp) -> Result<AggregatedPrice> {
        self.read()
            .map_err(|_| OracleError::LockPoisoned)?
            .aggregated_price(now)
    }

    fn healthy_price(&self, now: Timestamp) -> Result<AggregatedPrice> {
        self.read()
            .map_err(|_| OracleError::LockPoisoned)?
            .healthy_price(now)
    }

    fn is_healthy(&self, now: Timestamp) -> bool {
        self.read().map(|agg| agg.is_healthy(now)).unwrap_or(false)
    }

    fn recent_volatility(&self) -> Result<Wad> {
        self.read()
            .map_err(|_| OracleError::LockPoisoned)?
            .recent_volatility()
    }
}

impl<P: PriceOracle + ?Sized> PriceOracle for Arc<P> {
    fn aggregated_price(&self, now: Timestamp) -> Result<AggregatedPrice> {
        (**self).aggregated_price(now)
    }

    fn healthy_price(&self, now: Timestamp) -> Result<AggregatedPrice> {
        (**self).healthy_price(now)
    }

    fn is_healthy(&self, now: Timestamp) -> bool {
        (**self).is_healthy(now)
    }

    fn recent_volatility(&self) -> Result<Wad> {
        (**self).recent_volatility()
    }
}
