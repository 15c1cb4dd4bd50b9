//! Oracle source registry entries.
//!
//! ## Parameter Bounds
//!
//! | Parameter | Range |
//! |---|---|
//! | weight | `1..=1000` |
//! | heartbeat | 5 minutes to 24 hours |
//! | decimals | `6..=18` |

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::feed::FeedHandle;
use crate::{OracleError, Result};

/// Maximum number of simultaneously active sources.
pub const MAX_SOURCES: usize = 10;

/// Maximum source weight.
pub const MAX_WEIGHT: u32 = 1000;

/// Minimum heartbeat in seconds (5 minutes).
pub const MIN_HEARTBEAT: u64 = 5 * 60;

/// Maximum heartbeat in seconds (24 hours).
pub const MAX_HEARTBEAT: u64 = 24 * 60 * 60;

/// Minimum native precision.
pub const MIN_DECIMALS: u8 = 6;

/// Maximum native precision.
pub const MAX_DECIMALS: u8 = 18;

/// Parameters supplied when registering a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceParams {
    /// Unique key.
    pub key: String,
    /// Relative influence in the weighted average.
    pub weight: u32,
    /// Maximum report age in seconds.
    pub heartbeat: u64,
    /// Native fixed-point precision of the feed.
    pub decimals: u8,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

impl SourceParams {
    /// Check every value-level precondition.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidParameter`] naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(OracleError::InvalidParameter(
                "source key must be non-empty".to_string(),
            ));
        }
        validate_weight(self.weight)?;
        validate_heartbeat(self.heartbeat)?;
        if !(MIN_DECIMALS..=MAX_DECIMALS).contains(&self.decimals) {
            return Err(OracleError::InvalidParameter(format!(
                "decimals {} outside [{MIN_DECIMALS}, {MAX_DECIMALS}]",
                self.decimals
            )));
        }
        Ok(())
    }
}

/// Validate a source weight.
pub fn validate_weight(weight: u32) -> Result<()> {
    if weight == 0 || weight > MAX_WEIGHT {
        return Err(OracleError::InvalidParameter(format!(
            "weight {weight} outside (0, {MAX_WEIGHT}]"
        )));
    }
    Ok(())
}

/// Validate a heartbeat.
pub fn validate_heartbeat(heartbeat: u64) -> Result<()> {
    if !(MIN_HEARTBEAT..=MAX_HEARTBEAT).contains(&heartbeat) {
        return Err(OracleError::InvalidParameter(format!(
            "heartbeat {heartbeat}s outside [{MIN_HEARTBEAT}, {MAX_HEARTBEAT}]"
        )));
    }
    Ok(())
}

/// Per-source read statistics.
///
/// Updated through a shared reference on every aggregation pass, so a
/// read-only aggregator still keeps an accurate audit trail.
#[derive(Debug, Default)]
pub struct SourceStats {
    successes: AtomicU64,
    failures: AtomicU64,
    last_updated_at: AtomicU64,
}

impl SourceStats {
    pub(crate) fn record_success(&self, updated_at: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.last_updated_at.store(updated_at, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Accepted readings.
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Rejected or failed readings.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Timestamp of the last accepted reading (0 if none).
    pub fn last_updated_at(&self) -> u64 {
        self.last_updated_at.load(Ordering::Relaxed)
    }
}

/// A registered source.
pub struct OracleSource {
    pub(crate) params: SourceParams,
    pub(crate) feed: FeedHandle,
    pub(crate) active: bool,
    pub(crate) added_at: u64,
    pub(crate) stats: SourceStats,
}

impl OracleSource {
    pub(crate) fn new(params: SourceParams, feed: FeedHandle, added_at: u64) -> Self {
        Self {
            params,
            feed,
            active: true,
            added_at,
            stats: SourceStats::default(),
        }
    }

    /// Source key.
    pub fn key(&self) -> &str {
        &self.params.key
    }

    /// Whether the source takes part in aggregation.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Read statistics.
    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    /// Serializable snapshot.
    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            key: self.params.key.clone(),
            description: self.params.description.clone(),
            weight: self.params.weight,
            heartbeat: self.params.heartbeat,
            decimals: self.params.decimals,
            active: self.active,
            added_at: self.added_at,
            success_count: self.stats.successes(),
            failure_count: self.stats.failures(),
            last_updated_at: self.stats.last_updated_at(),
        }
    }
}

impl std::fmt::Debug for OracleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleSource")
            .field("params", &self.params)
            .field("active", &self.active)
            .field("added_at", &self.added_at)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a source for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub key: String,
    pub description: String,
    pub weight: u32,
    pub heartbeat: u64,
    pub decimals: u8,
    pub active: bool,
    pub added_at: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_updated_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SourceParams {
        SourceParams {
            key: "chainlink-usd".to_string(),
            weight: 500,
            heartbeat: 3_600,
            decimals: 8,
            description: "primary".to_string(),
        }
    }

    #[test]
    fn test_valid_params() {
        params().validate().expect("valid");
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut p = params();
        p.key = "  ".to_string();
        assert!(matches!(p.validate(), Err(OracleError::InvalidParameter(_))));
    }

    #[test]
    fn test_weight_bounds() {
        assert!(validate_weight(0).is_err());
        assert!(validate_weight(1).is_ok());
        assert!(validate_weight(MAX_WEIGHT).is_ok());
        assert!(validate_weight(MAX_WEIGHT + 1).is_err());
    }

    #[test]
    fn test_heartbeat_bounds() {
        assert!(validate_heartbeat(MIN_HEARTBEAT - 1).is_err());
        assert!(validate_heartbeat(MIN_HEARTBEAT).is_ok());
        assert!(validate_heartbeat(MAX_HEARTBEAT).is_ok());
        assert!(validate_heartbeat(MAX_HEARTBEAT + 1).is_err());
    }

    #[test]
    fn test_decimals_bounds() {
        let mut p = params();
        p.decimals = 5;
        assert!(p.validate().is_err());
        p.decimals = 19;
        assert!(p.validate().is_err());
        p.decimals = 18;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_stats_counters() {
        let stats = SourceStats::default();
        stats.record_success(1_000);
        stats.record_success(1_060);
        stats.record_failure();
        assert_eq!(stats.successes(), 2);
        assert_eq!(stats.failures(), 1);
        assert_eq!(stats.last_updated_at(), 1_060);
    }
}
