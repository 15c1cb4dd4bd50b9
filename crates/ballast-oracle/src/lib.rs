//! # ballast-oracle
//!
//! Multi-source price aggregation for the Ballast stabilizer.
//!
//! The [`OracleAggregator`](aggregator::OracleAggregator) polls every active
//! source, discards unusable reports, removes statistical outliers around the
//! median and produces one weighted price with a confidence score. Recorded
//! prices feed a bounded history used for TWAP and volatility estimates.
//!
//! ## Modules
//!
//! - [`aggregator`]: source registry, aggregation and health checks
//! - [`feed`]: the external feed contract and a settable static feed
//! - [`source`]: source parameters, validation bounds and statistics
//! - [`outlier`]: median-based outlier removal
//! - [`history`]: bounded ring buffer of recorded prices
//! - [`twap`]: time-weighted average over recorded prices

pub mod aggregator;
pub mod feed;
pub mod history;
pub mod outlier;
pub mod source;
pub mod twap;

pub use aggregator::{AggregatorConfig, OracleAggregator, PriceOracle, RejectReason, SourceOutcome};
pub use feed::{FeedError, FeedHandle, FeedReading, PriceFeed, StaticFeed};
pub use source::{SourceInfo, SourceParams};

use ballast_types::{AdminAction, ArithmeticError, Wad};

/// Error types for oracle operations.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// A parameter is outside its permitted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A source with this key already exists.
    #[error("duplicate source key: {0}")]
    DuplicateKey(String),

    /// The active source registry is full.
    #[error("source capacity exceeded (max {max})")]
    CapacityExceeded {
        /// Maximum number of active sources.
        max: usize,
    },

    /// The feed did not return a usable reading when probed.
    #[error("probe of source {key} failed: {reason}")]
    ProbeFailed {
        /// Source key.
        key: String,
        /// Why the probe was rejected.
        reason: String,
    },

    /// No source with this key.
    #[error("source not found: {0}")]
    NotFound(String),

    /// The source exists but has been removed.
    #[error("source is inactive: {0}")]
    SourceInactive(String),

    /// The source is already active.
    #[error("source is already active: {0}")]
    SourceAlreadyActive(String),

    /// Removing the source would leave too few active sources.
    #[error("removal would leave {active} active sources, minimum is {minimum}")]
    BelowConsensusMinimum {
        /// Active sources after the removal.
        active: usize,
        /// Configured consensus minimum.
        minimum: usize,
    },

    /// Administrative changes are blocked in emergency mode.
    #[error("oracle is in emergency mode")]
    EmergencyMode,

    /// The caller may not perform this action.
    #[error("caller {caller} is not authorized for {action:?}")]
    Unauthorized {
        /// Caller identity as supplied by the host.
        caller: String,
        /// Attempted action.
        action: AdminAction,
    },

    /// Too few sources produced a valid reading.
    #[error("insufficient oracles: need {required}, have {available}")]
    InsufficientOracles {
        /// Consensus minimum.
        required: usize,
        /// Valid readings.
        available: usize,
    },

    /// Too few sources remained after outlier removal.
    #[error("insufficient oracles after outlier removal: need {required}, have {available}")]
    InsufficientOraclesAfterOutlierRemoval {
        /// Consensus minimum.
        required: usize,
        /// Surviving readings.
        available: usize,
    },

    /// The aggregate is below the confidence required for a healthy oracle.
    #[error("aggregate confidence {confidence} below healthy minimum {required}")]
    LowConfidence {
        /// Confidence of the aggregate.
        confidence: u8,
        /// Configured healthy confidence.
        required: u8,
    },

    /// The aggregated price is outside the configured bounds.
    #[error("aggregated price {price} outside [{min}, {max}]")]
    PriceOutOfBounds {
        /// Aggregated price.
        price: Wad,
        /// Lower bound.
        min: Wad,
        /// Upper bound.
        max: Wad,
    },

    /// Fixed-point overflow or division by zero.
    #[error("arithmetic overflow: {0}")]
    ArithmeticOverflow(#[from] ArithmeticError),

    /// Insufficient recorded prices for TWAP computation.
    #[error("insufficient observations: need {required}, have {available}")]
    InsufficientObservations {
        /// Number of observations required.
        required: usize,
        /// Number of observations available.
        available: usize,
    },

    /// Recorded timestamps are not strictly increasing.
    #[error("non-monotonic timestamp: {new} <= {last}")]
    NonMonotonicTimestamp {
        /// The timestamp that violated monotonicity.
        new: u64,
        /// The preceding timestamp.
        last: u64,
    },

    /// The TWAP window spans zero seconds.
    #[error("no observations in TWAP window")]
    EmptyWindow,

    /// A lock guarding the aggregator was poisoned.
    #[error("oracle lock poisoned")]
    LockPoisoned,
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
