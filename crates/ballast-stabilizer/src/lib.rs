//! # ballast-stabilizer
//!
//! The supply control loop.
//!
//! [`StabilizationController`] reads the aggregated oracle price, measures
//! its deviation from the peg, classifies it into a stability band and
//! applies a damped, capped supply change to the token. A circuit breaker
//! halts adjustments during extreme or persistent deviation.
//!
//! ## Modules
//!
//! - [`controller`]: the rebase loop and its administration
//! - [`circuit_breaker`]: breaker state machine
//! - [`history`]: append-only rebase log
//! - [`token`]: the supply sink contract and an in-memory implementation

pub mod circuit_breaker;
pub mod controller;
pub mod history;
pub mod token;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState};
pub use controller::{
    ControllerConfig, ControllerState, ControllerStatus, RebaseOutcome, StabilizationController,
};
pub use history::RebaseHistory;
pub use token::{ElasticSupply, RebaseToken, TokenError};

use ballast_params::ParamsError;
use ballast_types::{AdminAction, ArithmeticError};

/// Error types for stabilizer operations.
#[derive(Debug, thiserror::Error)]
pub enum StabilizerError {
    /// Rebasing is paused.
    #[error("stabilizer is paused")]
    Paused,

    /// The oracle reported itself unhealthy.
    #[error("oracle is unhealthy")]
    OracleUnhealthy,

    /// The aggregated price failed confidence or freshness checks.
    #[error("oracle validation failed: {0}")]
    OracleValidationFailed(String),

    /// The token sink rejected the supply change.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Fixed-point overflow or division by zero.
    #[error("arithmetic overflow: {0}")]
    ArithmeticOverflow(#[from] ArithmeticError),

    /// Manual reset requested while the breaker is inactive.
    #[error("circuit breaker is not active")]
    CircuitBreakerNotActive,

    /// Manual reset requested while the market is still unsettled.
    #[error("circuit breaker reset conditions not met: {0}")]
    ResetConditionsNotMet(String),

    /// The caller may not perform this action.
    #[error("caller {caller} is not authorized for {action:?}")]
    Unauthorized {
        /// Caller identity as supplied by the host.
        caller: String,
        /// Attempted action.
        action: AdminAction,
    },

    /// A configuration value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Parameter strategy failure.
    #[error("parameter error: {0}")]
    Params(#[from] ParamsError),
}

/// Convenience result type for stabilizer operations.
pub type Result<T> = std::result::Result<T, StabilizerError>;
