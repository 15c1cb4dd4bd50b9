//! # ballast-params
//!
//! Economic parameters consumed by the stabilizer.
//!
//! Nothing here holds controller state. The stabilizer queries these types
//! for band configuration and cooldown lengths and never hands them anything
//! to mutate.
//!
//! ## Modules
//!
//! - [`bands`]: stability bands and deviation classification
//! - [`cooldown`]: volatility- and stability-aware cooldown policy
//! - [`manager`]: the [`EconomicParameterManager`] strategy object

pub mod bands;
pub mod cooldown;
pub mod manager;

pub use bands::{BandTable, StabilityBand};
pub use cooldown::{CooldownPolicy, StabilityContext};
pub use manager::{EconomicParameterManager, ParameterStrategy};

use ballast_types::ArithmeticError;

/// Error types for parameter operations.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    /// A band table violates its ordering or range rules.
    #[error("invalid stability band: {0}")]
    InvalidBand(String),

    /// A cooldown policy value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Fixed-point overflow or division by zero.
    #[error("arithmetic overflow: {0}")]
    ArithmeticOverflow(#[from] ArithmeticError),
}

/// Convenience result type for parameter operations.
pub type Result<T> = std::result::Result<T, ParamsError>;
