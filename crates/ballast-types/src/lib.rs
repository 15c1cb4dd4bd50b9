//! # ballast-types
//!
//! Shared domain types used across the Ballast workspace.
//!
//! Every price, deviation and fraction in Ballast is an 18-decimal fixed-point
//! integer (a "wad"): `1.0 == WAD == 10^18`. Supplies are plain integers in
//! token base units. Timestamps are Unix seconds.

pub mod admin;
pub mod events;
pub mod fixed;
pub mod price;
pub mod rebase;

pub use admin::{AdminAction, AllowAll, AllowList, Authorizer};
pub use fixed::ArithmeticError;
pub use price::AggregatedPrice;
pub use rebase::RebaseRecord;

/// An 18-decimal fixed-point value.
pub type Wad = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Canonical price precision (decimal places).
pub const PRICE_DECIMALS: u8 = 18;

/// `1.0` in canonical precision.
pub const WAD: Wad = 1_000_000_000_000_000_000;

/// Peg target: $1.00.
pub const TARGET_PRICE: Wad = WAD;

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Full confidence, in percent.
pub const FULL_CONFIDENCE: u8 = 100;
