//! Rebase history records.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, Wad};

/// One executed rebase attempt.
///
/// Records are appended once and never mutated. Attempts that computed a
/// zero delta and attempts that tripped the circuit breaker are recorded too,
/// with `supply_delta == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseRecord {
    /// When the attempt ran.
    pub timestamp: Timestamp,
    /// Aggregated price used, 18 decimals.
    pub price: Wad,
    /// Signed supply change actually applied.
    pub supply_delta: i128,
    /// Total supply after the attempt.
    pub new_supply: u128,
    /// Stability band index (0 = no action).
    pub band: u8,
    /// `|price - target| / target`, 18 decimals.
    pub deviation: Wad,
    /// Whether this attempt activated the circuit breaker.
    pub circuit_breaker_triggered: bool,
}

impl RebaseRecord {
    /// Whether the attempt left supply unchanged.
    pub fn is_noop(&self) -> bool {
        self.supply_delta == 0
    }

    /// Whether supply expanded.
    pub fn is_expansion(&self) -> bool {
        self.supply_delta > 0
    }
}
