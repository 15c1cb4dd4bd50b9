//! Supply sink contract.
//!
//! The controller only ever asks the token for its total supply and hands it
//! a signed delta. Balance accounting belongs to the token.

use serde::{Deserialize, Serialize};

/// Supply change rejected by the token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The change would push supply below the minimum.
    #[error("supply {requested} below minimum {min}")]
    BelowMinimum { requested: u128, min: u128 },

    /// The change would push supply above the maximum.
    #[error("supply {requested} above maximum {max}")]
    AboveMaximum { requested: u128, max: u128 },

    /// The new supply does not fit.
    #[error("supply overflow")]
    Overflow,

    /// The token could not be reached.
    #[error("token unavailable: {0}")]
    Unavailable(String),
}

/// A rebasing token.
pub trait RebaseToken: Send {
    /// Current total supply in base units.
    fn total_supply(&self) -> u128;

    /// Apply `delta` and return the new total supply.
    ///
    /// Must be atomic: on error the supply is unchanged.
    fn rebase(&mut self, delta: i128) -> std::result::Result<u128, TokenError>;
}

/// In-memory elastic supply with hard bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticSupply {
    supply: u128,
    min_supply: u128,
    max_supply: u128,
    epoch: u64,
}

impl ElasticSupply {
    /// # Errors
    ///
    /// - [`TokenError::BelowMinimum`] / [`TokenError::AboveMaximum`] if
    ///   `initial` lies outside `[min_supply, max_supply]`
    pub fn new(
        initial: u128,
        min_supply: u128,
        max_supply: u128,
    ) -> std::result::Result<Self, TokenError> {
        check_bounds(initial, min_supply, max_supply)?;
        Ok(Self {
            supply: initial,
            min_supply,
            max_supply,
            epoch: 0,
        })
    }

    /// Unbounded supply starting at `initial`.
    pub fn unbounded(initial: u128) -> Self {
        Self {
            supply: initial,
            min_supply: 0,
            max_supply: u128::MAX,
            epoch: 0,
        }
    }

    /// Number of non-zero rebases applied.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl RebaseToken for ElasticSupply {
    fn total_supply(&self) -> u128 {
        self.supply
    }

    fn rebase(&mut self, delta: i128) -> std::result::Result<u128, TokenError> {
        if delta == 0 {
            return Ok(self.supply);
        }
        let magnitude = delta.unsigned_abs();
        let next = if delta > 0 {
            self.supply.checked_add(magnitude).ok_or(TokenError::Overflow)?
        } else {
            self.supply
                .checked_sub(magnitude)
                .ok_or(TokenError::BelowMinimum {
                    requested: 0,
                    min: self.min_supply,
                })?
        };
        check_bounds(next, self.min_supply, self.max_supply)?;

        self.supply = next;
        self.epoch += 1;
        tracing::debug!(epoch = self.epoch, delta, supply = next, "supply rebased");
        Ok(next)
    }
}

fn check_bounds(supply: u128, min: u128, max: u128) -> std::result::Result<(), TokenError> {
    if supply < min {
        return Err(TokenError::BelowMinimum {
            requested: supply,
            min,
        });
    }
    if supply > max {
        return Err(TokenError::AboveMaximum {
            requested: supply,
            max,
        });
    }
    Ok(())
}
