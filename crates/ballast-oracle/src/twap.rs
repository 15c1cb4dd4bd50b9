//! TWAP (Time-Weighted Average Price) over recorded aggregate prices.
//!
//! ```text
//! TWAP = sum(price_i * duration_i) / sum(duration_i)
//! ```
//!
//! `duration_i` is the time until the next recorded point and `price_i` the
//! price that prevailed during it. The last point closes the window and
//! carries no weight of its own.

use ballast_types::{ArithmeticError, Wad};

use crate::history::PricePoint;
use crate::{OracleError, Result};

/// Minimum number of points for a valid TWAP.
pub const MIN_OBSERVATIONS: usize = 3;

/// Compute the TWAP over `points`, which must be sorted by timestamp.
///
/// # Errors
///
/// - [`OracleError::InsufficientObservations`] if fewer than [`MIN_OBSERVATIONS`] points
/// - [`OracleError::NonMonotonicTimestamp`] if timestamps are not strictly increasing
/// - [`OracleError::EmptyWindow`] if the total duration is zero
/// - [`OracleError::ArithmeticOverflow`] if the weighted sum overflows
pub fn compute_twap(points: &[PricePoint]) -> Result<Wad> {
    if points.len() < MIN_OBSERVATIONS {
        return Err(OracleError::InsufficientObservations {
            required: MIN_OBSERVATIONS,
            available: points.len(),
        });
    }

    for pair in points.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(OracleError::NonMonotonicTimestamp {
                new: pair[1].timestamp,
                last: pair[0].timestamp,
            });
        }
    }

    let mut weighted_sum: u128 = 0;
    let mut total_duration: u128 = 0;

    for pair in points.windows(2) {
        let duration = u128::from(pair[1].timestamp - pair[0].timestamp);
        let weighted = pair[0]
            .price
            .checked_mul(duration)
            .ok_or(ArithmeticError::Overflow)?;
        weighted_sum = weighted_sum
            .checked_add(weighted)
            .ok_or(ArithmeticError::Overflow)?;
        total_duration += duration;
    }

    if total_duration == 0 {
        return Err(OracleError::EmptyWindow);
    }

    // Integer division; truncates toward zero
    Ok(weighted_sum / total_duration)
}
