//! Aggregated oracle price.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, Wad};

/// The result of aggregating every active oracle source.
///
/// `timestamp` is the oldest timestamp among the sources that survived
/// filtering, so the age of an aggregated price is bounded by its stalest
/// contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedPrice {
    /// Weighted average price, 18 decimals.
    pub price: Wad,
    /// Oldest contributing timestamp.
    pub timestamp: Timestamp,
    /// Surviving sources as a percentage of active configured sources.
    pub confidence: u8,
}

impl AggregatedPrice {
    /// Seconds elapsed since `timestamp`, saturating at zero for future stamps.
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WAD;

    #[test]
    fn test_age_saturates() {
        let price = AggregatedPrice {
            price: WAD,
            timestamp: 1_000,
            confidence: 100,
        };
        assert_eq!(price.age(1_600), 600);
        assert_eq!(price.age(900), 0);
    }
}
