//! Bounded ring buffer of recorded aggregate prices.
//!
//! Once `capacity` points are stored, each new point overwrites the oldest.
//! `cursor` always names the slot the next point will be written to.

use serde::{Deserialize, Serialize};

use ballast_types::fixed::relative_deviation;
use ballast_types::{AggregatedPrice, Timestamp, Wad};

use crate::Result;

/// Default number of retained points.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One recorded aggregate price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// When the price was recorded.
    pub timestamp: Timestamp,
    /// Aggregated price, 18 decimals.
    pub price: Wad,
    /// Confidence at record time.
    pub confidence: u8,
}

impl PricePoint {
    /// Build a point from an aggregate recorded at `now`.
    pub fn recorded(now: Timestamp, aggregate: &AggregatedPrice) -> Self {
        Self {
            timestamp: now,
            price: aggregate.price,
            confidence: aggregate.confidence,
        }
    }
}

/// Fixed-capacity circular buffer of [`PricePoint`]s.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    slots: Vec<PricePoint>,
    cursor: usize,
    capacity: usize,
}

impl PriceHistory {
    /// Create an empty history. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Append a point, overwriting the oldest when full.
    pub fn push(&mut self, point: PricePoint) {
        if self.slots.len() < self.capacity {
            self.slots.push(point);
        } else {
            self.slots[self.cursor] = point;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of stored points.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed point.
    pub fn latest(&self) -> Option<&PricePoint> {
        if self.slots.is_empty() {
            return None;
        }
        let len = self.slots.len();
        self.slots.get((self.cursor + len - 1) % len)
    }

    /// Points from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        let split = if self.slots.len() < self.capacity {
            0
        } else {
            self.cursor
        };
        let (newer, older) = self.slots.split_at(split);
        older.iter().chain(newer.iter())
    }

    /// Points recorded at or after `since`, oldest first.
    pub fn since(&self, since: Timestamp) -> Vec<PricePoint> {
        self.iter()
            .filter(|p| p.timestamp >= since)
            .copied()
            .collect()
    }

    /// The newest `count` points, oldest first.
    pub fn recent(&self, count: usize) -> Vec<PricePoint> {
        let skip = self.len().saturating_sub(count);
        self.iter().skip(skip).copied().collect()
    }

    /// Mean absolute relative change between consecutive points.
    ///
    /// ```text
    /// volatility = sum(|p_i - p_{i-1}| / p_{i-1}) / (n - 1)
    /// ```
    ///
    /// Returns zero with fewer than two points.
    pub fn volatility(&self) -> Result<Wad> {
        let points: Vec<&PricePoint> = self.iter().collect();
        if points.len() < 2 {
            return Ok(0);
        }

        let mut total: Wad = 0;
        for pair in points.windows(2) {
            let change = relative_deviation(pair[1].price, pair[0].price)?;
            total = total
                .checked_add(change)
                .ok_or(ballast_types::ArithmeticError::Overflow)?;
        }
        Ok(total / (points.len() as u128 - 1))
    }
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_types::WAD;

    fn point(timestamp: u64, price: Wad) -> PricePoint {
        PricePoint {
            timestamp,
            price,
            confidence: 100,
        }
    }

    #[test]
    fn test_push_until_full() {
        let mut history = PriceHistory::new(3);
        assert!(history.is_empty());
        assert!(history.latest().is_none());

        history.push(point(1, WAD));
        history.push(point(2, WAD));
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().map(|p| p.timestamp), Some(2));
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut history = PriceHistory::new(3);
        for t in 1..=5 {
            history.push(point(t, WAD));
        }
        assert_eq!(history.len(), 3);
        let stamps: Vec<u64> = history.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![3, 4, 5]);
        assert_eq!(history.latest().map(|p| p.timestamp), Some(5));
    }

    #[test]
    fn test_wraps_exactly_at_capacity() {
        let mut history = PriceHistory::new(2);
        history.push(point(10, WAD));
        history.push(point(20, WAD));
        let stamps: Vec<u64> = history.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![10, 20]);
        assert_eq!(history.latest().map(|p| p.timestamp), Some(20));
    }

    #[test]
    fn test_zero_capacity_raised() {
        let mut history = PriceHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.push(point(1, WAD));
        history.push(point(2, WAD));
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().map(|p| p.timestamp), Some(2));
    }

    #[test]
    fn test_since_and_recent() {
        let mut history = PriceHistory::new(10);
        for t in [100, 200, 300, 400] {
            history.push(point(t, WAD));
        }
        let stamps: Vec<u64> = history.since(250).iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![300, 400]);
        let stamps: Vec<u64> = history.recent(3).iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![200, 300, 400]);
    }

    #[test]
    fn test_volatility() {
        let mut history = PriceHistory::new(10);
        assert_eq!(history.volatility().expect("empty"), 0);

        // +10% then -10%, each relative to the previous point
        history.push(point(1, 100 * WAD));
        history.push(point(2, 110 * WAD));
        history.push(point(3, 99 * WAD));
        let vol = history.volatility().expect("vol");
        assert_eq!(vol, (WAD / 10 + WAD / 10) / 2);
    }

    #[test]
    fn test_flat_history_has_zero_volatility() {
        let mut history = PriceHistory::new(4);
        for t in 0..6 {
            history.push(point(t, WAD));
        }
        assert_eq!(history.volatility().expect("vol"), 0);
    }
}
