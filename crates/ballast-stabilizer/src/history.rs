//! Append-only rebase log.

use ballast_types::{RebaseRecord, Timestamp};

/// Every executed rebase attempt, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RebaseHistory {
    records: Vec<RebaseRecord>,
}

impl RebaseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, record: RebaseRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&RebaseRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RebaseRecord> {
        self.records.iter()
    }

    /// Records with `from <= timestamp <= to`.
    pub fn range(&self, from: Timestamp, to: Timestamp) -> Vec<&RebaseRecord> {
        self.records
            .iter()
            .filter(|r| r.timestamp >= from && r.timestamp <= to)
            .collect()
    }

    /// The newest `count` records, oldest first.
    pub fn recent(&self, count: usize) -> &[RebaseRecord] {
        let start = self.records.len().saturating_sub(count);
        &self.records[start..]
    }
}

impl From<Vec<RebaseRecord>> for RebaseHistory {
    fn from(records: Vec<RebaseRecord>) -> Self {
        Self { records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: Timestamp, supply_delta: i128) -> RebaseRecord {
        RebaseRecord {
            timestamp,
            price: 0,
            supply_delta,
            new_supply: 0,
            band: 0,
            deviation: 0,
            circuit_breaker_triggered: false,
        }
    }

    #[test]
    fn test_append_and_query() {
        let mut history = RebaseHistory::new();
        assert!(history.latest().is_none());
        for (t, d) in [(100, 5), (200, 0), (300, -5)] {
            history.append(record(t, d));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().map(|r| r.timestamp), Some(300));

        let range: Vec<Timestamp> = history.range(150, 300).iter().map(|r| r.timestamp).collect();
        assert_eq!(range, vec![200, 300]);
        assert!(history.range(301, 400).is_empty());

        let recent: Vec<i128> = history.recent(2).iter().map(|r| r.supply_delta).collect();
        assert_eq!(recent, vec![0, -5]);
        assert_eq!(history.recent(10).len(), 3);
    }
}
