//! Stability bands.
//!
//! A band is a severity tier of deviation from the peg. Bands are indexed
//! from 1 in ascending threshold order; index 0 is the implicit "no action"
//! band for deviations below the first threshold.
//!
//! ## Default Bands
//!
//! | Band | Threshold | Damping | Max rebase | Min cooldown |
//! |---|---|---|---|---|
//! | 1 | 1% | 10% | 1% | 24 h |
//! | 2 | 5% | 25% | 2.5% | 12 h |
//! | 3 | 10% | 50% | 5% | 6 h |
//! | 4 | 20% | 75% | 10% | 1 h |
//!
//! A deviation at or above the highest threshold trips the circuit breaker.

use serde::{Deserialize, Serialize};

use ballast_types::fixed::from_bps;
use ballast_types::{Wad, WAD};

use crate::{ParamsError, Result};

/// Maximum number of configured bands.
pub const MAX_BANDS: usize = 10;

const HOUR: u64 = 60 * 60;

/// One severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityBand {
    /// Lowest deviation classified into this band, 18 decimals.
    pub threshold: Wad,
    /// Fraction of the raw correction actually applied.
    pub damping_factor: Wad,
    /// Cap on a single adjustment as a fraction of supply.
    pub max_rebase_amount: Wad,
    /// Minimum seconds between rebases at this severity.
    pub min_cooldown: u64,
}

impl StabilityBand {
    /// Build a band from basis-point values.
    pub fn from_bps(threshold: u32, damping: u32, max_rebase: u32, min_cooldown: u64) -> Self {
        Self {
            threshold: from_bps(threshold),
            damping_factor: from_bps(damping),
            max_rebase_amount: from_bps(max_rebase),
            min_cooldown,
        }
    }
}

/// Validated, strictly ascending set of bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandTable {
    bands: Vec<StabilityBand>,
}

impl BandTable {
    /// Validate and wrap `bands`.
    ///
    /// # Errors
    ///
    /// - [`ParamsError::InvalidBand`] if the table is empty or too long, a
    ///   threshold is zero or not strictly above its predecessor, or a
    ///   fraction lies outside `(0, 1]`
    pub fn new(bands: Vec<StabilityBand>) -> Result<Self> {
        if bands.is_empty() || bands.len() > MAX_BANDS {
            return Err(ParamsError::InvalidBand(format!(
                "expected 1..={MAX_BANDS} bands, got {}",
                bands.len()
            )));
        }
        let mut previous: Wad = 0;
        for (i, band) in bands.iter().enumerate() {
            let index = i + 1;
            if band.threshold <= previous {
                return Err(ParamsError::InvalidBand(format!(
                    "band {index} threshold must be above {previous}"
                )));
            }
            if band.damping_factor == 0 || band.damping_factor > WAD {
                return Err(ParamsError::InvalidBand(format!(
                    "band {index} damping factor outside (0, 1]"
                )));
            }
            if band.max_rebase_amount == 0 || band.max_rebase_amount > WAD {
                return Err(ParamsError::InvalidBand(format!(
                    "band {index} max rebase amount outside (0, 1]"
                )));
            }
            previous = band.threshold;
        }
        Ok(Self { bands })
    }

    /// Number of configured bands.
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StabilityBand> {
        self.bands.iter()
    }

    /// Band by 1-based index.
    pub fn get(&self, index: u8) -> Option<&StabilityBand> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
    }

    /// Highest band.
    pub fn top(&self) -> &StabilityBand {
        // new() rejects empty tables
        &self.bands[self.bands.len() - 1]
    }

    /// Threshold of band `index`, or of the highest band when the table is shorter.
    pub fn threshold_or_top(&self, index: u8) -> Wad {
        self.get(index).unwrap_or_else(|| self.top()).threshold
    }

    /// Index of the highest band whose threshold is at or below `deviation`;
    /// 0 when the deviation is below every threshold.
    pub fn classify(&self, deviation: Wad) -> u8 {
        let count = self
            .bands
            .iter()
            .take_while(|b| b.threshold <= deviation)
            .count();
        // MAX_BANDS fits in u8
        u8::try_from(count).unwrap_or(u8::MAX)
    }

    /// First band whose threshold is at or above `deviation`, else the highest.
    pub fn optimal(&self, deviation: Wad) -> &StabilityBand {
        self.bands
            .iter()
            .find(|b| b.threshold >= deviation)
            .unwrap_or_else(|| self.top())
    }
}

impl Default for BandTable {
    fn default() -> Self {
        Self {
            bands: default_bands(),
        }
    }
}

/// The four default bands.
pub fn default_bands() -> Vec<StabilityBand> {
    vec![
        StabilityBand::from_bps(100, 1_000, 100, 24 * HOUR),
        StabilityBand::from_bps(500, 2_500, 250, 12 * HOUR),
        StabilityBand::from_bps(1_000, 5_000, 500, 6 * HOUR),
        StabilityBand::from_bps(2_000, 7_500, 1_000, HOUR),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(n: u128) -> Wad {
        WAD * n / 100
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = BandTable::new(default_bands()).expect("defaults");
        assert_eq!(table.len(), 4);
        assert_eq!(table, BandTable::default());
        assert_eq!(table.top().threshold, pct(20));
    }

    #[test]
    fn test_classify() {
        let table = BandTable::default();
        assert_eq!(table.classify(0), 0);
        assert_eq!(table.classify(pct(1) - 1), 0);
        assert_eq!(table.classify(pct(1)), 1);
        assert_eq!(table.classify(pct(7)), 2);
        assert_eq!(table.classify(pct(10)), 3);
        assert_eq!(table.classify(pct(25)), 4);
    }

    #[test]
    fn test_band_index_monotonic_in_deviation() {
        let table = BandTable::default();
        let mut previous = 0;
        // 0% to 30% in 0.05% steps
        for step in 0..=600u128 {
            let band = table.classify(WAD * step / 2_000);
            assert!(band >= previous, "band dropped at step {step}");
            previous = band;
        }
        assert_eq!(previous, 4);
    }

    #[test]
    fn test_optimal_band() {
        let table = BandTable::default();
        assert_eq!(table.optimal(0).threshold, pct(1));
        assert_eq!(table.optimal(pct(3)).threshold, pct(5));
        assert_eq!(table.optimal(pct(10)).threshold, pct(10));
        assert_eq!(table.optimal(pct(50)).threshold, pct(20));
    }

    #[test]
    fn test_get_is_one_based() {
        let table = BandTable::default();
        assert!(table.get(0).is_none());
        assert_eq!(table.get(1).map(|b| b.threshold), Some(pct(1)));
        assert!(table.get(5).is_none());
        assert_eq!(table.threshold_or_top(3), pct(10));
        assert_eq!(table.threshold_or_top(9), pct(20));
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let mut bands = default_bands();
        bands.swap(1, 2);
        assert!(matches!(
            BandTable::new(bands),
            Err(ParamsError::InvalidBand(_))
        ));

        let mut bands = default_bands();
        bands[1].threshold = bands[0].threshold;
        assert!(BandTable::new(bands).is_err());
    }

    #[test]
    fn test_rejects_bad_fractions() {
        let mut bands = default_bands();
        bands[0].damping_factor = 0;
        assert!(BandTable::new(bands).is_err());

        let mut bands = default_bands();
        bands[3].max_rebase_amount = WAD + 1;
        assert!(BandTable::new(bands).is_err());

        assert!(BandTable::new(Vec::new()).is_err());
    }
}
