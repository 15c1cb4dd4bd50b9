//! Median-based outlier removal.
//!
//! A single deterministic pass: compute the median of the valid prices and
//! drop every entry whose relative distance from it exceeds the threshold.
//!
//! ```text
//! keep(p) <=> |p - median| / median <= threshold
//! ```
//!
//! Filtering only applies once at least [`MIN_ENTRIES_FOR_FILTER`] entries
//! are present; with fewer there is no meaningful majority to compare against.

use ballast_types::fixed::relative_deviation;
use ballast_types::{Timestamp, Wad, WAD};

use crate::Result;

/// Default outlier threshold: 15%.
pub const DEFAULT_OUTLIER_THRESHOLD: Wad = WAD * 15 / 100;

/// Minimum number of entries before outlier removal runs.
pub const MIN_ENTRIES_FOR_FILTER: usize = 3;

/// A normalized reading that passed per-source validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPrice {
    /// Source key.
    pub key: String,
    /// Price, 18 decimals.
    pub price: Wad,
    /// Source weight.
    pub weight: u32,
    /// Report timestamp.
    pub updated_at: Timestamp,
}

/// Median of `prices`; the truncated mean of the two middle values for even
/// counts. `None` for an empty slice.
pub fn median(prices: &[Wad]) -> Option<Wad> {
    if prices.is_empty() {
        return None;
    }
    let mut sorted = prices.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let (a, b) = (sorted[mid - 1], sorted[mid]);
        // floor((a + b) / 2) without overflowing
        Some(a / 2 + b / 2 + (a % 2 + b % 2) / 2)
    }
}

/// Return the entries within `threshold` of the median, in input order.
///
/// Inputs shorter than [`MIN_ENTRIES_FOR_FILTER`] are returned unchanged.
///
/// # Errors
///
/// - [`OracleError::ArithmeticOverflow`](crate::OracleError::ArithmeticOverflow)
///   if the median is zero or a deviation overflows
pub fn remove_outliers(entries: &[ValidPrice], threshold: Wad) -> Result<Vec<ValidPrice>> {
    if entries.len() < MIN_ENTRIES_FOR_FILTER {
        return Ok(entries.to_vec());
    }

    let prices: Vec<Wad> = entries.iter().map(|e| e.price).collect();
    let Some(mid) = median(&prices) else {
        return Ok(Vec::new());
    };

    let mut survivors = Vec::with_capacity(entries.len());
    for entry in entries {
        let deviation = relative_deviation(entry.price, mid)?;
        if deviation > threshold {
            tracing::debug!(
                key = %entry.key,
                price = entry.price,
                median = mid,
                deviation,
                "outlier removed"
            );
            continue;
        }
        survivors.push(entry.clone());
    }
    Ok(survivors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, price: Wad, weight: u32) -> ValidPrice {
        ValidPrice {
            key: key.to_string(),
            price,
            weight,
            updated_at: 1_000,
        }
    }

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[30, 10, 20]), Some(20));
    }

    #[test]
    fn test_median_even_truncates() {
        assert_eq!(median(&[100, 101, 99, 1000]), Some(100));
        assert_eq!(median(&[4, 1, 3, 2]), Some(2));
    }

    #[test]
    fn test_median_even_large_values() {
        assert_eq!(median(&[u128::MAX, u128::MAX]), Some(u128::MAX));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_removes_ten_x_outlier() {
        let entries = vec![
            entry("a", 100 * WAD, 1),
            entry("b", 101 * WAD, 2),
            entry("c", 99 * WAD, 3),
            entry("d", 1000 * WAD, 4),
        ];
        let survivors = remove_outliers(&entries, DEFAULT_OUTLIER_THRESHOLD).expect("filter");
        let keys: Vec<&str> = survivors.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        // weights travel with their prices
        assert_eq!(survivors[2].weight, 3);
    }

    #[test]
    fn test_two_entries_never_filtered() {
        let entries = vec![entry("a", WAD, 1), entry("b", 5 * WAD, 1)];
        let survivors = remove_outliers(&entries, DEFAULT_OUTLIER_THRESHOLD).expect("filter");
        assert_eq!(survivors.len(), 2);
    }

    #[test]
    fn test_boundary_is_kept() {
        // exactly 15% above the median stays
        let entries = vec![
            entry("a", WAD, 1),
            entry("b", WAD, 1),
            entry("c", WAD + DEFAULT_OUTLIER_THRESHOLD, 1),
        ];
        let survivors = remove_outliers(&entries, DEFAULT_OUTLIER_THRESHOLD).expect("filter");
        assert_eq!(survivors.len(), 3);
    }

    #[test]
    fn test_low_outlier_removed() {
        let entries = vec![
            entry("a", WAD, 1),
            entry("b", WAD, 1),
            entry("c", WAD / 2, 1),
        ];
        let survivors = remove_outliers(&entries, DEFAULT_OUTLIER_THRESHOLD).expect("filter");
        assert_eq!(survivors.len(), 2);
        assert!(survivors.iter().all(|e| e.price == WAD));
    }
}
