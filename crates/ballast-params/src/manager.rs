//! The parameter strategy queried by the stabilizer.

use ballast_types::Wad;

use crate::bands::{BandTable, StabilityBand};
use crate::cooldown::{calculate_dynamic_cooldown, CooldownPolicy, StabilityContext};
use crate::Result;

/// Source of band configuration and cooldown lengths.
///
/// Implementations are read-only from the controller's point of view.
pub trait ParameterStrategy: Send + Sync {
    /// Seconds to wait before the next rebase.
    fn calculate_dynamic_cooldown(
        &self,
        deviation: Wad,
        recent_volatility: Wad,
        context: &StabilityContext,
    ) -> Result<u64>;

    /// Band configuration best suited to `deviation`.
    fn get_optimal_stability_band(&self, deviation: Wad) -> &StabilityBand;
}

/// Default [`ParameterStrategy`]: a band table plus a cooldown policy.
#[derive(Debug, Clone, Default)]
pub struct EconomicParameterManager {
    bands: BandTable,
    policy: CooldownPolicy,
}

impl EconomicParameterManager {
    /// # Errors
    ///
    /// - [`ParamsError::InvalidParameter`](crate::ParamsError::InvalidParameter) if `policy` is inconsistent
    pub fn new(bands: BandTable, policy: CooldownPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { bands, policy })
    }

    pub fn bands(&self) -> &BandTable {
        &self.bands
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    /// Replace the cooldown policy.
    pub fn set_policy(&mut self, policy: CooldownPolicy) -> Result<()> {
        policy.validate()?;
        tracing::info!(
            base = policy.base_cooldown,
            min = policy.min_cooldown,
            max = policy.max_cooldown,
            "cooldown policy updated"
        );
        self.policy = policy;
        Ok(())
    }

    /// Replace the band table.
    pub fn set_bands(&mut self, bands: BandTable) {
        tracing::info!(count = bands.len(), "parameter bands updated");
        self.bands = bands;
    }
}

impl ParameterStrategy for EconomicParameterManager {
    fn calculate_dynamic_cooldown(
        &self,
        deviation: Wad,
        recent_volatility: Wad,
        context: &StabilityContext,
    ) -> Result<u64> {
        let band = self.bands.optimal(deviation);
        calculate_dynamic_cooldown(&self.policy, band, recent_volatility, context)
    }

    fn get_optimal_stability_band(&self, deviation: Wad) -> &StabilityBand {
        self.bands.optimal(deviation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_types::WAD;

    const HOUR: u64 = 3_600;

    #[test]
    fn test_floor_follows_optimal_band() {
        let manager = EconomicParameterManager::default();
        let calm = StabilityContext::default();

        // 0.5%: optimal band is band 1 (24h floor)
        let small = manager
            .calculate_dynamic_cooldown(WAD / 200, 0, &calm)
            .expect("cooldown");
        assert_eq!(small, 24 * HOUR);

        // 15%: optimal band is band 4 (1h floor), base applies
        let large = manager
            .calculate_dynamic_cooldown(WAD * 15 / 100, 0, &calm)
            .expect("cooldown");
        assert_eq!(large, 12 * HOUR);
    }

    #[test]
    fn test_optimal_band_via_trait_object() {
        let strategy: Box<dyn ParameterStrategy> = Box::new(EconomicParameterManager::default());
        assert_eq!(
            strategy.get_optimal_stability_band(WAD / 10).threshold,
            WAD / 10
        );
        assert_eq!(
            strategy.get_optimal_stability_band(WAD).threshold,
            WAD / 5
        );
    }

    #[test]
    fn test_rejects_invalid_policy() {
        let policy = CooldownPolicy {
            max_cooldown: 1,
            ..CooldownPolicy::default()
        };
        assert!(EconomicParameterManager::new(BandTable::default(), policy).is_err());

        let mut manager = EconomicParameterManager::default();
        assert!(manager.set_policy(policy).is_err());
        assert_eq!(manager.policy(), &CooldownPolicy::default());
    }
}
