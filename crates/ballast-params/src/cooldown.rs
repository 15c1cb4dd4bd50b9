//! Dynamic rebase cooldown.
//!
//! ```text
//! cooldown = base
//! if volatility > threshold:  cooldown = cooldown * threshold / volatility
//! cooldown += min(stable_duration * stability_bonus_rate, max_stability_bonus)
//! cooldown += consecutive_rebases * consecutive_penalty
//! cooldown  = clamp(cooldown, max(min_cooldown, band.min_cooldown), max_cooldown)
//! ```
//!
//! High volatility shortens the wait so the controller can react; a long
//! stable stretch and a run of back-to-back rebases both lengthen it.

use serde::{Deserialize, Serialize};

use ballast_types::fixed::{mul_div, mul_wad};
use ballast_types::{Wad, WAD};

use crate::bands::StabilityBand;
use crate::{ParamsError, Result};

const HOUR: u64 = 60 * 60;

/// Cooldown policy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownPolicy {
    /// Starting cooldown in seconds.
    pub base_cooldown: u64,
    /// Global lower bound in seconds.
    pub min_cooldown: u64,
    /// Global upper bound in seconds.
    pub max_cooldown: u64,
    /// Volatility above which the cooldown shrinks, 18 decimals.
    pub volatility_threshold: Wad,
    /// Seconds of bonus per second of stability, 18 decimals.
    pub stability_bonus_rate: Wad,
    /// Cap on the stability bonus in seconds.
    pub max_stability_bonus: u64,
    /// Seconds added per consecutive rebase.
    pub consecutive_penalty: u64,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            base_cooldown: 12 * HOUR,
            min_cooldown: HOUR,
            max_cooldown: 48 * HOUR,
            volatility_threshold: WAD / 20,
            stability_bonus_rate: WAD / 10,
            max_stability_bonus: 6 * HOUR,
            consecutive_penalty: 2 * HOUR,
        }
    }
}

impl CooldownPolicy {
    /// # Errors
    ///
    /// - [`ParamsError::InvalidParameter`] unless
    ///   `0 < min_cooldown <= base_cooldown <= max_cooldown` and the
    ///   volatility threshold is positive
    pub fn validate(&self) -> Result<()> {
        if self.min_cooldown == 0 {
            return Err(ParamsError::InvalidParameter(
                "min_cooldown must be positive".to_string(),
            ));
        }
        if self.min_cooldown > self.base_cooldown || self.base_cooldown > self.max_cooldown {
            return Err(ParamsError::InvalidParameter(format!(
                "cooldowns must satisfy min {} <= base {} <= max {}",
                self.min_cooldown, self.base_cooldown, self.max_cooldown
            )));
        }
        if self.volatility_threshold == 0 {
            return Err(ParamsError::InvalidParameter(
                "volatility_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Controller history the cooldown depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StabilityContext {
    /// Seconds since the deviation last left band 0.
    pub stable_duration: u64,
    /// Rebases since the last low-deviation reset.
    pub consecutive_rebases: u32,
}

/// Compute the cooldown for a rebase at `band` severity.
///
/// # Errors
///
/// - [`ParamsError::ArithmeticOverflow`] if an intermediate product overflows
pub fn calculate_dynamic_cooldown(
    policy: &CooldownPolicy,
    band: &StabilityBand,
    recent_volatility: Wad,
    context: &StabilityContext,
) -> Result<u64> {
    let mut cooldown = u128::from(policy.base_cooldown);

    if recent_volatility > policy.volatility_threshold {
        cooldown = mul_div(cooldown, policy.volatility_threshold, recent_volatility)?;
    }

    let bonus = mul_wad(
        u128::from(context.stable_duration),
        policy.stability_bonus_rate,
    )?
    .min(u128::from(policy.max_stability_bonus));
    cooldown = cooldown.saturating_add(bonus);

    let penalty =
        u128::from(context.consecutive_rebases).saturating_mul(u128::from(policy.consecutive_penalty));
    cooldown = cooldown.saturating_add(penalty);

    let ceiling = policy.max_cooldown;
    let floor = policy.min_cooldown.max(band.min_cooldown).min(ceiling);
    let clamped = cooldown.clamp(u128::from(floor), u128::from(ceiling));

    tracing::trace!(
        volatility = recent_volatility,
        stable_duration = context.stable_duration,
        consecutive = context.consecutive_rebases,
        cooldown = clamped,
        "dynamic cooldown computed"
    );
    Ok(u64::try_from(clamped).unwrap_or(ceiling))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A band that never raises the floor.
    fn lenient_band() -> StabilityBand {
        StabilityBand {
            threshold: WAD / 100,
            damping_factor: WAD / 2,
            max_rebase_amount: WAD / 20,
            min_cooldown: 0,
        }
    }

    fn cooldown(volatility: Wad, context: StabilityContext) -> u64 {
        calculate_dynamic_cooldown(&CooldownPolicy::default(), &lenient_band(), volatility, &context)
            .expect("cooldown")
    }

    #[test]
    fn test_calm_market_uses_base() {
        assert_eq!(cooldown(0, StabilityContext::default()), 12 * HOUR);
        assert_eq!(cooldown(WAD / 20, StabilityContext::default()), 12 * HOUR);
    }

    #[test]
    fn test_high_volatility_shortens_inversely() {
        // twice the threshold halves the cooldown
        assert_eq!(cooldown(WAD / 10, StabilityContext::default()), 6 * HOUR);
        // forty times the threshold would be 18 minutes; clamped to the 1h floor
        assert_eq!(cooldown(2 * WAD, StabilityContext::default()), HOUR);
    }

    #[test]
    fn test_stability_bonus_is_capped() {
        let ten_hours = StabilityContext {
            stable_duration: 10 * HOUR,
            consecutive_rebases: 0,
        };
        assert_eq!(cooldown(0, ten_hours), 13 * HOUR);

        let ten_days = StabilityContext {
            stable_duration: 240 * HOUR,
            consecutive_rebases: 0,
        };
        assert_eq!(cooldown(0, ten_days), 18 * HOUR);
    }

    #[test]
    fn test_consecutive_penalty_and_ceiling() {
        let three = StabilityContext {
            stable_duration: 0,
            consecutive_rebases: 3,
        };
        assert_eq!(cooldown(0, three), 18 * HOUR);

        let many = StabilityContext {
            stable_duration: 0,
            consecutive_rebases: 100,
        };
        assert_eq!(cooldown(0, many), 48 * HOUR);
    }

    #[test]
    fn test_band_floor_applies() {
        let band = StabilityBand {
            min_cooldown: 24 * HOUR,
            ..lenient_band()
        };
        let result = calculate_dynamic_cooldown(
            &CooldownPolicy::default(),
            &band,
            0,
            &StabilityContext::default(),
        )
        .expect("cooldown");
        assert_eq!(result, 24 * HOUR);
    }

    #[test]
    fn test_band_floor_never_exceeds_ceiling() {
        let band = StabilityBand {
            min_cooldown: 100 * HOUR,
            ..lenient_band()
        };
        let result = calculate_dynamic_cooldown(
            &CooldownPolicy::default(),
            &band,
            0,
            &StabilityContext::default(),
        )
        .expect("cooldown");
        assert_eq!(result, 48 * HOUR);
    }

    #[test]
    fn test_policy_validation() {
        assert!(CooldownPolicy::default().validate().is_ok());
        let inverted = CooldownPolicy {
            min_cooldown: 10 * HOUR,
            base_cooldown: HOUR,
            ..CooldownPolicy::default()
        };
        assert!(inverted.validate().is_err());
        let zero = CooldownPolicy {
            min_cooldown: 0,
            ..CooldownPolicy::default()
        };
        assert!(zero.validate().is_err());
    }
}
