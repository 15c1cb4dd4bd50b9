//! Configuration file management.
//!
//! Loaded from `$BALLAST_DATA_DIR/config.toml` (default `~/.ballast`).
//! Every field has a default. Prices and fractions are written in basis
//! points because TOML integers cannot hold 18-decimal values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use ballast_oracle::{AggregatorConfig, SourceParams};
use ballast_params::{BandTable, CooldownPolicy, StabilityBand};
use ballast_stabilizer::ControllerConfig;
use ballast_types::fixed::from_bps;

/// Invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("oracle config: {0}")]
    Oracle(#[from] ballast_oracle::OracleError),

    #[error("stabilizer config: {0}")]
    Stabilizer(#[from] ballast_stabilizer::StabilizerError),

    #[error("params config: {0}")]
    Params(#[from] ballast_params::ParamsError),

    #[error("token config: {0}")]
    Token(#[from] ballast_stabilizer::TokenError),
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Oracle aggregation settings and sources.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Controller settings and stability bands.
    #[serde(default)]
    pub stabilizer: StabilizerConfig,
    /// Dynamic cooldown policy.
    #[serde(default)]
    pub params: ParamsConfig,
    /// Elastic supply settings.
    #[serde(default)]
    pub token: TokenConfig,
    /// Administrative callers.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_min_oracles")]
    pub min_oracles_for_consensus: usize,
    /// Lowest acceptable price (10000 = $1.00).
    #[serde(default = "default_min_price_bps")]
    pub min_price_bps: u32,
    /// Highest acceptable price (10000 = $1.00).
    #[serde(default = "default_max_price_bps")]
    pub max_price_bps: u32,
    /// Distance from the median beyond which a report is discarded.
    #[serde(default = "default_outlier_threshold_bps")]
    pub outlier_threshold_bps: u32,
    /// Aggregate confidence at which the oracle counts as healthy.
    #[serde(default = "default_healthy_confidence")]
    pub healthy_confidence: u8,
    /// Recorded prices kept in memory.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Price reported in emergency mode.
    #[serde(default = "default_target_bps")]
    pub fallback_price_bps: u32,
    /// Price sources registered at startup.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

/// A configured price source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub key: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Maximum report age in seconds.
    #[serde(default = "default_heartbeat")]
    pub heartbeat: u64,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub feed: FeedKind,
}

/// Where a source's readings come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedKind {
    /// A constant price in native decimals, stamped with the current time.
    Fixed { price: i64 },
    /// A JSON file `{"price": <int>, "updated_at": <unix secs>}` re-read on
    /// every query.
    File { path: String },
}

/// Stabilizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizerConfig {
    #[serde(default = "default_target_bps")]
    pub target_price_bps: u32,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,
    /// Seconds.
    #[serde(default = "default_max_price_age")]
    pub max_price_age: u64,
    /// Fixed cooldown in seconds, used when dynamic cooldowns are disabled.
    #[serde(default = "default_rebase_cooldown")]
    pub rebase_cooldown: u64,
    #[serde(default = "default_max_rebase_bps")]
    pub max_rebase_percentage_bps: u32,
    #[serde(default = "default_max_rebase_bps")]
    pub max_supply_change_bps: u32,
    #[serde(default = "default_dust_threshold_bps")]
    pub dust_threshold_bps: u32,
    /// Seconds the breaker stays active before automatic recovery.
    #[serde(default = "default_breaker_cooldown")]
    pub breaker_cooldown: u64,
    #[serde(default = "default_auto_recovery_bps")]
    pub auto_recovery_threshold_bps: u32,
    #[serde(default = "default_max_consecutive")]
    pub max_consecutive_rebases: u32,
    /// Stability bands, lowest threshold first.
    #[serde(default = "default_bands")]
    pub bands: Vec<BandConfig>,
}

/// One stability band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandConfig {
    pub threshold_bps: u32,
    pub damping_bps: u32,
    pub max_rebase_bps: u32,
    /// Seconds.
    pub min_cooldown: u64,
}

/// Dynamic cooldown policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsConfig {
    /// Use the dynamic cooldown instead of `stabilizer.rebase_cooldown`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_base_cooldown")]
    pub base_cooldown: u64,
    #[serde(default = "default_policy_min_cooldown")]
    pub min_cooldown: u64,
    #[serde(default = "default_policy_max_cooldown")]
    pub max_cooldown: u64,
    #[serde(default = "default_volatility_threshold_bps")]
    pub volatility_threshold_bps: u32,
    #[serde(default = "default_stability_bonus_rate_bps")]
    pub stability_bonus_rate_bps: u32,
    #[serde(default = "default_max_stability_bonus")]
    pub max_stability_bonus: u64,
    #[serde(default = "default_consecutive_penalty")]
    pub consecutive_penalty: u64,
}

/// Elastic supply configuration (base units).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_initial_supply")]
    pub initial_supply: u64,
    #[serde(default)]
    pub min_supply: u64,
    /// Zero means unbounded.
    #[serde(default)]
    pub max_supply: u64,
}

/// Administrative access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Caller names allowed to perform privileged operations.
    #[serde(default = "default_callers")]
    pub callers: Vec<String>,
    /// Caller identity the scheduler uses for its own actions.
    #[serde(default = "default_operator")]
    pub operator: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Seconds of price observations kept in the database.
    #[serde(default = "default_price_retention")]
    pub price_retention_secs: u64,
    /// Event bus buffer per subscriber.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Minimum severity written to the event log: "info" | "warning" | "critical".
    #[serde(default = "default_event_log_severity")]
    pub event_log_severity: String,
    /// Enable `dev_set_feed_price`.
    #[serde(default)]
    pub dev_commands: bool,
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

// Default value functions

fn default_min_oracles() -> usize {
    3
}

fn default_min_price_bps() -> u32 {
    1_000
}

fn default_max_price_bps() -> u32 {
    100_000
}

fn default_outlier_threshold_bps() -> u32 {
    1_500
}

fn default_healthy_confidence() -> u8 {
    50
}

fn default_history_capacity() -> usize {
    100
}

fn default_target_bps() -> u32 {
    10_000
}

fn default_weight() -> u32 {
    100
}

fn default_heartbeat() -> u64 {
    3_600
}

fn default_decimals() -> u8 {
    8
}

fn default_sources() -> Vec<SourceConfig> {
    ["fixed-a", "fixed-b", "fixed-c"]
        .into_iter()
        .map(|key| SourceConfig {
            key: key.to_string(),
            weight: default_weight(),
            heartbeat: default_heartbeat(),
            decimals: default_decimals(),
            description: "development feed at $1.00".to_string(),
            feed: FeedKind::Fixed {
                price: 100_000_000,
            },
        })
        .collect()
}

fn default_min_confidence() -> u8 {
    60
}

fn default_max_price_age() -> u64 {
    3_600
}

fn default_rebase_cooldown() -> u64 {
    12 * 3_600
}

fn default_max_rebase_bps() -> u32 {
    1_000
}

fn default_dust_threshold_bps() -> u32 {
    1
}

fn default_breaker_cooldown() -> u64 {
    24 * 3_600
}

fn default_auto_recovery_bps() -> u32 {
    500
}

fn default_max_consecutive() -> u32 {
    3
}

fn default_bands() -> Vec<BandConfig> {
    [
        (100, 1_000, 100, 24 * 3_600),
        (500, 2_500, 250, 12 * 3_600),
        (1_000, 5_000, 500, 6 * 3_600),
        (2_000, 7_500, 1_000, 3_600),
    ]
    .into_iter()
    .map(
        |(threshold_bps, damping_bps, max_rebase_bps, min_cooldown)| BandConfig {
            threshold_bps,
            damping_bps,
            max_rebase_bps,
            min_cooldown,
        },
    )
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_base_cooldown() -> u64 {
    12 * 3_600
}

fn default_policy_min_cooldown() -> u64 {
    3_600
}

fn default_policy_max_cooldown() -> u64 {
    48 * 3_600
}

fn default_volatility_threshold_bps() -> u32 {
    500
}

fn default_stability_bonus_rate_bps() -> u32 {
    1_000
}

fn default_max_stability_bonus() -> u64 {
    6 * 3_600
}

fn default_consecutive_penalty() -> u64 {
    2 * 3_600
}

fn default_initial_supply() -> u64 {
    1_000_000_000_000_000
}

fn default_callers() -> Vec<String> {
    vec![default_operator()]
}

fn default_operator() -> String {
    "operator".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval() -> u64 {
    60
}

fn default_price_retention() -> u64 {
    7 * 24 * 3_600
}

fn default_event_buffer() -> usize {
    1_000
}

fn default_event_log_severity() -> String {
    "warning".to_string()
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            min_oracles_for_consensus: default_min_oracles(),
            min_price_bps: default_min_price_bps(),
            max_price_bps: default_max_price_bps(),
            outlier_threshold_bps: default_outlier_threshold_bps(),
            healthy_confidence: default_healthy_confidence(),
            history_capacity: default_history_capacity(),
            fallback_price_bps: default_target_bps(),
            sources: default_sources(),
        }
    }
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            target_price_bps: default_target_bps(),
            min_confidence: default_min_confidence(),
            max_price_age: default_max_price_age(),
            rebase_cooldown: default_rebase_cooldown(),
            max_rebase_percentage_bps: default_max_rebase_bps(),
            max_supply_change_bps: default_max_rebase_bps(),
            dust_threshold_bps: default_dust_threshold_bps(),
            breaker_cooldown: default_breaker_cooldown(),
            auto_recovery_threshold_bps: default_auto_recovery_bps(),
            max_consecutive_rebases: default_max_consecutive(),
            bands: default_bands(),
        }
    }
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_cooldown: default_base_cooldown(),
            min_cooldown: default_policy_min_cooldown(),
            max_cooldown: default_policy_max_cooldown(),
            volatility_threshold_bps: default_volatility_threshold_bps(),
            stability_bonus_rate_bps: default_stability_bonus_rate_bps(),
            max_stability_bonus: default_max_stability_bonus(),
            consecutive_penalty: default_consecutive_penalty(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            initial_supply: default_initial_supply(),
            min_supply: 0,
            max_supply: 0,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            callers: default_callers(),
            operator: default_operator(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tick_interval_secs: default_tick_interval(),
            price_retention_secs: default_price_retention(),
            event_buffer: default_event_buffer(),
            event_log_severity: default_event_log_severity(),
            dev_commands: false,
            data_dir: String::new(),
        }
    }
}

impl OracleConfig {
    /// Aggregator parameters, validated.
    pub fn aggregator_config(&self) -> Result<AggregatorConfig, ConfigError> {
        let config = AggregatorConfig {
            min_oracles_for_consensus: self.min_oracles_for_consensus,
            min_price: from_bps(self.min_price_bps),
            max_price: from_bps(self.max_price_bps),
            outlier_threshold: from_bps(self.outlier_threshold_bps),
            healthy_confidence: self.healthy_confidence,
            history_capacity: self.history_capacity,
            fallback_price: from_bps(self.fallback_price_bps),
            ..AggregatorConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

impl SourceConfig {
    pub fn params(&self) -> SourceParams {
        SourceParams {
            key: self.key.clone(),
            weight: self.weight,
            heartbeat: self.heartbeat,
            decimals: self.decimals,
            description: self.description.clone(),
        }
    }
}

impl StabilizerConfig {
    /// Controller parameters, validated.
    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        let config = ControllerConfig {
            target_price: from_bps(self.target_price_bps),
            min_confidence: self.min_confidence,
            max_price_age: self.max_price_age,
            rebase_cooldown: self.rebase_cooldown,
            max_rebase_percentage: from_bps(self.max_rebase_percentage_bps),
            max_supply_change_per_rebase: from_bps(self.max_supply_change_bps),
            dust_threshold: from_bps(self.dust_threshold_bps),
            breaker_cooldown: self.breaker_cooldown,
            auto_recovery_threshold: from_bps(self.auto_recovery_threshold_bps),
            max_consecutive_rebases: self.max_consecutive_rebases,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn band_table(&self) -> Result<BandTable, ConfigError> {
        let bands = self
            .bands
            .iter()
            .map(|b| {
                StabilityBand::from_bps(
                    b.threshold_bps,
                    b.damping_bps,
                    b.max_rebase_bps,
                    b.min_cooldown,
                )
            })
            .collect();
        Ok(BandTable::new(bands)?)
    }
}

impl ParamsConfig {
    pub fn cooldown_policy(&self) -> Result<CooldownPolicy, ConfigError> {
        let policy = CooldownPolicy {
            base_cooldown: self.base_cooldown,
            min_cooldown: self.min_cooldown,
            max_cooldown: self.max_cooldown,
            volatility_threshold: from_bps(self.volatility_threshold_bps),
            stability_bonus_rate: from_bps(self.stability_bonus_rate_bps),
            max_stability_bonus: self.max_stability_bonus,
            consecutive_penalty: self.consecutive_penalty,
        };
        policy.validate()?;
        Ok(policy)
    }
}

impl TokenConfig {
    pub fn elastic_supply(&self) -> Result<ballast_stabilizer::ElasticSupply, ConfigError> {
        let max = if self.max_supply == 0 {
            u128::MAX
        } else {
            u128::from(self.max_supply)
        };
        Ok(ballast_stabilizer::ElasticSupply::new(
            u128::from(self.initial_supply),
            u128::from(self.min_supply),
            max,
        )?)
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.advanced.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.advanced.data_dir)
        }
    }

    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("BALLAST_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".ballast"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/ballast"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_types::WAD;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.oracle.sources.len(), 3);
        assert_eq!(config.stabilizer.bands.len(), 4);
        assert!(config.params.enabled);
        assert_eq!(config.admin.callers, vec!["operator".to_string()]);
        assert_eq!(config.advanced.tick_interval_secs, 60);
    }

    #[test]
    fn test_defaults_convert() {
        let config = DaemonConfig::default();
        let aggregator = config.oracle.aggregator_config().expect("aggregator");
        assert_eq!(aggregator, AggregatorConfig::default());

        let controller = config.stabilizer.controller_config().expect("controller");
        assert_eq!(controller, ControllerConfig::default());

        assert_eq!(
            config.stabilizer.band_table().expect("bands"),
            BandTable::default()
        );
        assert_eq!(
            config.params.cooldown_policy().expect("policy"),
            CooldownPolicy::default()
        );
        assert_eq!(
            ballast_stabilizer::RebaseToken::total_supply(
                &config.token.elastic_supply().expect("token")
            ),
            1_000_000_000_000_000
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.oracle.sources[0].feed, config.oracle.sources[0].feed);
    }

    #[test]
    fn test_parse_sources_and_bands() {
        let parsed: DaemonConfig = toml::from_str(
            r#"
            [oracle]
            min_oracles_for_consensus = 2

            [[oracle.sources]]
            key = "primary"
            kind = "fixed"
            price = 101000000

            [[oracle.sources]]
            key = "secondary"
            kind = "file"
            path = "/var/lib/ballast/secondary.json"
            decimals = 18
            weight = 50

            [stabilizer]
            dust_threshold_bps = 5

            [[stabilizer.bands]]
            threshold_bps = 200
            damping_bps = 5000
            max_rebase_bps = 300
            min_cooldown = 7200
            "#,
        )
        .expect("parse");

        assert_eq!(parsed.oracle.sources.len(), 2);
        assert_eq!(
            parsed.oracle.sources[0].feed,
            FeedKind::Fixed { price: 101_000_000 }
        );
        assert_eq!(parsed.oracle.sources[1].weight, 50);
        assert!(matches!(parsed.oracle.sources[1].feed, FeedKind::File { .. }));

        let controller = parsed.stabilizer.controller_config().expect("controller");
        assert_eq!(controller.dust_threshold, WAD * 5 / 10_000);

        let bands = parsed.stabilizer.band_table().expect("bands");
        assert_eq!(bands.len(), 1);
        assert_eq!(bands.top().threshold, WAD / 50);

        // Untouched sections keep their defaults
        assert_eq!(parsed.advanced.log_level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = DaemonConfig::default();
        config.stabilizer.bands.clear();
        assert!(config.stabilizer.band_table().is_err());

        config.oracle.min_price_bps = 20_000;
        config.oracle.max_price_bps = 10_000;
        assert!(config.oracle.aggregator_config().is_err());

        config.token.min_supply = config.token.initial_supply + 1;
        assert!(config.token.elastic_supply().is_err());
    }
}
