//! Configuration loading and validation
//!
//! Layered the usual way: hardcoded defaults, then `default.toml`, then an
//! environment-named file, then `STRATA__`-prefixed environment variables.
//! Validation collects every violation instead of stopping at the first.

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

use crate::domain::{AllowList, InstrumentKey, VenueKind, VenueRegistry};
use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub strategy: StrategySettings,
    pub venues: VenuesConfig,
    /// Instrument allow-list: canonical `venue:class:symbol` strings
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub event_log: EventLogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which strategy variant runs and its per-variant parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySettings {
    /// Mode key resolved through the strategy registry
    pub mode: String,
    #[serde(default)]
    pub lending: LendingParams,
    #[serde(default)]
    pub staking: StakingParams,
    #[serde(default)]
    pub basis: BasisParams,
}

/// Registered venue identifiers, by kind.
#[derive(Debug, Clone, Deserialize)]
pub struct VenuesConfig {
    #[serde(default)]
    pub cex: Vec<String>,
    #[serde(default)]
    pub defi: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventLogConfig {
    /// Base directory for per-run audit streams
    pub dir: String,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            dir: "data/audit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parameters for the pure-lending variant.
#[derive(Debug, Clone, Deserialize)]
pub struct LendingParams {
    /// Lending venue (e.g. "aave")
    pub venue: String,
    /// Principal asset supplied to the pool
    pub principal_token: String,
    /// Yield bucket symbol minted by the pool
    pub yield_token: String,
    /// Fraction of equity to keep supplied
    pub target_ratio: Decimal,
    /// Relative drift from target that triggers rebalancing
    pub rebalance_threshold: Decimal,
    /// Orders below this principal amount are not worth emitting
    pub min_order_amount: Decimal,
    /// CEX venue where dust balances are swept back to principal
    pub dust_venue: String,
}

impl Default for LendingParams {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            venue: "aave".to_string(),
            principal_token: "USDC".to_string(),
            yield_token: "aUSDC".to_string(),
            target_ratio: dec!(0.95),
            rebalance_threshold: dec!(0.02),
            min_order_amount: dec!(10),
            dust_venue: "binance".to_string(),
        }
    }
}

/// Parameters for the staking-only variant.
#[derive(Debug, Clone, Deserialize)]
pub struct StakingParams {
    /// Staking venue (e.g. "etherfi")
    pub venue: String,
    /// Underlying asset
    pub underlying: String,
    /// Liquid-staking token received
    pub staked_token: String,
    /// Fraction of equity to keep staked
    pub target_ratio: Decimal,
    pub rebalance_threshold: Decimal,
    pub min_order_amount: Decimal,
    pub dust_venue: String,
}

impl Default for StakingParams {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            venue: "etherfi".to_string(),
            underlying: "ETH".to_string(),
            staked_token: "weETH".to_string(),
            target_ratio: dec!(0.90),
            rebalance_threshold: dec!(0.03),
            min_order_amount: dec!(0.01),
            dust_venue: "binance".to_string(),
        }
    }
}

/// Parameters for the leveraged-basis variant.
#[derive(Debug, Clone, Deserialize)]
pub struct BasisParams {
    /// Lending venue the position borrows from
    pub lending_venue: String,
    /// CEX venue carrying the spot leg and the perp hedge
    pub cex_venue: String,
    /// Asset borrowed and used to fund the spot leg
    pub quote_token: String,
    /// Asset bought spot and shorted on the perp
    pub base_token: String,
    /// Notional size of the position, in quote units
    pub target_notional: Decimal,
}

impl Default for BasisParams {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            lending_venue: "aave".to_string(),
            cex_venue: "binance".to_string(),
            quote_token: "USDT".to_string(),
            base_token: "ETH".to_string(),
            target_notional: dec!(10000),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("strategy.mode", "pure_lending")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("event_log.dir", "data/audit")?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("STRATA_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (STRATA_STRATEGY__MODE, etc.)
            .add_source(
                Environment::with_prefix("STRATA")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Build the venue registry from the configured venue lists.
    pub fn venue_registry(&self) -> VenueRegistry {
        let mut venues = VenueRegistry::new();
        for v in &self.venues.cex {
            venues.register(v, VenueKind::Cex);
        }
        for v in &self.venues.defi {
            venues.register(v, VenueKind::Defi);
        }
        venues
    }

    /// Parse the configured instrument allow-list, checking every venue is
    /// registered.
    pub fn allow_list(&self) -> Result<AllowList> {
        let venues = self.venue_registry();
        let mut keys = Vec::with_capacity(self.instruments.len());
        for raw in &self.instruments {
            let key: InstrumentKey = raw.parse()?;
            key.validate(&venues)?;
            keys.push(key);
        }
        Ok(AllowList::new(keys))
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if crate::strategy::StrategyMode::parse(&self.strategy.mode).is_none() {
            errors.push(format!("unknown strategy mode: {}", self.strategy.mode));
        }

        if self.venues.cex.is_empty() && self.venues.defi.is_empty() {
            errors.push("no venues registered".to_string());
        }

        let lending = &self.strategy.lending;
        if lending.target_ratio <= Decimal::ZERO || lending.target_ratio > Decimal::ONE {
            errors.push("lending.target_ratio must be in (0, 1]".to_string());
        }
        if lending.rebalance_threshold <= Decimal::ZERO {
            errors.push("lending.rebalance_threshold must be positive".to_string());
        }

        let staking = &self.strategy.staking;
        if staking.target_ratio <= Decimal::ZERO || staking.target_ratio > Decimal::ONE {
            errors.push("staking.target_ratio must be in (0, 1]".to_string());
        }
        if staking.rebalance_threshold <= Decimal::ZERO {
            errors.push("staking.rebalance_threshold must be positive".to_string());
        }

        if self.strategy.basis.target_notional <= Decimal::ZERO {
            errors.push("basis.target_notional must be positive".to_string());
        }

        let venues = self.venue_registry();
        for raw in &self.instruments {
            match raw.parse::<InstrumentKey>() {
                Ok(key) => {
                    if !venues.is_registered(&key.venue) {
                        errors.push(format!("instrument {raw} references unregistered venue"));
                    }
                }
                Err(_) => errors.push(format!("malformed instrument key: {raw}")),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// In-process configuration with the default parameter set, used by
    /// tests and embedding callers that skip file loading.
    pub fn default_config(mode: &str) -> Self {
        Self {
            strategy: StrategySettings {
                mode: mode.to_string(),
                lending: LendingParams::default(),
                staking: StakingParams::default(),
                basis: BasisParams::default(),
            },
            venues: VenuesConfig {
                cex: vec!["binance".to_string()],
                defi: vec!["aave".to_string(), "etherfi".to_string()],
            },
            instruments: vec![
                "aave:BaseToken:USDC".to_string(),
                "aave:LST/aToken:aUSDC".to_string(),
                "aave:BaseToken:USDT".to_string(),
                "aave:DebtPosition:USDT".to_string(),
                "etherfi:BaseToken:ETH".to_string(),
                "etherfi:LST/aToken:weETH".to_string(),
                "binance:BaseToken:USDC".to_string(),
                "binance:BaseToken:USDT".to_string(),
                "binance:BaseToken:ETH".to_string(),
                "binance:PerpPosition:ETH".to_string(),
            ],
            event_log: EventLogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_validates() {
        let cfg = AppConfig::default_config("pure_lending");
        assert!(cfg.validate().is_ok());
        assert!(cfg.allow_list().is_ok());
        assert_eq!(cfg.venue_registry().len(), 3);
    }

    #[test]
    fn test_validate_collects_all_violations() {
        let mut cfg = AppConfig::default_config("pure_lending");
        cfg.strategy.mode = "nope".to_string();
        cfg.strategy.lending.target_ratio = dec!(1.5);
        cfg.instruments.push("not-a-key".to_string());

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_allow_list_rejects_unknown_venue() {
        let mut cfg = AppConfig::default_config("pure_lending");
        cfg.instruments.push("ftx:BaseToken:BTC".to_string());
        assert!(cfg.allow_list().is_err());
    }
}
