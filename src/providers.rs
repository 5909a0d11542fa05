//! External collaborator interfaces
//!
//! Market, exposure and risk retrieval live outside this core; the engine
//! only consumes them through these read-only traits. All of them may fail
//! per call; the engine degrades rather than aborting the tick.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{ExposureSnapshot, MarketSnapshot, RiskSnapshot};
use crate::error::Result;

/// Market data retrieval, schema opaque to this core.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_data(&self, timestamp: DateTime<Utc>) -> Result<MarketSnapshot>;
}

/// Current portfolio exposure.
#[async_trait]
pub trait ExposureProvider: Send + Sync {
    async fn get_current_exposure(&self) -> Result<ExposureSnapshot>;
}

/// Current risk posture.
#[async_trait]
pub trait RiskProvider: Send + Sync {
    async fn get_current_risk_metrics(&self) -> Result<RiskSnapshot>;
}

/// Conversion-rate utility for index- and rate-scaled operations.
///
/// Either lookup may fail; delta computation falls back to a 1:1 conversion
/// and logs a warning instead of propagating the error.
#[cfg_attr(test, mockall::automock)]
pub trait RateSource: Send + Sync + std::fmt::Debug {
    /// Lending-pool supply index for an underlying asset (≥ 1 as it accrues).
    fn get_supply_index(&self, asset: &str) -> Result<Decimal>;

    /// Staking exchange rate converting `from` units into `to` units.
    fn get_staking_rate(&self, from: &str, to: &str) -> Result<Decimal>;
}
