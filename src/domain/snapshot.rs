//! Read-only snapshots pulled from external collaborators
//!
//! The schemas here are deliberately thin: retrieval is out of scope and the
//! engine only consumes what the decision path needs. Anything
//! provider-specific rides in the opaque `extra` maps.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::instrument::InstrumentKey;

/// Market data snapshot at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Symbol → last price
    #[serde(default)]
    pub prices: HashMap<String, Decimal>,
    /// Provider-specific fields, opaque to this core
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MarketSnapshot {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            prices: HashMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }
}

/// Current exposure across all venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    /// Position bucket → size, in the bucket's native units
    #[serde(default)]
    pub positions: HashMap<InstrumentKey, Decimal>,
    pub total_exposure: Decimal,
    /// Account equity in principal terms; strategies size targets off this
    pub equity: Decimal,
    /// Residual non-principal balances: token → amount
    #[serde(default)]
    pub dust_tokens: HashMap<String, Decimal>,
}

impl ExposureSnapshot {
    pub fn empty() -> Self {
        Self {
            positions: HashMap::new(),
            total_exposure: Decimal::ZERO,
            equity: Decimal::ZERO,
            dust_tokens: HashMap::new(),
        }
    }

    pub fn position(&self, key: &InstrumentKey) -> Decimal {
        self.positions.get(key).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Risk posture reported by the risk collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Normal,
    Elevated,
    Critical,
    Halted,
}

impl RiskLevel {
    /// Levels at which strategies should be unwinding, not entering.
    pub fn requires_unwind(self) -> bool {
        matches!(self, RiskLevel::Critical | RiskLevel::Halted)
    }
}

/// Current risk metrics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub risk_level: RiskLevel,
    /// Named metrics (ltv, drawdown, …), schema owned by the provider
    #[serde(default)]
    pub metrics: HashMap<String, Decimal>,
}

impl RiskSnapshot {
    pub fn normal() -> Self {
        Self {
            risk_level: RiskLevel::Normal,
            metrics: HashMap::new(),
        }
    }
}

/// Per-bucket balances the strategy decides against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub balances: HashMap<InstrumentKey, Decimal>,
}

impl PositionSnapshot {
    /// The decision path views positions through the exposure snapshot; this
    /// keeps the two consistent within a tick.
    pub fn from_exposure(exposure: &ExposureSnapshot, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            balances: exposure.positions.clone(),
        }
    }

    pub fn balance(&self, key: &InstrumentKey) -> Decimal {
        self.balances.get(key).copied().unwrap_or(Decimal::ZERO)
    }
}
