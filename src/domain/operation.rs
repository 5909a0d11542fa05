//! Financial operation kinds
//!
//! The closed set of operations a strategy can request. Each variant carries
//! the parameters expected-delta computation needs, so dispatch over the kind
//! is exhaustive at compile time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a spot conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Direction of a perpetual-futures position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PerpSide {
    Long,
    Short,
}

impl fmt::Display for PerpSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerpSide::Long => write!(f, "LONG"),
            PerpSide::Short => write!(f, "SHORT"),
        }
    }
}

/// The ten operation kinds the engine can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// CEX spot conversion at a quoted price
    SpotTrade { side: TradeSide, price: Decimal },
    /// Perpetual position change at a quoted price
    PerpTrade { side: PerpSide, price: Decimal },
    /// DEX token conversion at a venue-quoted rate (no oracle involved)
    Swap { rate: Decimal },
    /// Deposit into a lending pool, minting the yield bucket
    Supply,
    /// Redeem underlying from a lending pool
    Withdraw,
    /// Draw debt against posted collateral
    Borrow,
    /// Pay down outstanding debt
    Repay,
    /// Convert underlying into a liquid-staking token
    Stake,
    /// Convert a liquid-staking token back to underlying
    Unstake,
    /// Venue-to-venue movement of one token, zero conversion
    Transfer,
}

impl Operation {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operation::SpotTrade { .. } => "spot_trade",
            Operation::PerpTrade { .. } => "perp_trade",
            Operation::Swap { .. } => "swap",
            Operation::Supply => "supply",
            Operation::Withdraw => "withdraw",
            Operation::Borrow => "borrow",
            Operation::Repay => "repay",
            Operation::Stake => "stake",
            Operation::Unstake => "unstake",
            Operation::Transfer => "transfer",
        }
    }

    /// Whether this kind consults the external rate source (and therefore
    /// falls back to 1:1 when the lookup fails).
    pub fn uses_rate_source(&self) -> bool {
        matches!(
            self,
            Operation::Supply | Operation::Withdraw | Operation::Stake | Operation::Unstake
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_names_are_distinct() {
        let ops = [
            Operation::SpotTrade {
                side: TradeSide::Buy,
                price: dec!(1),
            },
            Operation::PerpTrade {
                side: PerpSide::Long,
                price: dec!(1),
            },
            Operation::Swap { rate: dec!(1) },
            Operation::Supply,
            Operation::Withdraw,
            Operation::Borrow,
            Operation::Repay,
            Operation::Stake,
            Operation::Unstake,
            Operation::Transfer,
        ];
        let names: std::collections::HashSet<_> = ops.iter().map(|o| o.kind_name()).collect();
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn test_serde_tagged_kind() {
        let op = Operation::SpotTrade {
            side: TradeSide::Buy,
            price: dec!(50000),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], "spot_trade");
        assert_eq!(json["side"], "BUY");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_rate_source_usage() {
        assert!(Operation::Supply.uses_rate_source());
        assert!(Operation::Unstake.uses_rate_source());
        assert!(!Operation::Transfer.uses_rate_source());
        assert!(!Operation::Swap { rate: dec!(1) }.uses_rate_source());
    }
}
