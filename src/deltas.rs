//! Expected-delta computation
//!
//! Maps one order to the signed changes it is expected to cause in each
//! position bucket. The mapping is total: whatever happens inside, the
//! caller gets a map back, and an empty map means "no-op, investigate",
//! never success.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::domain::{InstrumentClass, InstrumentKey, Operation, Order, PerpSide, TradeSide};
use crate::error::DeltaError;
use crate::providers::RateSource;

/// One conversion-rate resolution made while computing deltas, for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLookup {
    /// Operation kind that consulted the rate source
    pub operation: String,
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_asset: Option<String>,
    pub rate: Decimal,
    /// True when the lookup failed and the 1:1 fallback was applied
    pub fallback: bool,
}

/// Deltas plus the rate resolutions that produced them.
#[derive(Debug, Clone, Default)]
pub struct DeltaOutcome {
    pub deltas: HashMap<InstrumentKey, Decimal>,
    pub rate_lookups: Vec<RateLookup>,
}

/// Pure mapping from (operation kind, parameters) to signed bucket deltas.
#[derive(Debug, Clone)]
pub struct DeltaCalculator {
    rates: Arc<dyn RateSource>,
}

impl DeltaCalculator {
    pub fn new(rates: Arc<dyn RateSource>) -> Self {
        Self { rates }
    }

    /// Expected deltas for one order. Never fails; an internally
    /// inconsistent order collapses to an empty map.
    pub fn calculate(&self, order: &Order) -> HashMap<InstrumentKey, Decimal> {
        self.calculate_detailed(order).deltas
    }

    /// As [`calculate`](Self::calculate), also reporting the rate lookups
    /// performed so the caller can audit fallbacks.
    pub fn calculate_detailed(&self, order: &Order) -> DeltaOutcome {
        let mut lookups = Vec::new();
        match self.try_calculate(order, &mut lookups) {
            Ok(deltas) => DeltaOutcome {
                deltas,
                rate_lookups: lookups,
            },
            Err(e) => {
                warn!(
                    operation_id = %order.operation_id,
                    operation = %order.operation,
                    "delta calculation failed, returning empty map: {e}"
                );
                DeltaOutcome::default()
            }
        }
    }

    fn try_calculate(
        &self,
        order: &Order,
        lookups: &mut Vec<RateLookup>,
    ) -> Result<HashMap<InstrumentKey, Decimal>, DeltaError> {
        if order.amount < Decimal::ZERO {
            return Err(DeltaError::NegativeAmount(order.amount));
        }

        let amount = order.amount;
        let mut deltas = HashMap::new();
        let mut add = |key: InstrumentKey, delta: Decimal| {
            *deltas.entry(key).or_insert(Decimal::ZERO) += delta;
        };

        match &order.operation {
            // BUY gains the target and loses source scaled by price; SELL is
            // the exact sign inversion. `amount` is in target units.
            Operation::SpotTrade { side, price } => {
                if *price <= Decimal::ZERO {
                    return Err(DeltaError::NonPositivePrice(*price));
                }
                let sign = match side {
                    TradeSide::Buy => Decimal::ONE,
                    TradeSide::Sell => -Decimal::ONE,
                };
                add(
                    InstrumentKey::base(&order.venue, &order.target_token),
                    sign * amount,
                );
                add(
                    InstrumentKey::base(&order.venue, &order.source_token),
                    -sign * amount * price,
                );
            }
            Operation::PerpTrade { side, price } => {
                if *price <= Decimal::ZERO {
                    return Err(DeltaError::NonPositivePrice(*price));
                }
                let sign = match side {
                    PerpSide::Long => Decimal::ONE,
                    PerpSide::Short => -Decimal::ONE,
                };
                add(
                    InstrumentKey::new(
                        &order.venue,
                        InstrumentClass::PerpPosition,
                        &order.target_token,
                    ),
                    sign * amount,
                );
                add(
                    InstrumentKey::base(&order.venue, &order.source_token),
                    -sign * amount * price,
                );
            }
            // Swap rates are venue quotes carried in the order itself.
            Operation::Swap { rate } => {
                if *rate <= Decimal::ZERO {
                    return Err(DeltaError::NonPositiveRate(*rate));
                }
                add(
                    InstrumentKey::base(&order.venue, &order.source_token),
                    -amount,
                );
                add(
                    InstrumentKey::base(&order.venue, &order.target_token),
                    amount * rate,
                );
            }
            // Supplying `amount` underlying credits `amount / index` of the
            // yield bucket; the index accrues above 1 over time.
            Operation::Supply => {
                let index = self.supply_index(order, &order.source_token, lookups);
                add(
                    InstrumentKey::base(&order.venue, &order.source_token),
                    -amount,
                );
                add(
                    InstrumentKey::new(
                        &order.venue,
                        InstrumentClass::YieldToken,
                        &order.target_token,
                    ),
                    amount / index,
                );
            }
            Operation::Withdraw => {
                let index = self.supply_index(order, &order.target_token, lookups);
                add(
                    InstrumentKey::new(
                        &order.venue,
                        InstrumentClass::YieldToken,
                        &order.source_token,
                    ),
                    -(amount / index),
                );
                add(
                    InstrumentKey::base(&order.venue, &order.target_token),
                    amount,
                );
            }
            // Debt lives in its own bucket, distinct from asset buckets.
            Operation::Borrow => {
                add(
                    InstrumentKey::new(
                        &order.venue,
                        InstrumentClass::DebtPosition,
                        &order.target_token,
                    ),
                    amount,
                );
                add(
                    InstrumentKey::base(&order.venue, &order.target_token),
                    amount,
                );
            }
            Operation::Repay => {
                add(
                    InstrumentKey::new(
                        &order.venue,
                        InstrumentClass::DebtPosition,
                        &order.target_token,
                    ),
                    -amount,
                );
                add(
                    InstrumentKey::base(&order.venue, &order.target_token),
                    -amount,
                );
            }
            Operation::Stake => {
                let rate = self.staking_rate(order, lookups);
                add(
                    InstrumentKey::base(&order.venue, &order.source_token),
                    -amount,
                );
                add(
                    InstrumentKey::new(
                        &order.venue,
                        InstrumentClass::YieldToken,
                        &order.target_token,
                    ),
                    amount * rate,
                );
            }
            Operation::Unstake => {
                let rate = self.staking_rate(order, lookups);
                add(
                    InstrumentKey::new(
                        &order.venue,
                        InstrumentClass::YieldToken,
                        &order.source_token,
                    ),
                    -amount,
                );
                add(
                    InstrumentKey::base(&order.venue, &order.target_token),
                    amount * rate,
                );
            }
            Operation::Transfer => {
                if order.source_token != order.target_token {
                    return Err(DeltaError::TransferTokenMismatch {
                        source_token: order.source_token.clone(),
                        target: order.target_token.clone(),
                    });
                }
                add(
                    InstrumentKey::base(&order.source_venue, &order.source_token),
                    -amount,
                );
                add(
                    InstrumentKey::base(&order.target_venue, &order.target_token),
                    amount,
                );
            }
        }

        Ok(deltas)
    }

    fn supply_index(
        &self,
        order: &Order,
        asset: &str,
        lookups: &mut Vec<RateLookup>,
    ) -> Decimal {
        let (index, fallback) = match self.rates.get_supply_index(asset) {
            Ok(index) if index > Decimal::ZERO => (index, false),
            Ok(index) => {
                warn!(asset, %index, "non-positive supply index, falling back to 1:1");
                (Decimal::ONE, true)
            }
            Err(e) => {
                warn!(asset, "supply index lookup failed, falling back to 1:1: {e}");
                (Decimal::ONE, true)
            }
        };
        lookups.push(RateLookup {
            operation: order.operation.kind_name().to_string(),
            asset: asset.to_string(),
            counter_asset: None,
            rate: index,
            fallback,
        });
        index
    }

    fn staking_rate(&self, order: &Order, lookups: &mut Vec<RateLookup>) -> Decimal {
        let from = &order.source_token;
        let to = &order.target_token;
        let (rate, fallback) = match self.rates.get_staking_rate(from, to) {
            Ok(rate) if rate > Decimal::ZERO => (rate, false),
            Ok(rate) => {
                warn!(%from, %to, %rate, "non-positive staking rate, falling back to 1:1");
                (Decimal::ONE, true)
            }
            Err(e) => {
                warn!(%from, %to, "staking rate lookup failed, falling back to 1:1: {e}");
                (Decimal::ONE, true)
            }
        };
        lookups.push(RateLookup {
            operation: order.operation.kind_name().to_string(),
            asset: from.clone(),
            counter_asset: Some(to.clone()),
            rate,
            fallback,
        });
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StrategyIntent;
    use crate::error::StrataError;
    use crate::providers::MockRateSource;
    use rust_decimal_macros::dec;

    fn calculator(rates: MockRateSource) -> DeltaCalculator {
        DeltaCalculator::new(Arc::new(rates))
    }

    fn failing_rates() -> MockRateSource {
        let mut rates = MockRateSource::new();
        rates.expect_get_supply_index().returning(|asset| {
            Err(StrataError::RateLookup {
                asset: asset.to_string(),
                reason: "oracle offline".to_string(),
            })
        });
        rates.expect_get_staking_rate().returning(|from, _| {
            Err(StrataError::RateLookup {
                asset: from.to_string(),
                reason: "oracle offline".to_string(),
            })
        });
        rates
    }

    fn key(s: &str) -> InstrumentKey {
        s.parse().expect("test key")
    }

    #[test]
    fn test_spot_buy_scenario() {
        let calc = calculator(MockRateSource::new());
        let order = Order::new(
            "binance",
            Operation::SpotTrade {
                side: TradeSide::Buy,
                price: dec!(50000),
            },
            "USDT",
            "BTC",
            dec!(0.5),
            StrategyIntent::EntryPartial,
            "test",
        );

        let deltas = calc.calculate(&order);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[&key("binance:BaseToken:BTC")], dec!(0.5));
        assert_eq!(deltas[&key("binance:BaseToken:USDT")], dec!(-25000.0));
    }

    #[test]
    fn test_spot_sell_inverts_buy() {
        let calc = calculator(MockRateSource::new());
        let order = Order::new(
            "binance",
            Operation::SpotTrade {
                side: TradeSide::Sell,
                price: dec!(50000),
            },
            "USDT",
            "BTC",
            dec!(0.5),
            StrategyIntent::ExitPartial,
            "test",
        );

        let deltas = calc.calculate(&order);
        assert_eq!(deltas[&key("binance:BaseToken:BTC")], dec!(-0.5));
        assert_eq!(deltas[&key("binance:BaseToken:USDT")], dec!(25000.0));
    }

    #[test]
    fn test_perp_short_uses_perp_bucket() {
        let calc = calculator(MockRateSource::new());
        let order = Order::new(
            "binance",
            Operation::PerpTrade {
                side: PerpSide::Short,
                price: dec!(3000),
            },
            "USDT",
            "ETH",
            dec!(2),
            StrategyIntent::EntryFull,
            "test",
        );

        let deltas = calc.calculate(&order);
        assert_eq!(deltas[&key("binance:PerpPosition:ETH")], dec!(-2));
        assert_eq!(deltas[&key("binance:BaseToken:USDT")], dec!(6000));
    }

    #[test]
    fn test_supply_scales_by_index() {
        let mut rates = MockRateSource::new();
        rates
            .expect_get_supply_index()
            .returning(|_| Ok(dec!(1.25)));
        let calc = calculator(rates);

        let order = Order::new(
            "aave",
            Operation::Supply,
            "USDC",
            "aUSDC",
            dec!(1000),
            StrategyIntent::EntryFull,
            "test",
        );

        let outcome = calc.calculate_detailed(&order);
        assert_eq!(outcome.deltas[&key("aave:BaseToken:USDC")], dec!(-1000));
        assert_eq!(outcome.deltas[&key("aave:LST/aToken:aUSDC")], dec!(800));
        assert_eq!(outcome.rate_lookups.len(), 1);
        assert!(!outcome.rate_lookups[0].fallback);
    }

    #[test]
    fn test_stake_fallback_scenario() {
        let calc = calculator(failing_rates());
        let order = Order::new(
            "etherfi",
            Operation::Stake,
            "ETH",
            "weETH",
            dec!(1.0),
            StrategyIntent::EntryFull,
            "test",
        );

        let outcome = calc.calculate_detailed(&order);
        assert_eq!(outcome.deltas[&key("etherfi:BaseToken:ETH")], dec!(-1.0));
        assert_eq!(outcome.deltas[&key("etherfi:LST/aToken:weETH")], dec!(1.0));
        assert!(outcome.rate_lookups[0].fallback);
    }

    #[test]
    fn test_failing_rate_source_equals_one_to_one() {
        let mut unit_rates = MockRateSource::new();
        unit_rates
            .expect_get_supply_index()
            .returning(|_| Ok(Decimal::ONE));
        unit_rates
            .expect_get_staking_rate()
            .returning(|_, _| Ok(Decimal::ONE));
        let fallback_calc = calculator(failing_rates());
        let unit_calc = calculator(unit_rates);

        let orders = [
            Order::new("aave", Operation::Supply, "USDC", "aUSDC", dec!(10), StrategyIntent::EntryFull, "t"),
            Order::new("aave", Operation::Withdraw, "aUSDC", "USDC", dec!(10), StrategyIntent::ExitFull, "t"),
            Order::new("etherfi", Operation::Stake, "ETH", "weETH", dec!(10), StrategyIntent::EntryFull, "t"),
            Order::new("etherfi", Operation::Unstake, "weETH", "ETH", dec!(10), StrategyIntent::ExitFull, "t"),
        ];
        for order in &orders {
            assert_eq!(
                fallback_calc.calculate(order),
                unit_calc.calculate(order),
                "fallback mismatch for {}",
                order.operation
            );
        }
    }

    #[test]
    fn test_borrow_creates_debt_bucket() {
        let calc = calculator(MockRateSource::new());
        let order = Order::new(
            "aave",
            Operation::Borrow,
            "USDC",
            "USDC",
            dec!(500),
            StrategyIntent::EntryPartial,
            "test",
        );

        let deltas = calc.calculate(&order);
        assert_eq!(deltas[&key("aave:DebtPosition:USDC")], dec!(500));
        assert_eq!(deltas[&key("aave:BaseToken:USDC")], dec!(500));
    }

    #[test]
    fn test_transfer_moves_between_venues() {
        let calc = calculator(MockRateSource::new());
        let order = Order::transfer(
            "binance",
            "aave",
            "USDC",
            dec!(250),
            StrategyIntent::Rebalance,
            "test",
        );

        let deltas = calc.calculate(&order);
        assert_eq!(deltas[&key("binance:BaseToken:USDC")], dec!(-250));
        assert_eq!(deltas[&key("aave:BaseToken:USDC")], dec!(250));
    }

    #[test]
    fn test_internal_failure_returns_empty_map() {
        let calc = calculator(MockRateSource::new());

        let mut negative = Order::new(
            "binance",
            Operation::SpotTrade {
                side: TradeSide::Buy,
                price: dec!(100),
            },
            "USDT",
            "BTC",
            dec!(1),
            StrategyIntent::EntryFull,
            "test",
        );
        negative.amount = dec!(-1);
        assert!(calc.calculate(&negative).is_empty());

        let mut mismatched = Order::transfer(
            "binance",
            "aave",
            "USDC",
            dec!(1),
            StrategyIntent::Rebalance,
            "test",
        );
        mismatched.target_token = "USDT".to_string();
        assert!(calc.calculate(&mismatched).is_empty());
    }

    #[test]
    fn test_all_kinds_yield_wellformed_keys() {
        let mut rates = MockRateSource::new();
        rates.expect_get_supply_index().returning(|_| Ok(dec!(1.1)));
        rates
            .expect_get_staking_rate()
            .returning(|_, _| Ok(dec!(0.96)));
        let calc = calculator(rates);

        let orders = [
            Order::new("binance", Operation::SpotTrade { side: TradeSide::Buy, price: dec!(2) }, "USDT", "BTC", dec!(1), StrategyIntent::EntryFull, "t"),
            Order::new("binance", Operation::PerpTrade { side: PerpSide::Long, price: dec!(2) }, "USDT", "ETH", dec!(1), StrategyIntent::EntryFull, "t"),
            Order::new("uniswap", Operation::Swap { rate: dec!(0.99) }, "USDC", "DAI", dec!(1), StrategyIntent::Rebalance, "t"),
            Order::new("aave", Operation::Supply, "USDC", "aUSDC", dec!(1), StrategyIntent::EntryFull, "t"),
            Order::new("aave", Operation::Withdraw, "aUSDC", "USDC", dec!(1), StrategyIntent::ExitFull, "t"),
            Order::new("aave", Operation::Borrow, "USDC", "USDC", dec!(1), StrategyIntent::EntryFull, "t"),
            Order::new("aave", Operation::Repay, "USDC", "USDC", dec!(1), StrategyIntent::ExitFull, "t"),
            Order::new("etherfi", Operation::Stake, "ETH", "weETH", dec!(1), StrategyIntent::EntryFull, "t"),
            Order::new("etherfi", Operation::Unstake, "weETH", "ETH", dec!(1), StrategyIntent::ExitFull, "t"),
            Order::transfer("binance", "aave", "USDC", dec!(1), StrategyIntent::Rebalance, "t"),
        ];

        for order in &orders {
            let deltas = calc.calculate(order);
            assert!(!deltas.is_empty(), "{} produced no deltas", order.operation);
            for key in deltas.keys() {
                let reparsed: InstrumentKey = key.to_string().parse().expect("well-formed key");
                assert_eq!(&reparsed, key);
            }
        }
    }
}
