//! Leveraged-basis strategy
//!
//! Cash-and-carry: borrow quote from the lending venue, move it to the CEX,
//! buy the base asset spot and short the same size on the perp. The four
//! legs go out as one atomic group; the execution layer applies them
//! all-or-nothing. Critical/halted risk unwinds the whole structure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use crate::config::BasisParams;
use crate::deltas::DeltaCalculator;
use crate::domain::{
    new_atomic_group_id, ExposureSnapshot, InstrumentClass, InstrumentKey, MarketSnapshot,
    Operation, Order, PerpSide, PositionSnapshot, RiskSnapshot, StrategyIntent, TradeSide,
};
use crate::error::{Result, StrataError};

use super::registry::StrategyDeps;
use super::traits::StrategyImplementation;

const STRATEGY_ID: &str = "leveraged_basis_v1";

#[derive(Debug)]
pub struct LeveragedBasisStrategy {
    params: BasisParams,
    calculator: DeltaCalculator,
    debt_key: InstrumentKey,
    lend_quote_key: InstrumentKey,
    cex_quote_key: InstrumentKey,
    cex_base_key: InstrumentKey,
    perp_key: InstrumentKey,
}

impl LeveragedBasisStrategy {
    pub fn new(deps: &StrategyDeps) -> Result<Self> {
        let params = deps.settings.basis.clone();
        let debt_key = InstrumentKey::new(
            &params.lending_venue,
            InstrumentClass::DebtPosition,
            &params.quote_token,
        );
        let lend_quote_key = InstrumentKey::base(&params.lending_venue, &params.quote_token);
        let cex_quote_key = InstrumentKey::base(&params.cex_venue, &params.quote_token);
        let cex_base_key = InstrumentKey::base(&params.cex_venue, &params.base_token);
        let perp_key = InstrumentKey::new(
            &params.cex_venue,
            InstrumentClass::PerpPosition,
            &params.base_token,
        );

        deps.allow_list.ensure_all(
            STRATEGY_ID,
            [
                &debt_key,
                &lend_quote_key,
                &cex_quote_key,
                &cex_base_key,
                &perp_key,
            ],
        )?;

        Ok(Self {
            params,
            calculator: DeltaCalculator::new(deps.rates.clone()),
            debt_key,
            lend_quote_key,
            cex_quote_key,
            cex_base_key,
            perp_key,
        })
    }

    fn base_price(&self, market: &MarketSnapshot) -> Result<Decimal> {
        market
            .price(&self.params.base_token)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| {
                StrataError::SnapshotUnavailable(format!(
                    "no price for {}",
                    self.params.base_token
                ))
            })
    }

    fn entry_orders(&self, price: Decimal) -> Vec<Order> {
        let notional = self.params.target_notional;
        let base_amount = notional / price;
        let group = new_atomic_group_id();

        let legs = vec![
            Order::new(
                &self.params.lending_venue,
                Operation::Borrow,
                &self.params.quote_token,
                &self.params.quote_token,
                notional,
                StrategyIntent::EntryFull,
                STRATEGY_ID,
            ),
            Order::transfer(
                &self.params.lending_venue,
                &self.params.cex_venue,
                &self.params.quote_token,
                notional,
                StrategyIntent::EntryFull,
                STRATEGY_ID,
            ),
            Order::new(
                &self.params.cex_venue,
                Operation::SpotTrade {
                    side: TradeSide::Buy,
                    price,
                },
                &self.params.quote_token,
                &self.params.base_token,
                base_amount,
                StrategyIntent::EntryFull,
                STRATEGY_ID,
            ),
            Order::new(
                &self.params.cex_venue,
                Operation::PerpTrade {
                    side: PerpSide::Short,
                    price,
                },
                &self.params.quote_token,
                &self.params.base_token,
                base_amount,
                StrategyIntent::EntryFull,
                STRATEGY_ID,
            ),
        ];

        self.annotate_group(legs, &group)
    }

    fn exit_orders(
        &self,
        price: Decimal,
        positions: &PositionSnapshot,
    ) -> Vec<Order> {
        let group = new_atomic_group_id();
        let mut legs = Vec::new();

        let perp = positions.balance(&self.perp_key);
        if perp < Decimal::ZERO {
            // Close the short by going long the same size.
            legs.push(Order::new(
                &self.params.cex_venue,
                Operation::PerpTrade {
                    side: PerpSide::Long,
                    price,
                },
                &self.params.quote_token,
                &self.params.base_token,
                -perp,
                StrategyIntent::ExitFull,
                STRATEGY_ID,
            ));
        }

        let base = positions.balance(&self.cex_base_key);
        if base > Decimal::ZERO {
            legs.push(Order::new(
                &self.params.cex_venue,
                Operation::SpotTrade {
                    side: TradeSide::Sell,
                    price,
                },
                &self.params.quote_token,
                &self.params.base_token,
                base,
                StrategyIntent::ExitFull,
                STRATEGY_ID,
            ));
        }

        let debt = positions.balance(&self.debt_key);
        if debt > Decimal::ZERO {
            legs.push(Order::transfer(
                &self.params.cex_venue,
                &self.params.lending_venue,
                &self.params.quote_token,
                debt,
                StrategyIntent::ExitFull,
                STRATEGY_ID,
            ));
            legs.push(Order::new(
                &self.params.lending_venue,
                Operation::Repay,
                &self.params.quote_token,
                &self.params.quote_token,
                debt,
                StrategyIntent::ExitFull,
                STRATEGY_ID,
            ));
        }

        self.annotate_group(legs, &group)
    }

    fn annotate_group(&self, legs: Vec<Order>, group: &str) -> Vec<Order> {
        legs.into_iter()
            .enumerate()
            .map(|(i, order)| {
                let deltas = self.calculator.calculate(&order);
                order.in_group(group, i as u32).with_deltas(deltas)
            })
            .collect()
    }

    fn in_position(&self, positions: &PositionSnapshot) -> bool {
        positions.balance(&self.debt_key) > Decimal::ZERO
            || !positions.balance(&self.perp_key).is_zero()
            || positions.balance(&self.cex_base_key) > Decimal::ZERO
    }
}

#[async_trait]
impl StrategyImplementation for LeveragedBasisStrategy {
    fn strategy_id(&self) -> &str {
        STRATEGY_ID
    }

    async fn generate_orders(
        &mut self,
        _timestamp: DateTime<Utc>,
        _exposure: &ExposureSnapshot,
        risk: &RiskSnapshot,
        market: &MarketSnapshot,
        positions: &PositionSnapshot,
    ) -> Result<Vec<Order>> {
        let in_position = self.in_position(positions);

        if risk.risk_level.requires_unwind() {
            if !in_position {
                return Ok(Vec::new());
            }
            // Unwinding without a price cannot build the sell legs; degrade
            // to holding and let the next tick retry.
            return match self.base_price(market) {
                Ok(price) => Ok(self.exit_orders(price, positions)),
                Err(e) => {
                    warn!("cannot unwind basis position: {e}");
                    Ok(Vec::new())
                }
            };
        }

        if in_position {
            return Ok(Vec::new());
        }

        let price = self.base_price(market)?;
        Ok(self.entry_orders(price))
    }
}
