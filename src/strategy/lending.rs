//! Pure-lending strategy
//!
//! Keeps a target fraction of equity supplied to one lending pool.
//! Decision policy per tick: rebalance when the supplied amount drifts past
//! the configured threshold, otherwise sweep dust, otherwise hold.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::LendingParams;
use crate::deltas::DeltaCalculator;
use crate::domain::{
    AllowList, ExposureSnapshot, InstrumentClass, InstrumentKey, MarketSnapshot, Operation, Order,
    PositionSnapshot, RiskSnapshot, StrategyIntent,
};
use crate::error::Result;
use crate::providers::RateSource;

use super::registry::StrategyDeps;
use super::traits::StrategyImplementation;

const STRATEGY_ID: &str = "pure_lending_v1";

#[derive(Debug)]
pub struct PureLendingStrategy {
    params: LendingParams,
    allow_list: AllowList,
    calculator: DeltaCalculator,
    rates: Arc<dyn RateSource>,
    principal_key: InstrumentKey,
    yield_key: InstrumentKey,
}

impl PureLendingStrategy {
    pub fn new(deps: &StrategyDeps) -> Result<Self> {
        let params = deps.settings.lending.clone();
        let principal_key = InstrumentKey::base(&params.venue, &params.principal_token);
        let yield_key = InstrumentKey::new(
            &params.venue,
            InstrumentClass::YieldToken,
            &params.yield_token,
        );
        let dust_principal_key =
            InstrumentKey::base(&params.dust_venue, &params.principal_token);

        // Fail fast: every statically known key must be allow-listed before
        // the first tick.
        deps.allow_list.ensure_all(
            STRATEGY_ID,
            [&principal_key, &yield_key, &dust_principal_key],
        )?;

        Ok(Self {
            params,
            allow_list: deps.allow_list.clone(),
            calculator: DeltaCalculator::new(deps.rates.clone()),
            rates: deps.rates.clone(),
            principal_key,
            yield_key,
        })
    }

    /// Supplied balance valued in principal units, via the supply index
    /// (1:1 when the lookup fails, mirroring delta computation).
    fn supplied_principal(&self, positions: &PositionSnapshot) -> Decimal {
        let index = self
            .rates
            .get_supply_index(&self.params.principal_token)
            .ok()
            .filter(|i| *i > Decimal::ZERO)
            .unwrap_or(Decimal::ONE);
        positions.balance(&self.yield_key) * index
    }

    fn plan(
        &self,
        exposure: &ExposureSnapshot,
        risk: &RiskSnapshot,
        market: &MarketSnapshot,
        positions: &PositionSnapshot,
    ) -> Vec<Order> {
        let current = self.supplied_principal(positions);

        // Unwind entirely when the risk collaborator says stop.
        if risk.risk_level.requires_unwind() {
            if current < self.params.min_order_amount {
                return Vec::new();
            }
            let order = Order::new(
                &self.params.venue,
                Operation::Withdraw,
                &self.params.yield_token,
                &self.params.principal_token,
                current,
                StrategyIntent::ExitFull,
                STRATEGY_ID,
            );
            let deltas = self.calculator.calculate(&order);
            return vec![order.with_deltas(deltas)];
        }

        let target = exposure.equity * self.params.target_ratio;
        if target > Decimal::ZERO {
            let drift = (current - target).abs() / target;
            if drift > self.params.rebalance_threshold {
                return self.rebalance_orders(current, target, positions);
            }
        }

        super::dust_sell_orders(
            STRATEGY_ID,
            &self.params.dust_venue,
            &self.params.principal_token,
            &exposure.dust_tokens,
            market,
            &self.allow_list,
            &self.calculator,
        )
    }

    fn rebalance_orders(
        &self,
        current: Decimal,
        target: Decimal,
        positions: &PositionSnapshot,
    ) -> Vec<Order> {
        let (operation, source, dest, amount, intent) = if current < target {
            // Supply the deficit, clamped to what is actually on the venue.
            let available = positions.balance(&self.principal_key);
            let amount = (target - current).min(available);
            let intent = if current.is_zero() {
                StrategyIntent::EntryFull
            } else {
                StrategyIntent::Rebalance
            };
            (
                Operation::Supply,
                self.params.principal_token.clone(),
                self.params.yield_token.clone(),
                amount,
                intent,
            )
        } else {
            (
                Operation::Withdraw,
                self.params.yield_token.clone(),
                self.params.principal_token.clone(),
                current - target,
                StrategyIntent::Rebalance,
            )
        };

        if amount < self.params.min_order_amount {
            debug!(%amount, "rebalance amount below minimum, holding");
            return Vec::new();
        }

        let order = Order::new(
            &self.params.venue,
            operation,
            source,
            dest,
            amount,
            intent,
            STRATEGY_ID,
        );
        let deltas = self.calculator.calculate(&order);
        vec![order.with_deltas(deltas)]
    }
}

#[async_trait]
impl StrategyImplementation for PureLendingStrategy {
    fn strategy_id(&self) -> &str {
        STRATEGY_ID
    }

    async fn generate_orders(
        &mut self,
        _timestamp: DateTime<Utc>,
        exposure: &ExposureSnapshot,
        risk: &RiskSnapshot,
        market: &MarketSnapshot,
        positions: &PositionSnapshot,
    ) -> Result<Vec<Order>> {
        if exposure.equity < Decimal::ZERO {
            warn!(equity = %exposure.equity, "negative equity reported, holding");
            return Ok(Vec::new());
        }
        Ok(self.plan(exposure, risk, market, positions))
    }
}
