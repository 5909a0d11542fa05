//! Staking-only strategy
//!
//! Same rebalance-or-sweep skeleton as pure lending, but the position lives
//! in a liquid-staking token and sizes convert through the staking rate
//! instead of a supply index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::StakingParams;
use crate::deltas::DeltaCalculator;
use crate::domain::{
    AllowList, ExposureSnapshot, InstrumentClass, InstrumentKey, MarketSnapshot, Operation, Order,
    PositionSnapshot, RiskSnapshot, StrategyIntent,
};
use crate::error::Result;
use crate::providers::RateSource;

use super::registry::StrategyDeps;
use super::traits::StrategyImplementation;

const STRATEGY_ID: &str = "staking_only_v1";

#[derive(Debug)]
pub struct StakingOnlyStrategy {
    params: StakingParams,
    allow_list: AllowList,
    calculator: DeltaCalculator,
    rates: Arc<dyn RateSource>,
    underlying_key: InstrumentKey,
    staked_key: InstrumentKey,
}

impl StakingOnlyStrategy {
    pub fn new(deps: &StrategyDeps) -> Result<Self> {
        let params = deps.settings.staking.clone();
        let underlying_key = InstrumentKey::base(&params.venue, &params.underlying);
        let staked_key = InstrumentKey::new(
            &params.venue,
            InstrumentClass::YieldToken,
            &params.staked_token,
        );
        let dust_principal_key = InstrumentKey::base(&params.dust_venue, &params.underlying);

        deps.allow_list.ensure_all(
            STRATEGY_ID,
            [&underlying_key, &staked_key, &dust_principal_key],
        )?;

        Ok(Self {
            params,
            allow_list: deps.allow_list.clone(),
            calculator: DeltaCalculator::new(deps.rates.clone()),
            rates: deps.rates.clone(),
            underlying_key,
            staked_key,
        })
    }

    /// Exchange rate from underlying to staked units, 1:1 on lookup failure.
    fn staking_rate(&self) -> Decimal {
        self.rates
            .get_staking_rate(&self.params.underlying, &self.params.staked_token)
            .ok()
            .filter(|r| *r > Decimal::ZERO)
            .unwrap_or(Decimal::ONE)
    }

    fn plan(
        &self,
        exposure: &ExposureSnapshot,
        risk: &RiskSnapshot,
        market: &MarketSnapshot,
        positions: &PositionSnapshot,
    ) -> Vec<Order> {
        let rate = self.staking_rate();
        let staked_units = positions.balance(&self.staked_key);
        let current = staked_units / rate; // in underlying units

        if risk.risk_level.requires_unwind() {
            if staked_units < self.params.min_order_amount {
                return Vec::new();
            }
            let order = Order::new(
                &self.params.venue,
                Operation::Unstake,
                &self.params.staked_token,
                &self.params.underlying,
                staked_units,
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
                return self.rebalance_orders(current, target, rate, positions);
            }
        }

        super::dust_sell_orders(
            STRATEGY_ID,
            &self.params.dust_venue,
            &self.params.underlying,
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
        rate: Decimal,
        positions: &PositionSnapshot,
    ) -> Vec<Order> {
        let order = if current < target {
            let available = positions.balance(&self.underlying_key);
            let amount = (target - current).min(available);
            if amount < self.params.min_order_amount {
                debug!(%amount, "stake amount below minimum, holding");
                return Vec::new();
            }
            let intent = if current.is_zero() {
                StrategyIntent::EntryFull
            } else {
                StrategyIntent::Rebalance
            };
            Order::new(
                &self.params.venue,
                Operation::Stake,
                &self.params.underlying,
                &self.params.staked_token,
                amount,
                intent,
                STRATEGY_ID,
            )
        } else {
            // Unstake amounts are denominated in staked units.
            let excess_staked = (current - target) * rate;
            if excess_staked < self.params.min_order_amount {
                debug!(%excess_staked, "unstake amount below minimum, holding");
                return Vec::new();
            }
            Order::new(
                &self.params.venue,
                Operation::Unstake,
                &self.params.staked_token,
                &self.params.underlying,
                excess_staked,
                StrategyIntent::Rebalance,
                STRATEGY_ID,
            )
        };
        let deltas = self.calculator.calculate(&order);
        vec![order.with_deltas(deltas)]
    }
}

#[async_trait]
impl StrategyImplementation for StakingOnlyStrategy {
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
