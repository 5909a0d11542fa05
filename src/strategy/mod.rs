//! Strategy implementations
//!
//! The contract lives in [`traits`], construction goes through [`registry`],
//! and each variant is its own module. Shared decision helpers sit here.

pub mod basis;
pub mod lending;
pub mod registry;
pub mod staking;
pub mod traits;

pub use registry::{StrategyDeps, StrategyMode, StrategyRegistry};
pub use traits::StrategyImplementation;

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::deltas::DeltaCalculator;
use crate::domain::{
    AllowList, InstrumentKey, MarketSnapshot, Operation, Order, StrategyIntent, TradeSide,
};

/// Sell every positive dust balance back into the principal asset.
///
/// Only allow-listed dust buckets are swept; anything else is skipped with a
/// debug line. Tokens without a market price are skipped the same way;
/// they stay dust until the price shows up.
pub(crate) fn dust_sell_orders(
    strategy_id: &str,
    dust_venue: &str,
    principal_token: &str,
    dust_tokens: &HashMap<String, Decimal>,
    market: &MarketSnapshot,
    allow_list: &AllowList,
    calculator: &DeltaCalculator,
) -> Vec<Order> {
    let mut orders = Vec::new();
    // Deterministic emission order for replay.
    let mut tokens: Vec<_> = dust_tokens.iter().collect();
    tokens.sort_by(|a, b| a.0.cmp(b.0));

    for (token, balance) in tokens {
        if *balance <= Decimal::ZERO || token == principal_token {
            continue;
        }
        let dust_key = InstrumentKey::base(dust_venue, token);
        let principal_key = InstrumentKey::base(dust_venue, principal_token);
        if !allow_list.contains(&dust_key) || !allow_list.contains(&principal_key) {
            debug!(%dust_key, "dust bucket not allow-listed, skipping sweep");
            continue;
        }
        let Some(price) = market.price(token) else {
            debug!(token, "no price for dust token, skipping sweep");
            continue;
        };
        if price <= Decimal::ZERO {
            continue;
        }
        let order = Order::new(
            dust_venue,
            Operation::SpotTrade {
                side: TradeSide::Sell,
                price,
            },
            principal_token,
            token,
            *balance,
            StrategyIntent::DustSell,
            strategy_id,
        );
        let deltas = calculator.calculate(&order);
        orders.push(order.with_deltas(deltas));
    }
    orders
}
