//! Strategy contract
//!
//! One required interface; variants compose whatever internals they need.
//! There are no optional-override defaults that silently no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ExposureSnapshot, MarketSnapshot, Order, PositionSnapshot, RiskSnapshot};
use crate::error::Result;

/// A strategy turns one tick's snapshots into an ordered list of orders.
///
/// Implementations validate every instrument key they will ever reference
/// against the allow-list at construction time, so decision time can assume
/// the universe is closed.
///
/// `generate_orders` returning `Err` is treated by the engine as a degraded
/// tick (empty order list, error counted); it never aborts the loop. The
/// built-in variants additionally catch their own internal failures and
/// degrade to dust cleanup or an empty list where they can.
#[async_trait]
pub trait StrategyImplementation: Send + std::fmt::Debug {
    /// Identifier stamped on every order this variant emits.
    fn strategy_id(&self) -> &str;

    async fn generate_orders(
        &mut self,
        timestamp: DateTime<Utc>,
        exposure: &ExposureSnapshot,
        risk: &RiskSnapshot,
        market: &MarketSnapshot,
        positions: &PositionSnapshot,
    ) -> Result<Vec<Order>>;
}
