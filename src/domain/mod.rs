//! Domain value objects shared across the decision pipeline.

pub mod instrument;
pub mod operation;
pub mod order;
pub mod snapshot;
pub mod state;
pub mod trade;

pub use instrument::{AllowList, InstrumentClass, InstrumentKey, VenueKind, VenueRegistry};
pub use operation::{Operation, PerpSide, TradeSide};
pub use order::{new_atomic_group_id, Order, StrategyIntent};
pub use snapshot::{ExposureSnapshot, MarketSnapshot, PositionSnapshot, RiskLevel, RiskSnapshot};
pub use state::{
    ActionRecord, DecisionType, StrategyState, TriggerSource, ACTION_HISTORY_LIMIT,
};
pub use trade::{Trade, TradeStatus};
