pub mod config;
pub mod deltas;
pub mod domain;
pub mod engine;
pub mod error;
pub mod eventlog;
pub mod logging;
pub mod providers;
pub mod strategy;

pub use config::AppConfig;
pub use deltas::{DeltaCalculator, DeltaOutcome, RateLookup};
pub use domain::{
    AllowList, DecisionType, ExposureSnapshot, InstrumentClass, InstrumentKey, MarketSnapshot,
    Operation, Order, PerpSide, PositionSnapshot, RiskLevel, RiskSnapshot, StrategyIntent,
    StrategyState, Trade, TradeSide, TradeStatus, TriggerSource, VenueKind, VenueRegistry,
};
pub use engine::{HealthStatus, StrategyDecisionEngine};
pub use error::{Result, StrataError};
pub use eventlog::{DomainEventLog, EventEnvelope, EventKind};
pub use providers::{ExposureProvider, MarketDataProvider, RateSource, RiskProvider};
pub use strategy::{StrategyDeps, StrategyImplementation, StrategyMode, StrategyRegistry};
