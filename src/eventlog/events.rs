//! Domain event vocabulary
//!
//! Twelve event kinds, one physical stream each. The envelope is the only
//! shape the log persists; payloads ride inside it as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::deltas::RateLookup;
use crate::domain::{DecisionType, TriggerSource};
use crate::engine::HealthStatus;

/// Closed set of persisted event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StrategyDecision,
    Order,
    Trade,
    PositionSnapshot,
    ExposureSnapshot,
    RiskSnapshot,
    MarketSnapshot,
    RateLookup,
    Health,
    EngineError,
    Lifecycle,
    Config,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::StrategyDecision,
        EventKind::Order,
        EventKind::Trade,
        EventKind::PositionSnapshot,
        EventKind::ExposureSnapshot,
        EventKind::RiskSnapshot,
        EventKind::MarketSnapshot,
        EventKind::RateLookup,
        EventKind::Health,
        EventKind::EngineError,
        EventKind::Lifecycle,
        EventKind::Config,
    ];

    /// File stem of this kind's stream within the run directory.
    pub fn stream_name(self) -> &'static str {
        match self {
            Self::StrategyDecision => "decisions",
            Self::Order => "orders",
            Self::Trade => "trades",
            Self::PositionSnapshot => "position_snapshots",
            Self::ExposureSnapshot => "exposure_snapshots",
            Self::RiskSnapshot => "risk_snapshots",
            Self::MarketSnapshot => "market_snapshots",
            Self::RateLookup => "rate_lookups",
            Self::Health => "health",
            Self::EngineError => "engine_errors",
            Self::Lifecycle => "lifecycle",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stream_name())
    }
}

/// Persisted wrapper around every event payload.
///
/// `order` is present only on the asynchronous logging path; within one
/// `(correlation_id, pid)` log instance its values are strictly increasing
/// and unique across all kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Logical timestamp of the originating tick, epoch milliseconds
    pub ts: i64,
    /// Wall-clock time the event was captured
    pub captured_at: DateTime<Utc>,
    pub correlation_id: String,
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u64>,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

/// Payload of one tick's decision event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub trigger: TriggerSource,
    pub decision: DecisionType,
    pub strategy_id: String,
    pub order_count: usize,
    pub orders_generated_total: u64,
    pub health: HealthStatus,
    pub error_count: u32,
}

/// Payload recording one guarded step failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineErrorEvent {
    pub step: String,
    pub message: String,
}

/// Payload recording a health status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEvent {
    pub status: HealthStatus,
    pub error_count: u32,
}

/// Payload for process lifecycle markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Payload snapshotting the active configuration at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEvent {
    pub strategy_mode: String,
    pub strategy_id: String,
}

/// Payload for one audited rate resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLookupEvent {
    pub operation_id: String,
    #[serde(flatten)]
    pub lookup: RateLookup,
}
