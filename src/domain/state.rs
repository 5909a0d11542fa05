//! Engine-owned decision state
//!
//! One `StrategyState` per engine instance, mutated once per tick by that
//! engine only. The history is bounded so a long-running process keeps a
//! fixed memory footprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use super::order::StrategyIntent;

/// Maximum retained action records.
pub const ACTION_HISTORY_LIMIT: usize = 10;

/// What caused a decision tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    FullLoop,
    Manual,
    RiskTrigger,
}

impl TriggerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullLoop => "full_loop",
            Self::Manual => "manual",
            Self::RiskTrigger => "risk_trigger",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit classification of a tick's aggregate action. Human-readable only,
/// never used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Entry,
    Exit,
    Rebalance,
    Hold,
    EmergencyExit,
}

impl DecisionType {
    /// Explicit mapping from typed intents. Priority: a risk-triggered tick
    /// containing any exit is an emergency exit; otherwise exits outrank
    /// entries outrank rebalancing (dust sweeps count as rebalancing).
    pub fn classify<I>(trigger: TriggerSource, intents: I) -> Self
    where
        I: IntoIterator<Item = StrategyIntent>,
    {
        let mut any_exit = false;
        let mut any_entry = false;
        let mut any_order = false;
        for intent in intents {
            any_order = true;
            any_exit |= intent.is_exit();
            any_entry |= intent.is_entry();
        }
        if !any_order {
            DecisionType::Hold
        } else if any_exit && trigger == TriggerSource::RiskTrigger {
            DecisionType::EmergencyExit
        } else if any_exit {
            DecisionType::Exit
        } else if any_entry {
            DecisionType::Entry
        } else {
            DecisionType::Rebalance
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Rebalance => "rebalance",
            Self::Hold => "hold",
            Self::EmergencyExit => "emergency_exit",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded tick outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub trigger: TriggerSource,
    pub decision: DecisionType,
    pub order_count: usize,
}

/// Bounded decision history plus cumulative counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyState {
    last_action: Option<ActionRecord>,
    history: VecDeque<ActionRecord>,
    orders_generated: u64,
}

impl StrategyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one tick's outcome. Called exactly once per tick.
    pub fn record(&mut self, record: ActionRecord) {
        self.orders_generated += record.order_count as u64;
        self.last_action = Some(record.clone());
        self.history.push_back(record);
        while self.history.len() > ACTION_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    pub fn last_action(&self) -> Option<&ActionRecord> {
        self.last_action.as_ref()
    }

    pub fn history(&self) -> impl Iterator<Item = &ActionRecord> {
        self.history.iter()
    }

    /// Monotonically increasing count of orders generated over the run.
    pub fn orders_generated(&self) -> u64 {
        self.orders_generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(decision: DecisionType, order_count: usize) -> ActionRecord {
        ActionRecord {
            timestamp: Utc::now(),
            trigger: TriggerSource::FullLoop,
            decision,
            order_count,
        }
    }

    #[test]
    fn test_classify_hold_on_empty() {
        assert_eq!(
            DecisionType::classify(TriggerSource::FullLoop, []),
            DecisionType::Hold
        );
    }

    #[test]
    fn test_classify_priorities() {
        use StrategyIntent::*;

        assert_eq!(
            DecisionType::classify(TriggerSource::FullLoop, [Rebalance, EntryFull]),
            DecisionType::Entry
        );
        assert_eq!(
            DecisionType::classify(TriggerSource::FullLoop, [EntryFull, ExitPartial]),
            DecisionType::Exit
        );
        assert_eq!(
            DecisionType::classify(TriggerSource::FullLoop, [DustSell, Rebalance]),
            DecisionType::Rebalance
        );
    }

    #[test]
    fn test_classify_emergency_exit_needs_risk_trigger() {
        use StrategyIntent::*;

        assert_eq!(
            DecisionType::classify(TriggerSource::RiskTrigger, [ExitFull]),
            DecisionType::EmergencyExit
        );
        // Same orders on the scheduled loop classify as a plain exit.
        assert_eq!(
            DecisionType::classify(TriggerSource::FullLoop, [ExitFull]),
            DecisionType::Exit
        );
        // A risk-triggered tick without exits is not an emergency.
        assert_eq!(
            DecisionType::classify(TriggerSource::RiskTrigger, [Rebalance]),
            DecisionType::Rebalance
        );
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = StrategyState::new();
        for i in 0..25 {
            state.record(record(DecisionType::Hold, i));
        }
        assert_eq!(state.history().count(), ACTION_HISTORY_LIMIT);
        // Oldest entries were evicted; the newest survives.
        assert_eq!(state.last_action().unwrap().order_count, 24);
        assert_eq!(state.history().next().unwrap().order_count, 15);
    }

    #[test]
    fn test_orders_counter_accumulates() {
        let mut state = StrategyState::new();
        state.record(record(DecisionType::Entry, 3));
        state.record(record(DecisionType::Hold, 0));
        state.record(record(DecisionType::Rebalance, 2));
        assert_eq!(state.orders_generated(), 5);
    }
}
