//! Order value object
//!
//! An `Order` describes one requested operation, annotated with the deltas it
//! is expected to cause. Orders are created once by a strategy implementation
//! and are immutable afterwards; the execution layer consumes them and later
//! reports a [`Trade`](super::trade::Trade) keyed by `operation_id`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::instrument::InstrumentKey;
use super::operation::Operation;
use crate::error::{Result, StrataError};

/// Why the strategy wants this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyIntent {
    EntryFull,
    EntryPartial,
    ExitFull,
    ExitPartial,
    DustSell,
    Rebalance,
}

impl StrategyIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntryFull => "entry_full",
            Self::EntryPartial => "entry_partial",
            Self::ExitFull => "exit_full",
            Self::ExitPartial => "exit_partial",
            Self::DustSell => "dust_sell",
            Self::Rebalance => "rebalance",
        }
    }

    pub fn is_entry(self) -> bool {
        matches!(self, Self::EntryFull | Self::EntryPartial)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, Self::ExitFull | Self::ExitPartial)
    }
}

impl fmt::Display for StrategyIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested operation with its expected position-bucket deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique id the execution layer keys its Trade result to
    pub operation_id: String,
    /// Venue the operation executes on
    pub venue: String,
    pub operation: Operation,
    pub source_venue: String,
    pub target_venue: String,
    pub source_token: String,
    pub target_token: String,
    pub amount: Decimal,
    /// Predicted bucket changes. Not required to net to zero: conversion
    /// rates and fees create asymmetry.
    #[serde(default)]
    pub expected_deltas: HashMap<InstrumentKey, Decimal>,
    pub strategy_intent: StrategyIntent,
    pub strategy_id: String,
    /// Orders sharing a group id must succeed or roll back together at the
    /// execution layer. Emitted here, enforced there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atomic_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_in_group: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Single-venue order: source and target venue both equal `venue`.
    pub fn new(
        venue: impl Into<String>,
        operation: Operation,
        source_token: impl Into<String>,
        target_token: impl Into<String>,
        amount: Decimal,
        strategy_intent: StrategyIntent,
        strategy_id: impl Into<String>,
    ) -> Self {
        let venue = venue.into();
        Self {
            operation_id: Uuid::new_v4().to_string(),
            source_venue: venue.clone(),
            target_venue: venue.clone(),
            venue,
            operation,
            source_token: source_token.into(),
            target_token: target_token.into(),
            amount,
            expected_deltas: HashMap::new(),
            strategy_intent,
            strategy_id: strategy_id.into(),
            atomic_group_id: None,
            sequence_in_group: None,
            created_at: Utc::now(),
        }
    }

    /// Venue-to-venue transfer of one token.
    pub fn transfer(
        source_venue: impl Into<String>,
        target_venue: impl Into<String>,
        token: impl Into<String>,
        amount: Decimal,
        strategy_intent: StrategyIntent,
        strategy_id: impl Into<String>,
    ) -> Self {
        let source_venue = source_venue.into();
        let token = token.into();
        Self {
            operation_id: Uuid::new_v4().to_string(),
            venue: source_venue.clone(),
            operation: Operation::Transfer,
            source_venue,
            target_venue: target_venue.into(),
            source_token: token.clone(),
            target_token: token,
            amount,
            expected_deltas: HashMap::new(),
            strategy_intent,
            strategy_id: strategy_id.into(),
            atomic_group_id: None,
            sequence_in_group: None,
            created_at: Utc::now(),
        }
    }

    /// Attach this order to an all-or-nothing group.
    pub fn in_group(mut self, group_id: impl Into<String>, sequence: u32) -> Self {
        self.atomic_group_id = Some(group_id.into());
        self.sequence_in_group = Some(sequence);
        self
    }

    pub fn with_deltas(mut self, deltas: HashMap<InstrumentKey, Decimal>) -> Self {
        self.expected_deltas = deltas;
        self
    }

    /// Structural invariants every emitted order must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.amount < Decimal::ZERO {
            return Err(StrataError::Validation(format!(
                "order {} has negative amount {}",
                self.operation_id, self.amount
            )));
        }
        if self.atomic_group_id.is_some() != self.sequence_in_group.is_some() {
            return Err(StrataError::Validation(format!(
                "order {} has a partial atomic-group annotation",
                self.operation_id
            )));
        }
        Ok(())
    }
}

/// Fresh group id for a set of orders that must apply atomically.
pub fn new_atomic_group_id() -> String {
    Uuid::new_v4().to_string()
}
