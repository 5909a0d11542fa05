//! Trade value object
//!
//! The execution outcome the (external) execution layer produces for one
//! order, keyed by `operation_id`. This core only carries the type and its
//! invariants; reconciliation against expected deltas happens elsewhere.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::instrument::{InstrumentKey, VenueKind, VenueRegistry};
use crate::error::{Result, StrataError};

/// Execution status of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Executed,
    Failed,
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Executed | TradeStatus::Failed | TradeStatus::Cancelled
        )
    }
}

/// Execution outcome for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub operation_id: String,
    pub venue: String,
    pub status: TradeStatus,
    /// Realized bucket changes, as settled
    #[serde(default)]
    pub position_deltas: HashMap<InstrumentKey, Decimal>,
    pub fees: Decimal,
    pub slippage: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn pending(operation_id: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            venue: venue.into(),
            status: TradeStatus::Pending,
            position_deltas: HashMap::new(),
            fees: Decimal::ZERO,
            slippage: Decimal::ZERO,
            price: None,
            error_code: None,
            error_message: None,
            executed_at: None,
        }
    }

    pub fn executed(
        operation_id: impl Into<String>,
        venue: impl Into<String>,
        position_deltas: HashMap<InstrumentKey, Decimal>,
        fees: Decimal,
        slippage: Decimal,
        price: Option<Decimal>,
    ) -> Self {
        Self {
            status: TradeStatus::Executed,
            position_deltas,
            fees,
            slippage,
            price,
            executed_at: Some(Utc::now()),
            ..Self::pending(operation_id, venue)
        }
    }

    pub fn failed(
        operation_id: impl Into<String>,
        venue: impl Into<String>,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            status: TradeStatus::Failed,
            error_code: Some(error_code.into()),
            error_message: Some(error_message.into()),
            ..Self::pending(operation_id, venue)
        }
    }

    pub fn cancelled(operation_id: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            status: TradeStatus::Cancelled,
            ..Self::pending(operation_id, venue)
        }
    }

    /// Status invariants: executed trades carry deltas (and a price on CEX
    /// venues), failed trades carry an error code and message.
    pub fn validate(&self, venues: &VenueRegistry) -> Result<()> {
        match self.status {
            TradeStatus::Executed => {
                if self.position_deltas.is_empty() {
                    return Err(StrataError::Validation(format!(
                        "executed trade {} has no position deltas",
                        self.operation_id
                    )));
                }
                if venues.kind_of(&self.venue) == Some(VenueKind::Cex) && self.price.is_none() {
                    return Err(StrataError::Validation(format!(
                        "executed CEX trade {} has no price",
                        self.operation_id
                    )));
                }
            }
            TradeStatus::Failed => {
                if self.error_code.is_none() || self.error_message.is_none() {
                    return Err(StrataError::Validation(format!(
                        "failed trade {} is missing error code or message",
                        self.operation_id
                    )));
                }
            }
            TradeStatus::Pending | TradeStatus::Cancelled => {}
        }
        Ok(())
    }
}
