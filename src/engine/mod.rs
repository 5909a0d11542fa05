//! Strategy decision engine
//!
//! Orchestrates one decision tick end to end: pull snapshots, resolve the
//! active strategy, generate orders, annotate deltas, classify, record, and
//! emit audit events. Every step is independently guarded: a failing
//! collaborator degrades the tick, it never aborts it. The engine always
//! hands the execution layer a (possibly empty) order list.

pub mod health;

pub use health::{
    EngineHealth, HealthStatus, DEGRADED_ERROR_THRESHOLD, UNHEALTHY_ERROR_THRESHOLD,
};

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::deltas::DeltaCalculator;
use crate::domain::{
    ActionRecord, DecisionType, ExposureSnapshot, MarketSnapshot, Order, PositionSnapshot,
    RiskSnapshot, StrategyState, TriggerSource,
};
use crate::error::{Result, StrataError};
use crate::eventlog::{
    ConfigEvent, DecisionEvent, DomainEventLog, EngineErrorEvent, EventKind, HealthEvent,
    LifecycleEvent, RateLookupEvent,
};
use crate::providers::{ExposureProvider, MarketDataProvider, RiskProvider};
use crate::strategy::{StrategyDeps, StrategyImplementation, StrategyMode, StrategyRegistry};

/// Top-level orchestrator. One instance per run; all state is owned here and
/// mutated only by this instance's own tick execution.
pub struct StrategyDecisionEngine {
    market: Arc<dyn MarketDataProvider>,
    exposure: Arc<dyn ExposureProvider>,
    risk: Arc<dyn RiskProvider>,
    registry: StrategyRegistry,
    deps: StrategyDeps,
    mode: StrategyMode,
    /// Resolved once and cached; resolution failures are retried next tick
    strategy: Option<Box<dyn StrategyImplementation>>,
    calculator: DeltaCalculator,
    log: Arc<DomainEventLog>,
    state: StrategyState,
    health: EngineHealth,
}

impl StrategyDecisionEngine {
    pub fn new(
        mode: StrategyMode,
        registry: StrategyRegistry,
        deps: StrategyDeps,
        market: Arc<dyn MarketDataProvider>,
        exposure: Arc<dyn ExposureProvider>,
        risk: Arc<dyn RiskProvider>,
        log: Arc<DomainEventLog>,
    ) -> Self {
        let calculator = DeltaCalculator::new(deps.rates.clone());
        log.append(
            Utc::now().timestamp_millis(),
            EventKind::Lifecycle,
            &LifecycleEvent {
                phase: "engine_started".to_string(),
                detail: Some(mode.to_string()),
            },
        );
        Self {
            market,
            exposure,
            risk,
            registry,
            deps,
            mode,
            strategy: None,
            calculator,
            log,
            state: StrategyState::new(),
            health: EngineHealth::new(),
        }
    }

    /// Wire an engine from loaded configuration. Configuration problems
    /// (unknown mode, unparseable allow-list) surface here and block
    /// startup; nothing else does.
    pub fn from_config(
        config: &AppConfig,
        market: Arc<dyn MarketDataProvider>,
        exposure: Arc<dyn ExposureProvider>,
        risk: Arc<dyn RiskProvider>,
        rates: Arc<dyn crate::providers::RateSource>,
        log: Arc<DomainEventLog>,
    ) -> Result<Self> {
        let mode = StrategyMode::parse(&config.strategy.mode)
            .ok_or_else(|| StrataError::UnknownStrategyMode(config.strategy.mode.clone()))?;
        let deps = StrategyDeps {
            settings: config.strategy.clone(),
            allow_list: config.allow_list()?,
            rates,
        };
        Ok(Self::new(
            mode,
            StrategyRegistry::with_builtins(),
            deps,
            market,
            exposure,
            risk,
            log,
        ))
    }

    /// Run one decision tick. Always returns an order list; a degraded tick
    /// returns an empty one.
    pub async fn tick(&mut self, trigger: TriggerSource) -> Vec<Order> {
        let now = Utc::now();
        let ts = now.timestamp_millis();
        info!(%trigger, "decision tick started");

        // Snapshots: each collaborator is guarded separately and degrades to
        // a safe default.
        let market = match self.market.get_data(now).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_error(ts, "market_snapshot", &e);
                MarketSnapshot::empty(now)
            }
        };
        let exposure = match self.exposure.get_current_exposure().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_error(ts, "exposure_snapshot", &e);
                ExposureSnapshot::empty()
            }
        };
        let risk = match self.risk.get_current_risk_metrics().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_error(ts, "risk_snapshot", &e);
                RiskSnapshot::normal()
            }
        };
        let positions = PositionSnapshot::from_exposure(&exposure, now);

        self.log.append_async(ts, EventKind::MarketSnapshot, &market);
        self.log.append_async(ts, EventKind::ExposureSnapshot, &exposure);
        self.log.append_async(ts, EventKind::RiskSnapshot, &risk);
        self.log.append_async(ts, EventKind::PositionSnapshot, &positions);

        let generated = if let Some(strategy) = self.resolve_strategy(ts) {
            strategy
                .generate_orders(now, &exposure, &risk, &market, &positions)
                .await
        } else {
            Ok(Vec::new())
        };
        let generated = match generated {
            Ok(orders) => orders,
            Err(e) => {
                self.record_error(ts, "generate_orders", &e);
                Vec::new()
            }
        };

        let orders = self.annotate_and_emit(ts, generated);

        let decision = DecisionType::classify(trigger, orders.iter().map(|o| o.strategy_intent));
        self.state.record(ActionRecord {
            timestamp: now,
            trigger,
            decision,
            order_count: orders.len(),
        });

        let strategy_id = self
            .strategy
            .as_ref()
            .map(|s| s.strategy_id().to_string())
            .unwrap_or_else(|| self.mode.to_string());
        self.log.append_async(
            ts,
            EventKind::StrategyDecision,
            &DecisionEvent {
                trigger,
                decision,
                strategy_id,
                order_count: orders.len(),
                orders_generated_total: self.state.orders_generated(),
                health: self.health.status(),
                error_count: self.health.error_count(),
            },
        );

        info!(
            %decision,
            order_count = orders.len(),
            health = ?self.health.status(),
            "decision tick finished"
        );
        orders
    }

    /// Validate each order, make sure its expected deltas are populated, and
    /// emit its audit event. Structurally invalid orders are dropped and
    /// counted.
    fn annotate_and_emit(&mut self, ts: i64, generated: Vec<Order>) -> Vec<Order> {
        let mut orders = Vec::with_capacity(generated.len());
        for mut order in generated {
            if let Err(e) = order.validate() {
                self.record_error(ts, "order_validation", &e);
                continue;
            }
            if order.expected_deltas.is_empty() {
                let outcome = self.calculator.calculate_detailed(&order);
                for lookup in outcome.rate_lookups {
                    self.log.append_async(
                        ts,
                        EventKind::RateLookup,
                        &RateLookupEvent {
                            operation_id: order.operation_id.clone(),
                            lookup,
                        },
                    );
                }
                if outcome.deltas.is_empty() {
                    // Empty deltas are "no-op, investigate", not success.
                    self.record_error(
                        ts,
                        "delta_calculation",
                        &StrataError::Internal(format!(
                            "no deltas for order {}",
                            order.operation_id
                        )),
                    );
                }
                order.expected_deltas = outcome.deltas;
            }
            self.log.append_async(ts, EventKind::Order, &order);
            orders.push(order);
        }
        orders
    }

    fn resolve_strategy(&mut self, ts: i64) -> Option<&mut Box<dyn StrategyImplementation>> {
        if self.strategy.is_none() {
            match self.registry.build(self.mode, &self.deps) {
                Ok(strategy) => {
                    self.log.append(
                        ts,
                        EventKind::Config,
                        &ConfigEvent {
                            strategy_mode: self.mode.to_string(),
                            strategy_id: strategy.strategy_id().to_string(),
                        },
                    );
                    self.strategy = Some(strategy);
                }
                Err(e) => {
                    self.record_error(ts, "strategy_resolution", &e);
                }
            }
        }
        self.strategy.as_mut()
    }

    fn record_error(&mut self, ts: i64, step: &str, err: &StrataError) {
        warn!(step, "tick step failed: {err}");
        let before = self.health.status();
        let after = self.health.record_error();
        self.log.append_async(
            ts,
            EventKind::EngineError,
            &EngineErrorEvent {
                step: step.to_string(),
                message: err.to_string(),
            },
        );
        if before != after {
            warn!(?before, ?after, "engine health changed");
            self.log.append_async(
                ts,
                EventKind::Health,
                &HealthEvent {
                    status: after,
                    error_count: self.health.error_count(),
                },
            );
        }
    }

    /// Flush the audit log and mark the run finished.
    pub async fn shutdown(&self) {
        self.log.append(
            Utc::now().timestamp_millis(),
            EventKind::Lifecycle,
            &LifecycleEvent {
                phase: "engine_stopped".to_string(),
                detail: None,
            },
        );
        self.log.flush().await;
    }

    pub fn mode(&self) -> StrategyMode {
        self.mode
    }

    pub fn health(&self) -> HealthStatus {
        self.health.status()
    }

    pub fn error_count(&self) -> u32 {
        self.health.error_count()
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }
}
