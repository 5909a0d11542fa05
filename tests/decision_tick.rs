//! End-to-end decision tick tests: engine + strategies + audit log wired
//! together with stub collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use strata::domain::{
    DecisionType, ExposureSnapshot, MarketSnapshot, Order, PositionSnapshot, RiskSnapshot,
    StrategyIntent, TriggerSource,
};
use strata::engine::{HealthStatus, StrategyDecisionEngine};
use strata::eventlog::{DomainEventLog, EventKind};
use strata::providers::{ExposureProvider, MarketDataProvider, RateSource, RiskProvider};
use strata::strategy::{StrategyDeps, StrategyImplementation, StrategyMode, StrategyRegistry};
use strata::{AppConfig, Result, StrataError};

// ---------------------------------------------------------------------------
// Stub collaborators
// ---------------------------------------------------------------------------

struct StaticMarket(MarketSnapshot);

#[async_trait]
impl MarketDataProvider for StaticMarket {
    async fn get_data(&self, _timestamp: DateTime<Utc>) -> Result<MarketSnapshot> {
        Ok(self.0.clone())
    }
}

struct FailingMarket;

#[async_trait]
impl MarketDataProvider for FailingMarket {
    async fn get_data(&self, _timestamp: DateTime<Utc>) -> Result<MarketSnapshot> {
        Err(StrataError::SnapshotUnavailable("market feed down".into()))
    }
}

struct StaticExposure(ExposureSnapshot);

#[async_trait]
impl ExposureProvider for StaticExposure {
    async fn get_current_exposure(&self) -> Result<ExposureSnapshot> {
        Ok(self.0.clone())
    }
}

struct FailingExposure;

#[async_trait]
impl ExposureProvider for FailingExposure {
    async fn get_current_exposure(&self) -> Result<ExposureSnapshot> {
        Err(StrataError::SnapshotUnavailable("exposure feed down".into()))
    }
}

struct NormalRisk;

#[async_trait]
impl RiskProvider for NormalRisk {
    async fn get_current_risk_metrics(&self) -> Result<RiskSnapshot> {
        Ok(RiskSnapshot::normal())
    }
}

struct FailingRisk;

#[async_trait]
impl RiskProvider for FailingRisk {
    async fn get_current_risk_metrics(&self) -> Result<RiskSnapshot> {
        Err(StrataError::SnapshotUnavailable("risk feed down".into()))
    }
}

#[derive(Debug)]
struct UnitRates;

impl RateSource for UnitRates {
    fn get_supply_index(&self, _asset: &str) -> Result<Decimal> {
        Ok(Decimal::ONE)
    }

    fn get_staking_rate(&self, _from: &str, _to: &str) -> Result<Decimal> {
        Ok(Decimal::ONE)
    }
}

/// A strategy whose generation path always fails internally.
#[derive(Debug)]
struct BrokenStrategy;

#[async_trait]
impl StrategyImplementation for BrokenStrategy {
    fn strategy_id(&self) -> &str {
        "broken_v1"
    }

    async fn generate_orders(
        &mut self,
        _timestamp: DateTime<Utc>,
        _exposure: &ExposureSnapshot,
        _risk: &RiskSnapshot,
        _market: &MarketSnapshot,
        _positions: &PositionSnapshot,
    ) -> Result<Vec<Order>> {
        Err(StrataError::StrategyFailure {
            strategy_id: "broken_v1".to_string(),
            reason: "simulated internal failure".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

fn lending_exposure() -> ExposureSnapshot {
    let mut exposure = ExposureSnapshot::empty();
    exposure.equity = dec!(1000);
    exposure
        .positions
        .insert("aave:BaseToken:USDC".parse().unwrap(), dec!(1000));
    exposure
}

fn deps(cfg: &AppConfig) -> StrategyDeps {
    StrategyDeps {
        settings: cfg.strategy.clone(),
        allow_list: cfg.allow_list().unwrap(),
        rates: Arc::new(UnitRates),
    }
}

fn engine_with(
    log: Arc<DomainEventLog>,
    registry: StrategyRegistry,
    market: Arc<dyn MarketDataProvider>,
    exposure: Arc<dyn ExposureProvider>,
    risk: Arc<dyn RiskProvider>,
) -> StrategyDecisionEngine {
    let cfg = AppConfig::default_config("pure_lending");
    StrategyDecisionEngine::new(
        StrategyMode::PureLending,
        registry,
        deps(&cfg),
        market,
        exposure,
        risk,
        log,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lending_tick_produces_annotated_entry_order() {
    let tmp = tempfile::tempdir().unwrap();
    let log = Arc::new(DomainEventLog::open(tmp.path(), "tick-entry").unwrap());

    let mut engine = engine_with(
        log.clone(),
        StrategyRegistry::with_builtins(),
        Arc::new(StaticMarket(MarketSnapshot::empty(Utc::now()))),
        Arc::new(StaticExposure(lending_exposure())),
        Arc::new(NormalRisk),
    );

    let orders = engine.tick(TriggerSource::FullLoop).await;

    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.strategy_intent, StrategyIntent::EntryFull);
    assert_eq!(order.amount, dec!(950));
    assert!(!order.expected_deltas.is_empty());
    assert_eq!(order.strategy_id, "pure_lending_v1");

    assert_eq!(engine.health(), HealthStatus::Healthy);
    assert_eq!(engine.error_count(), 0);
    assert_eq!(engine.state().orders_generated(), 1);
    assert_eq!(
        engine.state().last_action().unwrap().decision,
        DecisionType::Entry
    );

    // The decision and order events are on disk and replayable.
    log.flush().await;
    let decisions = log.read_stream(EventKind::StrategyDecision).unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].payload["decision"], "entry");
    assert_eq!(decisions[0].payload["order_count"], 1);
    assert!(decisions[0].order.unwrap() >= 1);

    let order_events = log.read_stream(EventKind::Order).unwrap();
    assert_eq!(order_events.len(), 1);
    assert_eq!(
        order_events[0].payload["operation_id"],
        order.operation_id.as_str()
    );
}

#[tokio::test]
async fn failing_collaborators_degrade_but_never_abort() {
    let tmp = tempfile::tempdir().unwrap();
    let log = Arc::new(DomainEventLog::open(tmp.path(), "tick-degrade").unwrap());

    let mut engine = engine_with(
        log.clone(),
        StrategyRegistry::with_builtins(),
        Arc::new(FailingMarket),
        Arc::new(FailingExposure),
        Arc::new(FailingRisk),
    );

    // Every tick still returns a list; three provider errors are counted per
    // tick, walking health through its tiers.
    let orders = engine.tick(TriggerSource::FullLoop).await;
    assert!(orders.is_empty());
    assert_eq!(engine.error_count(), 3);
    assert_eq!(engine.health(), HealthStatus::Healthy);

    engine.tick(TriggerSource::FullLoop).await;
    assert_eq!(engine.error_count(), 6);
    assert_eq!(engine.health(), HealthStatus::Degraded);

    engine.tick(TriggerSource::FullLoop).await;
    engine.tick(TriggerSource::FullLoop).await;
    assert_eq!(engine.error_count(), 12);
    assert_eq!(engine.health(), HealthStatus::Unhealthy);

    // Ticks classify as hold and are still audited.
    log.flush().await;
    let decisions = log.read_stream(EventKind::StrategyDecision).unwrap();
    assert_eq!(decisions.len(), 4);
    assert!(decisions.iter().all(|d| d.payload["decision"] == "hold"));

    let errors = log.read_stream(EventKind::EngineError).unwrap();
    assert_eq!(errors.len(), 12);
    let health_events = log.read_stream(EventKind::Health).unwrap();
    assert_eq!(health_events.len(), 2); // healthy→degraded, degraded→unhealthy
}

#[tokio::test]
async fn broken_strategy_yields_empty_tick_not_propagation() {
    let tmp = tempfile::tempdir().unwrap();
    let log = Arc::new(DomainEventLog::open(tmp.path(), "tick-broken").unwrap());

    let mut registry = StrategyRegistry::with_builtins();
    registry.register(StrategyMode::PureLending, |_| Ok(Box::new(BrokenStrategy)));

    let mut engine = engine_with(
        log.clone(),
        registry,
        Arc::new(StaticMarket(MarketSnapshot::empty(Utc::now()))),
        Arc::new(StaticExposure(lending_exposure())),
        Arc::new(NormalRisk),
    );

    let orders = engine.tick(TriggerSource::Manual).await;
    assert!(orders.is_empty());
    assert_eq!(engine.error_count(), 1);

    log.flush().await;
    let errors = log.read_stream(EventKind::EngineError).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].payload["step"], "generate_orders");
}

#[tokio::test]
async fn strategy_resolution_failure_is_caught_and_retried() {
    let tmp = tempfile::tempdir().unwrap();
    let log = Arc::new(DomainEventLog::open(tmp.path(), "tick-resolution").unwrap());

    let mut registry = StrategyRegistry::with_builtins();
    registry.register(StrategyMode::PureLending, |_| {
        Err(StrataError::MissingConfigKey("lending.venue".to_string()))
    });

    let mut engine = engine_with(
        log.clone(),
        registry,
        Arc::new(StaticMarket(MarketSnapshot::empty(Utc::now()))),
        Arc::new(StaticExposure(lending_exposure())),
        Arc::new(NormalRisk),
    );

    let orders = engine.tick(TriggerSource::FullLoop).await;
    assert!(orders.is_empty());
    assert_eq!(engine.error_count(), 1);

    // The tick after a resolution failure tries again rather than caching
    // the failure.
    engine.tick(TriggerSource::FullLoop).await;
    assert_eq!(engine.error_count(), 2);
}

#[tokio::test]
async fn risk_triggered_unwind_classifies_as_emergency_exit() {
    let tmp = tempfile::tempdir().unwrap();
    let log = Arc::new(DomainEventLog::open(tmp.path(), "tick-emergency").unwrap());

    struct CriticalRisk;

    #[async_trait]
    impl RiskProvider for CriticalRisk {
        async fn get_current_risk_metrics(&self) -> Result<RiskSnapshot> {
            let mut risk = RiskSnapshot::normal();
            risk.risk_level = strata::domain::RiskLevel::Critical;
            Ok(risk)
        }
    }

    let mut exposure = ExposureSnapshot::empty();
    exposure.equity = dec!(1000);
    exposure
        .positions
        .insert("aave:LST/aToken:aUSDC".parse().unwrap(), dec!(950));

    let mut engine = engine_with(
        log.clone(),
        StrategyRegistry::with_builtins(),
        Arc::new(StaticMarket(MarketSnapshot::empty(Utc::now()))),
        Arc::new(StaticExposure(exposure)),
        Arc::new(CriticalRisk),
    );

    let orders = engine.tick(TriggerSource::RiskTrigger).await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].strategy_intent, StrategyIntent::ExitFull);
    assert_eq!(
        engine.state().last_action().unwrap().decision,
        DecisionType::EmergencyExit
    );
}

#[tokio::test]
async fn from_config_rejects_unknown_mode_at_startup() {
    let tmp = tempfile::tempdir().unwrap();
    let log = Arc::new(DomainEventLog::open(tmp.path(), "tick-config").unwrap());

    let mut cfg = AppConfig::default_config("pure_lending");
    cfg.strategy.mode = "yield_maximizer".to_string();

    let result = StrategyDecisionEngine::from_config(
        &cfg,
        Arc::new(StaticMarket(MarketSnapshot::empty(Utc::now()))),
        Arc::new(StaticExposure(lending_exposure())),
        Arc::new(NormalRisk),
        Arc::new(UnitRates),
        log,
    );
    assert!(matches!(
        result,
        Err(StrataError::UnknownStrategyMode(_))
    ));
}

#[tokio::test]
async fn audit_lines_carry_required_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let log = Arc::new(DomainEventLog::open(tmp.path(), "tick-audit").unwrap());

    let mut engine = engine_with(
        log.clone(),
        StrategyRegistry::with_builtins(),
        Arc::new(StaticMarket(MarketSnapshot::empty(Utc::now()))),
        Arc::new(StaticExposure(lending_exposure())),
        Arc::new(NormalRisk),
    );
    engine.tick(TriggerSource::FullLoop).await;
    engine.shutdown().await;

    for kind in [
        EventKind::StrategyDecision,
        EventKind::Order,
        EventKind::MarketSnapshot,
        EventKind::ExposureSnapshot,
        EventKind::RiskSnapshot,
        EventKind::PositionSnapshot,
        EventKind::Lifecycle,
        EventKind::Config,
    ] {
        let events = log.read_stream(kind).unwrap();
        assert!(!events.is_empty(), "no events persisted for {kind}");
        for event in events {
            assert_eq!(event.correlation_id, "tick-audit");
            assert_eq!(event.pid, std::process::id());
            assert!(event.ts > 0);
            if let Some(order) = event.order {
                assert!(order >= 1);
            }
        }
    }
}
