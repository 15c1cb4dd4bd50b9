//! Integration test: circuit breaker lifecycle.
//!
//! 1. Trip on extreme deviation, hold while the market is unsettled
//! 2. Recover automatically once the cooldown has elapsed and the price
//!    has settled, then rebase in the same call
//! 3. Manual reset gated on authorization and deviation
//! 4. Trip on a streak of severe rebases

use std::sync::Arc;

use ballast_oracle::{AggregatorConfig, OracleAggregator, SourceParams, StaticFeed};
use ballast_params::BandTable;
use ballast_stabilizer::{
    ControllerConfig, ElasticSupply, RebaseOutcome, RebaseToken, StabilizationController,
    StabilizerError,
};
use ballast_types::events::EventType;
use ballast_types::{AllowAll, AllowList, Authorizer};

const T0: u64 = 1_700_000_000;
const HOUR: u64 = 3_600;

type Controller = StabilizationController<OracleAggregator, ElasticSupply>;

struct Harness {
    controller: Controller,
    feeds: Vec<Arc<StaticFeed>>,
}

impl Harness {
    fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        let mut oracle = OracleAggregator::new(AggregatorConfig::default(), Arc::new(AllowAll))
            .expect("oracle");
        let mut feeds = Vec::new();
        for name in ["alpha", "beta", "gamma"] {
            let (feed, handle) = StaticFeed::shared(100_000_000, T0);
            let params = SourceParams {
                key: name.to_string(),
                weight: 100,
                heartbeat: HOUR,
                decimals: 8,
                description: String::new(),
            };
            oracle.add_source("ops", params, handle, T0).expect("add source");
            feeds.push(feed);
        }
        let controller = StabilizationController::new(
            ControllerConfig::default(),
            BandTable::default(),
            oracle,
            ElasticSupply::unbounded(1_000_000),
            authorizer,
        )
        .expect("controller");
        Self { controller, feeds }
    }

    /// Quote every feed at `cents` per dollar and attempt a rebase.
    fn rebase_at(&mut self, cents: i128, now: u64) -> RebaseOutcome {
        self.quote(cents, now);
        self.controller.rebase(now).expect("rebase")
    }

    fn quote(&self, cents: i128, now: u64) {
        for feed in &self.feeds {
            feed.dev_set_price(cents * 1_000_000, now);
        }
    }

    fn event_types(&mut self) -> Vec<EventType> {
        self.controller
            .drain_events()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}

#[test]
fn trip_hold_and_auto_recover() {
    let mut h = Harness::new(Arc::new(AllowAll));

    // =========================================================
    // Step 1: 25% deviation trips the breaker, supply untouched
    // =========================================================
    let outcome = h.rebase_at(125, T0);
    assert!(matches!(outcome, RebaseOutcome::CircuitBreakerTriggered { .. }));
    let record = outcome.record().expect("record");
    assert!(record.circuit_breaker_triggered);
    assert_eq!(record.supply_delta, 0);
    assert_eq!(record.band, 4);
    assert!(h.controller.circuit_breaker().is_active());
    assert_eq!(h.controller.token().total_supply(), 1_000_000);
    assert_eq!(h.event_types(), vec![EventType::CircuitBreakerActivated]);

    // =========================================================
    // Step 2: settled price, cooldown not elapsed → held
    // =========================================================
    assert_eq!(h.rebase_at(102, T0 + HOUR), RebaseOutcome::CircuitBreakerHeld);
    assert!(!h.controller.can_rebase(T0 + HOUR));

    // =========================================================
    // Step 3: cooldown elapsed, price still unsettled → held
    // =========================================================
    let not_before = h
        .controller
        .circuit_breaker()
        .recovery_not_before()
        .expect("active breaker");
    assert_eq!(not_before, T0 + 24 * HOUR);
    assert_eq!(h.rebase_at(108, not_before), RebaseOutcome::CircuitBreakerHeld);
    assert!(h.controller.circuit_breaker().is_active());
    // Held attempts append nothing
    assert_eq!(h.controller.history().len(), 1);

    // =========================================================
    // Step 4: settled → recover and rebase in the same call
    // =========================================================
    let now = not_before + 60;
    h.quote(103, now);
    assert!(h.controller.can_rebase(now));
    let outcome = h.controller.rebase(now).expect("rebase");
    assert!(matches!(outcome, RebaseOutcome::Applied { .. }));
    // 3% deviation, band 1: 10% damping
    assert_eq!(outcome.supply_delta(), 3_000);
    assert_eq!(h.controller.token().total_supply(), 1_003_000);
    assert!(!h.controller.circuit_breaker().is_active());

    let types = h.event_types();
    assert_eq!(
        types,
        vec![EventType::CircuitBreakerRecovered, EventType::RebaseExecuted]
    );
}

#[test]
fn manual_reset() {
    let mut h = Harness::new(Arc::new(AllowList::new(["guardian"])));

    let outcome = h.rebase_at(130, T0);
    assert!(matches!(outcome, RebaseOutcome::CircuitBreakerTriggered { .. }));

    // Not on the allow-list
    h.quote(100, T0 + HOUR);
    let err = h
        .controller
        .reset_circuit_breaker("mallory", T0 + HOUR)
        .unwrap_err();
    assert!(matches!(err, StabilizerError::Unauthorized { .. }));

    // 15% is above the band-3 threshold
    h.quote(115, T0 + HOUR);
    let err = h
        .controller
        .reset_circuit_breaker("guardian", T0 + HOUR)
        .unwrap_err();
    assert!(matches!(err, StabilizerError::ResetConditionsNotMet(_)));
    assert!(h.controller.circuit_breaker().is_active());

    // Exactly at the band-3 threshold is accepted
    h.quote(110, T0 + 2 * HOUR);
    h.controller
        .reset_circuit_breaker("guardian", T0 + 2 * HOUR)
        .expect("reset");
    assert!(!h.controller.circuit_breaker().is_active());
    assert_eq!(h.controller.circuit_breaker().consecutive_rebases(), 0);

    let types = h.event_types();
    assert_eq!(
        types,
        vec![
            EventType::CircuitBreakerActivated,
            EventType::CircuitBreakerReset
        ]
    );

    // A second reset has nothing to clear
    let err = h
        .controller
        .reset_circuit_breaker("guardian", T0 + 2 * HOUR)
        .unwrap_err();
    assert!(matches!(err, StabilizerError::CircuitBreakerNotActive));

    // Rebasing resumes (no supply change happened, so no cooldown)
    let outcome = h.rebase_at(110, T0 + 2 * HOUR);
    assert_eq!(outcome.supply_delta(), 50_000);
}

#[test]
fn severe_streak_trips_breaker() {
    let mut h = Harness::new(Arc::new(AllowAll));
    let cooldown = ControllerConfig::default().rebase_cooldown;

    // 10% above peg three periods in a row: 5% band cap each time
    let mut deltas = Vec::new();
    let mut flags = Vec::new();
    for i in 0..3 {
        let outcome = h.rebase_at(110, T0 + i * cooldown);
        assert!(matches!(outcome, RebaseOutcome::Applied { .. }), "period {i}");
        let record = outcome.record().expect("record");
        deltas.push(record.supply_delta);
        flags.push(record.circuit_breaker_triggered);
    }
    assert_eq!(deltas, vec![50_000, 52_500, 55_125]);
    assert_eq!(flags, vec![false, false, true]);
    assert_eq!(h.controller.token().total_supply(), 1_157_625);
    assert!(h.controller.circuit_breaker().is_active());

    let types = h.event_types();
    assert_eq!(types.last(), Some(&EventType::CircuitBreakerActivated));

    // Next period is held, supply frozen
    assert_eq!(
        h.rebase_at(110, T0 + 3 * cooldown),
        RebaseOutcome::CircuitBreakerHeld
    );
    assert_eq!(h.controller.token().total_supply(), 1_157_625);
}
