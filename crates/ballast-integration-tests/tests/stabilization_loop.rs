//! Integration test: the oracle → controller → token loop over several
//! rebase periods.
//!
//! 1. Aggregate three feeds into one price
//! 2. Expand supply while the price is above target
//! 3. Respect the dynamic cooldown between rebases
//! 4. Settle to no-op once the price is back at the peg
//! 5. Contract supply when the price falls below target

use std::sync::Arc;

use serde_json::json;

use ballast_oracle::{AggregatorConfig, OracleAggregator, SourceParams, StaticFeed};
use ballast_params::{BandTable, CooldownPolicy, EconomicParameterManager};
use ballast_stabilizer::{
    ControllerConfig, ElasticSupply, RebaseOutcome, RebaseToken, StabilizationController,
};
use ballast_types::events::EventType;
use ballast_types::{AllowAll, WAD};

const T0: u64 = 1_700_000_000;
const HOUR: u64 = 3_600;
const SUPPLY: u128 = 1_000_000;

type Controller = StabilizationController<OracleAggregator, ElasticSupply>;

/// Three equally weighted feeds quoting in 8 decimals.
fn market() -> (OracleAggregator, Vec<Arc<StaticFeed>>) {
    let mut oracle =
        OracleAggregator::new(AggregatorConfig::default(), Arc::new(AllowAll)).expect("oracle");
    let mut feeds = Vec::new();
    for name in ["alpha", "beta", "gamma"] {
        let (feed, handle) = StaticFeed::shared(100_000_000, T0);
        let params = SourceParams {
            key: name.to_string(),
            weight: 100,
            heartbeat: HOUR,
            decimals: 8,
            description: format!("{name} exchange"),
        };
        oracle.add_source("ops", params, handle, T0).expect("add source");
        feeds.push(feed);
    }
    (oracle, feeds)
}

fn quote(feeds: &[Arc<StaticFeed>], cents: i128, now: u64) {
    for feed in feeds {
        feed.dev_set_price(cents * 1_000_000, now);
    }
}

fn controller(oracle: OracleAggregator) -> Controller {
    let manager = EconomicParameterManager::new(BandTable::default(), CooldownPolicy::default())
        .expect("manager");
    StabilizationController::new(
        ControllerConfig::default(),
        BandTable::default(),
        oracle,
        ElasticSupply::unbounded(SUPPLY),
        Arc::new(AllowAll),
    )
    .expect("controller")
    .with_strategy(Arc::new(manager))
}

#[test]
fn expansion_then_convergence() {
    let (oracle, feeds) = market();
    let mut controller = controller(oracle);

    // =========================================================
    // Step 1: $1.10 → band 3, +5% (band cap)
    // =========================================================
    quote(&feeds, 110, T0);
    let aggregate = controller.oracle().aggregated_price(T0).expect("aggregate");
    assert_eq!(aggregate.price, WAD * 110 / 100);
    assert_eq!(aggregate.confidence, 100);

    let outcome = controller.rebase(T0).expect("first rebase");
    assert!(matches!(outcome, RebaseOutcome::Applied { .. }));
    assert_eq!(outcome.supply_delta(), 50_000);
    assert_eq!(controller.token().total_supply(), 1_050_000);

    // =========================================================
    // Step 2: the dynamic cooldown holds the next attempt
    // =========================================================
    let next = controller.next_rebase_at(T0).expect("scheduled");
    assert!(next > T0 + HOUR, "cooldown at least the band floor");
    quote(&feeds, 104, next - 1);
    assert_eq!(
        controller.rebase(next - 1).expect("early attempt"),
        RebaseOutcome::CooldownActive {
            next_allowed: next
        }
    );
    assert_eq!(controller.history().len(), 1);

    // =========================================================
    // Step 3: $1.04 → band 1, 10% damping of a 4% correction
    // =========================================================
    quote(&feeds, 104, next);
    let outcome = controller.rebase(next).expect("second rebase");
    let record = outcome.record().expect("record");
    assert_eq!(record.band, 1);
    // 1_050_000 * 0.04 * 0.10
    assert_eq!(record.supply_delta, 4_200);
    assert_eq!(record.new_supply, 1_054_200);
    assert_eq!(controller.circuit_breaker().consecutive_rebases(), 2);

    // =========================================================
    // Step 4: back at the peg → recorded no-op, streak cleared
    // =========================================================
    let next = controller.next_rebase_at(next).expect("scheduled");
    quote(&feeds, 100, next);
    let outcome = controller.rebase(next).expect("third attempt");
    assert!(matches!(outcome, RebaseOutcome::NoChange { .. }));
    assert_eq!(controller.token().total_supply(), 1_054_200);
    assert_eq!(controller.rebase_count(), 2);
    assert_eq!(controller.circuit_breaker().consecutive_rebases(), 0);

    let deltas: Vec<i128> = controller.history().iter().map(|r| r.supply_delta).collect();
    assert_eq!(deltas, vec![50_000, 4_200, 0]);

    let executed: Vec<_> = controller
        .drain_events()
        .into_iter()
        .filter(|e| e.event_type == EventType::RebaseExecuted)
        .collect();
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[0].payload["band"], json!(3));
    assert_eq!(executed[0].payload["supply_delta"], json!("50000"));
    assert_eq!(executed[1].payload["new_supply"], json!("1054200"));
    assert_eq!(executed[1].payload["rebase_count"], json!(2));
}

#[test]
fn contraction_below_target() {
    let (oracle, feeds) = market();
    let mut controller = controller(oracle);

    // $0.95 → band 2: 25% damping of a 5% correction
    quote(&feeds, 95, T0);
    let outcome = controller.rebase(T0).expect("rebase");
    assert_eq!(outcome.supply_delta(), -12_500);
    assert_eq!(controller.token().total_supply(), 987_500);

    let record = outcome.record().expect("record");
    assert_eq!(record.band, 2);
    assert_eq!(record.deviation, WAD / 20);
    assert!(!record.is_expansion());
}

#[test]
fn small_wobbles_never_move_supply() {
    let (oracle, feeds) = market();
    let mut controller = controller(oracle);

    // Just inside band 0 (under 1%) for a few hourly checks
    let prices = [100_000_000, 100_990_000, 99_010_000, 100_500_000, 100_000_000];
    for (i, price) in prices.into_iter().enumerate() {
        let now = T0 + i as u64 * HOUR;
        for feed in &feeds {
            feed.dev_set_price(price, now);
        }
        let outcome = controller.rebase(now).expect("rebase");
        assert!(matches!(outcome, RebaseOutcome::NoChange { .. }), "tick {i}");
    }
    assert_eq!(controller.token().total_supply(), SUPPLY);
    assert_eq!(controller.last_rebase_time(), None);
    assert!(controller.history().iter().all(|r| r.is_noop()));
}
