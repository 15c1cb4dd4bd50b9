//! Integration test: controller state survives a restart through the
//! database.
//!
//! 1. Rebase, then store the record, controller state and token
//! 2. Rebuild a controller from the database
//! 3. The restored controller honours the original cooldown, breaker and
//!    consecutive-rebase streak

use std::sync::Arc;

use rusqlite::Connection;

use ballast_db::queries::{prices, rebases, settings};
use ballast_oracle::{AggregatorConfig, OracleAggregator, SourceParams, StaticFeed};
use ballast_params::BandTable;
use ballast_stabilizer::{
    ControllerConfig, ControllerState, ElasticSupply, RebaseOutcome, RebaseToken,
    StabilizationController,
};
use ballast_types::{AllowAll, WAD};

const T0: u64 = 1_700_000_000;
const HOUR: u64 = 3_600;

type Controller = StabilizationController<OracleAggregator, ElasticSupply>;

fn oracle(price: i128, now: u64) -> OracleAggregator {
    let mut oracle =
        OracleAggregator::new(AggregatorConfig::default(), Arc::new(AllowAll)).expect("oracle");
    for key in ["alpha", "beta", "gamma"] {
        let params = SourceParams {
            key: key.to_string(),
            weight: 100,
            heartbeat: HOUR,
            decimals: 8,
            description: String::new(),
        };
        oracle
            .add_source("ops", params, Arc::new(StaticFeed::new(price, now)), now)
            .expect("add source");
    }
    oracle
}

fn controller(oracle: OracleAggregator, token: ElasticSupply) -> Controller {
    StabilizationController::new(
        ControllerConfig::default(),
        BandTable::default(),
        oracle,
        token,
        Arc::new(AllowAll),
    )
    .expect("controller")
}

fn persist(conn: &Connection, controller: &Controller, outcome: &RebaseOutcome) {
    if let Some(record) = outcome.record() {
        rebases::insert(conn, record).expect("insert record");
    }
    settings::set_json(conn, settings::CONTROLLER_STATE_KEY, &controller.state())
        .expect("store state");
    settings::set_json(conn, settings::TOKEN_STATE_KEY, controller.token()).expect("store token");
}

/// Rebuild a controller the way the daemon does at startup.
fn reload(conn: &Connection, oracle: OracleAggregator) -> Controller {
    let token: ElasticSupply = settings::get_json(conn, settings::TOKEN_STATE_KEY)
        .expect("read token")
        .expect("token stored");
    let state: ControllerState = settings::get_json(conn, settings::CONTROLLER_STATE_KEY)
        .expect("read state")
        .expect("state stored");
    let mut controller = controller(oracle, token);
    controller.restore(state, rebases::all(conn).expect("records"));
    controller
}

#[test]
fn restart_preserves_cooldown_and_streak() {
    let conn = ballast_db::open_memory().expect("db");

    // =========================================================
    // Step 1: first run rebases at $1.10
    // =========================================================
    {
        let mut first = controller(oracle(110_000_000, T0), ElasticSupply::unbounded(1_000_000));
        let outcome = first.rebase(T0).expect("rebase");
        assert_eq!(outcome.supply_delta(), 50_000);
        persist(&conn, &first, &outcome);
    }

    // =========================================================
    // Step 2: restart an hour later, still in cooldown
    // =========================================================
    let mut second = reload(&conn, oracle(110_000_000, T0 + HOUR));
    assert_eq!(second.token().total_supply(), 1_050_000);
    assert_eq!(second.rebase_count(), 1);
    assert_eq!(second.history().len(), 1);
    assert_eq!(second.circuit_breaker().consecutive_rebases(), 1);
    assert_eq!(
        second.rebase(T0 + HOUR).expect("early"),
        RebaseOutcome::CooldownActive {
            next_allowed: T0 + 12 * HOUR
        }
    );

    // =========================================================
    // Step 3: restart again once the cooldown has elapsed
    // =========================================================
    let now = T0 + 12 * HOUR;
    let mut third = reload(&conn, oracle(110_000_000, now));
    let outcome = third.rebase(now).expect("rebase");
    assert_eq!(outcome.supply_delta(), 52_500);
    assert_eq!(third.circuit_breaker().consecutive_rebases(), 2);
    persist(&conn, &third, &outcome);

    let stored = rebases::all(&conn).expect("records");
    let supplies: Vec<u128> = stored.iter().map(|r| r.new_supply).collect();
    assert_eq!(supplies, vec![1_050_000, 1_102_500]);
    assert_eq!(rebases::count(&conn).expect("count"), 2);
}

#[test]
fn restart_keeps_breaker_and_pause() {
    let conn = ballast_db::open_memory().expect("db");

    {
        let mut first = controller(oracle(130_000_000, T0), ElasticSupply::unbounded(1_000_000));
        let outcome = first.rebase(T0).expect("trip");
        assert!(matches!(outcome, RebaseOutcome::CircuitBreakerTriggered { .. }));
        first.pause("ops", T0).expect("pause");
        persist(&conn, &first, &outcome);
    }

    let mut restored = reload(&conn, oracle(100_000_000, T0 + HOUR));
    assert!(restored.is_paused());
    assert!(restored.circuit_breaker().is_active());
    assert_eq!(restored.circuit_breaker().activated_at(), Some(T0));
    assert!(restored.rebase(T0 + HOUR).is_err());

    restored.unpause("ops", T0 + HOUR).expect("unpause");
    assert_eq!(
        restored.rebase(T0 + HOUR).expect("held"),
        RebaseOutcome::CircuitBreakerHeld
    );
    let records = rebases::all(&conn).expect("records");
    assert_eq!(records.len(), 1);
    assert!(records[0].circuit_breaker_triggered);
}

#[test]
fn price_observations_round_trip() {
    let conn = ballast_db::open_memory().expect("db");
    let mut oracle = oracle(101_000_000, T0);

    for i in 1..=3 {
        let now = T0 + i * 60;
        let price = oracle.record_price(now).expect("record");
        prices::insert(&conn, now, &price).expect("insert");
    }

    let rows = prices::recent(&conn, 2).expect("recent");
    let stamps: Vec<u64> = rows.iter().map(|r| r.recorded_at).collect();
    assert_eq!(stamps, vec![T0 + 120, T0 + 180]);
    assert!(rows.iter().all(|r| r.price.price == WAD * 101 / 100));
    assert_eq!(rows[0].price.timestamp, T0);

    assert_eq!(prices::prune_before(&conn, T0 + 120).expect("prune"), 1);
    assert_eq!(prices::recent(&conn, 10).expect("recent").len(), 2);
}
