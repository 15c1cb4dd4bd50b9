//! ballast-daemon: host process for the Ballast stabilization engine.
//!
//! Single OS process running a Tokio runtime. A scheduler records oracle
//! prices and attempts rebases on a fixed tick; operators inspect and
//! administer the engine via JSON-RPC over a Unix socket.

mod commands;
mod config;
mod events;
mod feeds;
mod rpc;
mod scheduler;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use ballast_db::queries::{rebases, settings};
use ballast_oracle::{OracleAggregator, OracleError};
use ballast_params::EconomicParameterManager;
use ballast_stabilizer::{ControllerState, ElasticSupply, StabilizationController};
use ballast_types::{AllowList, Authorizer, Timestamp};

use crate::config::DaemonConfig;
use crate::events::{EventBus, EventFilter};
use crate::feeds::FixedRateFeed;
use crate::rpc::RpcServer;

/// The aggregator as shared between the controller and RPC handlers.
pub type SharedOracle = Arc<RwLock<OracleAggregator>>;

/// The controller as run by the daemon.
pub type Controller = StabilizationController<SharedOracle, ElasticSupply>;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Price aggregation.
    pub oracle: SharedOracle,
    /// Supply control loop. Lock before `db` when holding both.
    pub controller: Mutex<Controller>,
    /// Fixed-rate feeds by source key.
    pub fixed_feeds: Mutex<HashMap<String, Arc<FixedRateFeed>>>,
    /// Unix time the daemon started.
    pub started_at: Timestamp,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl DaemonState {
    /// Build the engine from configuration and whatever the database holds.
    pub fn build(
        config: DaemonConfig,
        conn: rusqlite::Connection,
        now: Timestamp,
    ) -> anyhow::Result<Self> {
        let authorizer: Arc<dyn Authorizer> =
            Arc::new(AllowList::new(config.admin.callers.iter().cloned()));

        // Oracle and its configured sources
        let mut aggregator =
            OracleAggregator::new(config.oracle.aggregator_config()?, authorizer.clone())?;
        let mut fixed_feeds = HashMap::new();
        for source in &config.oracle.sources {
            let (handle, fixed) = feeds::build_feed(&source.feed);
            match aggregator.add_source(&config.admin.operator, source.params(), handle, now) {
                Ok(()) => {
                    if let Some(feed) = fixed {
                        fixed_feeds.insert(source.key.clone(), feed);
                    }
                }
                Err(e) => warn!(key = %source.key, error = %e, "skipping configured source"),
            }
        }
        let oracle: SharedOracle = Arc::new(RwLock::new(aggregator));

        // Token supply survives restarts
        let token = match settings::get_json::<ElasticSupply>(&conn, settings::TOKEN_STATE_KEY)? {
            Some(token) => token,
            None => config.token.elastic_supply()?,
        };

        let bands = config.stabilizer.band_table()?;
        let mut controller = StabilizationController::new(
            config.stabilizer.controller_config()?,
            bands.clone(),
            oracle.clone(),
            token,
            authorizer,
        )?;
        if config.params.enabled {
            let manager = EconomicParameterManager::new(bands, config.params.cooldown_policy()?)?;
            controller = controller.with_strategy(Arc::new(manager));
        }
        if let Some(state) =
            settings::get_json::<ControllerState>(&conn, settings::CONTROLLER_STATE_KEY)?
        {
            controller.restore(state, rebases::all(&conn)?);
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            event_bus: EventBus::new(config.advanced.event_buffer.max(1)),
            config,
            oracle,
            controller: Mutex::new(controller),
            fixed_feeds: Mutex::new(fixed_feeds),
            started_at: now,
            shutdown_tx,
        })
    }

    pub fn oracle_read(&self) -> Result<RwLockReadGuard<'_, OracleAggregator>, OracleError> {
        self.oracle.read().map_err(|_| OracleError::LockPoisoned)
    }

    pub fn oracle_write(&self) -> Result<RwLockWriteGuard<'_, OracleAggregator>, OracleError> {
        self.oracle.write().map_err(|_| OracleError::LockPoisoned)
    }

    /// Broadcast everything the oracle has queued.
    pub fn flush_oracle_events(&self) {
        match self.oracle_write() {
            Ok(mut oracle) => self.event_bus.emit_all(oracle.drain_events()),
            Err(e) => error!(error = %e, "cannot drain oracle events"),
        }
    }

    /// Broadcast everything the controller has queued.
    pub fn flush_controller_events(&self, controller: &mut Controller) {
        self.event_bus.emit_all(controller.drain_events());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("ballast={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("Ballast daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let conn = ballast_db::open(&data_dir.join("ballast.db"))?;

    // 3. Build engine state
    let now = scheduler::unix_now();
    let state = Arc::new(DaemonState::build(config, conn, now)?);
    state.flush_oracle_events();

    // 4. Event log
    let filter = EventFilter::with_min_severity(&state.config.advanced.event_log_severity);
    tokio::spawn(events::log_events(state.event_bus.subscribe(), filter));

    // 5. Start IPC server
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 6. Run until shutdown
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = scheduler::run(state.clone()) => {}
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!("Daemon shutting down gracefully");

    // Persist final controller state
    {
        let controller = state.controller.lock().await;
        let db = state.db.lock().await;
        if let Err(e) = scheduler::persist_state(&db, &controller) {
            error!("Failed to persist state: {}", e);
        }
    }

    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
