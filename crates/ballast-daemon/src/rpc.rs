//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC 2.0 calls to the command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use ballast_oracle::OracleError;
use ballast_stabilizer::StabilizerError;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, detail: Option<String>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: detail.map(|d| serde_json::json!({ "detail": d })),
        }
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::new(-32602, "INVALID_PARAMS", Some(detail.to_string()))
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::new(-32603, "INTERNAL_ERROR", Some(detail.to_string()))
    }

    // Ballast errors

    /// Caller not authorized (-32010).
    pub fn unauthorized(detail: String) -> Self {
        Self::new(-32010, "UNAUTHORIZED", Some(detail))
    }

    /// Dev commands disabled in config (-32011).
    pub fn dev_commands_disabled() -> Self {
        Self::new(-32011, "DEV_COMMANDS_DISABLED", None)
    }
}

impl From<OracleError> for RpcError {
    fn from(e: OracleError) -> Self {
        let detail = Some(e.to_string());
        match e {
            OracleError::Unauthorized { .. } => Self::unauthorized(e.to_string()),
            OracleError::InvalidParameter(_) => Self::new(-32602, "INVALID_PARAMS", detail),
            OracleError::NotFound(_) => Self::new(-32020, "SOURCE_NOT_FOUND", detail),
            OracleError::DuplicateKey(_)
            | OracleError::CapacityExceeded { .. }
            | OracleError::ProbeFailed { .. }
            | OracleError::SourceInactive(_)
            | OracleError::SourceAlreadyActive(_)
            | OracleError::BelowConsensusMinimum { .. }
            | OracleError::EmergencyMode => Self::new(-32021, "SOURCE_REJECTED", detail),
            OracleError::InsufficientOracles { .. }
            | OracleError::InsufficientOraclesAfterOutlierRemoval { .. }
            | OracleError::LowConfidence { .. }
            | OracleError::PriceOutOfBounds { .. } => {
                Self::new(-32022, "NO_AGGREGATE_PRICE", detail)
            }
            OracleError::InsufficientObservations { .. }
            | OracleError::NonMonotonicTimestamp { .. }
            | OracleError::EmptyWindow => Self::new(-32023, "INSUFFICIENT_HISTORY", detail),
            OracleError::ArithmeticOverflow(_) | OracleError::LockPoisoned => {
                Self::new(-32603, "INTERNAL_ERROR", detail)
            }
        }
    }
}

impl From<StabilizerError> for RpcError {
    fn from(e: StabilizerError) -> Self {
        let detail = Some(e.to_string());
        match e {
            StabilizerError::Unauthorized { .. } => Self::unauthorized(e.to_string()),
            StabilizerError::InvalidParameter(_) => Self::new(-32602, "INVALID_PARAMS", detail),
            StabilizerError::Paused => Self::new(-32030, "STABILIZER_PAUSED", detail),
            StabilizerError::CircuitBreakerNotActive
            | StabilizerError::ResetConditionsNotMet(_) => {
                Self::new(-32031, "CIRCUIT_BREAKER", detail)
            }
            StabilizerError::OracleUnhealthy | StabilizerError::OracleValidationFailed(_) => {
                Self::new(-32032, "ORACLE_UNAVAILABLE", detail)
            }
            StabilizerError::Token(_) => Self::new(-32033, "TOKEN_REJECTED", detail),
            StabilizerError::ArithmeticOverflow(_) | StabilizerError::Params(_) => {
                Self::new(-32603, "INTERNAL_ERROR", detail)
            }
        }
    }
}

impl From<ballast_db::DbError> for RpcError {
    fn from(e: ballast_db::DbError) -> Self {
        Self::internal_error(&format!("db error: {e}"))
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.jsonrpc != "2.0" => {
                RpcResponse::error(request.id, RpcError::invalid_request())
            }
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Oracle
        "get_aggregated_price" => commands::oracle::get_aggregated_price(&state).await,
        "get_oracle_health" => commands::oracle::get_oracle_health(&state).await,
        "get_sources" => commands::oracle::get_sources(&state).await,
        "get_price_history" => commands::oracle::get_price_history(&state, params).await,
        "get_twap" => commands::oracle::get_twap(&state, params).await,
        "add_source" => commands::oracle::add_source(&state, params).await,
        "remove_source" => commands::oracle::remove_source(&state, params).await,
        "reactivate_source" => commands::oracle::reactivate_source(&state, params).await,
        "update_source_weight" => commands::oracle::update_source_weight(&state, params).await,
        "set_emergency_mode" => commands::oracle::set_emergency_mode(&state, params).await,

        // Stabilizer
        "get_stabilizer_status" => commands::stabilizer::get_stabilizer_status(&state).await,
        "can_rebase" => commands::stabilizer::can_rebase(&state).await,
        "rebase_now" => commands::stabilizer::rebase_now(&state).await,
        "reset_circuit_breaker" => {
            commands::stabilizer::reset_circuit_breaker(&state, params).await
        }
        "pause" => commands::stabilizer::pause(&state, params).await,
        "unpause" => commands::stabilizer::unpause(&state, params).await,
        "get_rebase_history" => commands::stabilizer::get_rebase_history(&state, params).await,

        // Diagnostics
        "get_daemon_info" => commands::diagnostics::get_daemon_info(&state).await,

        // Dev-only commands
        "dev_set_feed_price" => commands::oracle::dev_set_feed_price(&state, params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
