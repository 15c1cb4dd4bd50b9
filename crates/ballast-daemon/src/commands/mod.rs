//! JSON-RPC command handlers, one submodule per category.

pub mod diagnostics;
pub mod oracle;
pub mod stabilizer;

use serde_json::Value;

use crate::rpc::RpcError;

/// Handler result.
pub type Result = std::result::Result<Value, RpcError>;

/// The administrative identity making the call.
pub(crate) fn caller(params: &Value) -> std::result::Result<&str, RpcError> {
    str_param(params, "caller")
}

pub(crate) fn str_param<'a>(
    params: &'a Value,
    name: &str,
) -> std::result::Result<&'a str, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

pub(crate) fn u64_param(params: &Value, name: &str) -> std::result::Result<u64, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

pub(crate) fn opt_u64_param(params: &Value, name: &str) -> Option<u64> {
    params.get(name).and_then(|v| v.as_u64())
}

/// Wad values travel as decimal strings.
pub(crate) fn wad(value: u128) -> Value {
    Value::String(value.to_string())
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}
