//! Diagnostics command handlers.

use std::sync::Arc;

use serde_json::json;

use super::Result;
use crate::scheduler::unix_now;
use crate::DaemonState;

/// Version, uptime and runtime settings.
pub async fn get_daemon_info(state: &Arc<DaemonState>) -> Result {
    let now = unix_now();
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at,
        "uptime_secs": now.saturating_sub(state.started_at),
        "data_dir": state.config.data_dir().display().to_string(),
        "tick_interval_secs": state.config.advanced.tick_interval_secs,
        "dynamic_cooldown": state.config.params.enabled,
        "dev_commands": state.config.advanced.dev_commands,
        "events_emitted": state.event_bus.sequence(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;

    #[tokio::test]
    async fn test_daemon_info() {
        let state = state();
        let info = get_daemon_info(&state).await.expect("info");
        assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(info["tick_interval_secs"], 60);
        assert_eq!(info["dev_commands"], false);
    }
}
