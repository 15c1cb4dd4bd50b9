//! Event types emitted by the oracle and the stabilizer.
//!
//! Core components queue events internally; the host drains and forwards
//! them (the daemon broadcasts them to JSON-RPC subscribers).

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Envelope for all Ballast events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: Timestamp,
    pub payload: serde_json::Value,
}

impl Event {
    /// Build an event.
    pub fn new(event_type: EventType, timestamp: Timestamp, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            timestamp,
            payload,
        }
    }
}

/// All event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Oracle events
    SourceAdded,
    SourceRemoved,
    SourceReactivated,
    SourceUpdated,
    PriceUpdated,
    EmergencyModeChanged,
    OracleParametersUpdated,

    // Stabilizer events
    RebaseExecuted,
    CircuitBreakerActivated,
    CircuitBreakerRecovered,
    CircuitBreakerReset,
    Paused,
    Unpaused,
    StabilizerParametersUpdated,
}

impl EventType {
    /// Severity used by subscribers to filter events.
    pub fn severity(&self) -> Severity {
        match self {
            EventType::CircuitBreakerActivated | EventType::EmergencyModeChanged => {
                Severity::Critical
            }
            EventType::SourceRemoved | EventType::Paused | EventType::CircuitBreakerReset => {
                Severity::Warning
            }
            _ => Severity::Info,
        }
    }
}

/// Event severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_serializes_snake_case() {
        let json = serde_json::to_string(&EventType::CircuitBreakerActivated).expect("serialize");
        assert_eq!(json, "\"circuit_breaker_activated\"");
    }

    #[test]
    fn test_severity_ordering() {
        assert_eq!(EventType::PriceUpdated.severity(), Severity::Info);
        assert_eq!(EventType::Paused.severity(), Severity::Warning);
        assert_eq!(
            EventType::CircuitBreakerActivated.severity(),
            Severity::Critical
        );
        assert!(Severity::Critical > Severity::Warning);
    }
}
