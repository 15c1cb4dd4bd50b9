//! Authorization capability for privileged operations.
//!
//! The core never decides who may administer the system. Hosts inject an
//! [`Authorizer`]; every privileged mutation asks it before touching state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Privileged operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    AddSource,
    RemoveSource,
    ReactivateSource,
    UpdateSource,
    UpdateOracleParameters,
    SetEmergencyMode,
    Pause,
    Unpause,
    ResetCircuitBreaker,
    UpdateStabilizerParameters,
}

/// Decides whether `caller` may perform `action`.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, caller: &str, action: AdminAction) -> bool;
}

/// Permits everything. Intended for tests and single-operator deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _caller: &str, _action: AdminAction) -> bool {
        true
    }
}

/// Permits a fixed set of callers for every action.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    callers: HashSet<String>,
}

impl AllowList {
    /// Build an allow-list from caller names.
    pub fn new<I, S>(callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            callers: callers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for AllowList {
    fn authorize(&self, caller: &str, _action: AdminAction) -> bool {
        self.callers.contains(caller)
    }
}
