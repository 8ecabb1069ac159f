use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Online,
    Offline,
    Syncing,
}

impl ConnectivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityState::Online => "online",
            ConnectivityState::Offline => "offline",
            ConnectivityState::Syncing => "syncing",
        }
    }

    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "connectivity")]
pub enum EngineState {
    #[default]
    Uninitialized,
    Loading,
    Ready(ConnectivityState),
    Syncing,
    /// The initial load failed and no local fallback is configured.
    LoadFailed,
}

impl EngineState {
    pub fn connectivity(&self) -> Option<ConnectivityState> {
        match self {
            EngineState::Ready(state) => Some(*state),
            EngineState::Syncing => Some(ConnectivityState::Syncing),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready(_))
    }
}
