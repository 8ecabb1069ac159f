use serde::{Deserialize, Serialize};

/// How the `present` flag may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresencePolicy {
    /// Presence can only move from absent to present.
    #[default]
    Terminal,
    /// Presence flips on every toggle.
    Toggle,
}

/// What happens to an optimistic change when the remote write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFailurePolicy {
    Rollback,
    #[default]
    QueueForRetry,
}

/// What startup does when the remote roster cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFallback {
    #[default]
    LocalSnapshot,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncPolicy {
    #[serde(default)]
    pub presence: PresencePolicy,
    #[serde(default)]
    pub on_remote_failure: RemoteFailurePolicy,
    #[serde(default)]
    pub load_fallback: LoadFallback,
}

impl SyncPolicy {
    pub fn new(
        presence: PresencePolicy,
        on_remote_failure: RemoteFailurePolicy,
        load_fallback: LoadFallback,
    ) -> Self {
        Self {
            presence,
            on_remote_failure,
            load_fallback,
        }
    }

    /// Behaviour of the direct table API integration.
    pub fn table_api() -> Self {
        Self::new(
            PresencePolicy::Terminal,
            RemoteFailurePolicy::Rollback,
            LoadFallback::Fail,
        )
    }

    /// Behaviour of the script endpoint integration.
    pub fn script_api() -> Self {
        Self::new(
            PresencePolicy::Toggle,
            RemoteFailurePolicy::QueueForRetry,
            LoadFallback::LocalSnapshot,
        )
    }

    pub fn presence_is_terminal(&self) -> bool {
        self.presence == PresencePolicy::Terminal
    }

    /// Presence value produced by a toggle from `current`.
    pub fn toggled(&self, current: bool) -> bool {
        match self.presence {
            PresencePolicy::Terminal => true,
            PresencePolicy::Toggle => !current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_toggle_is_monotonic() {
        let policy = SyncPolicy::table_api();
        assert!(policy.toggled(false));
        assert!(policy.toggled(true));
    }

    #[test]
    fn toggle_policy_flips() {
        let policy = SyncPolicy::script_api();
        assert!(policy.toggled(false));
        assert!(!policy.toggled(true));
    }

    #[test]
    fn default_keeps_optimistic_changes() {
        let policy = SyncPolicy::default();
        assert!(policy.presence_is_terminal());
        assert_eq!(policy.on_remote_failure, RemoteFailurePolicy::QueueForRetry);
        assert_eq!(policy.load_fallback, LoadFallback::LocalSnapshot);
    }

    #[test]
    fn deserializes_partial_policy() {
        let policy: SyncPolicy = serde_json::from_str(r#"{"presence":"toggle"}"#).unwrap();
        assert_eq!(policy.presence, PresencePolicy::Toggle);
        assert_eq!(policy.on_remote_failure, RemoteFailurePolicy::QueueForRetry);
    }
}
