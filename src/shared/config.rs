use crate::domain::value_objects::{LoadFallback, PresencePolicy, RemoteFailurePolicy, SyncPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_API_ROOT: &str = "https://api.airtable.com/v0";
pub const DEFAULT_TABLE_NAME: &str = "Invites";

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    TableApi,
    ScriptApi,
}

impl BackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "table_api" | "table" | "airtable" => Some(BackendKind::TableApi),
            "script_api" | "script" => Some(BackendKind::ScriptApi),
            _ => None,
        }
    }

    /// Policy matching how this backend integration behaves out of the box.
    pub fn default_policy(&self) -> SyncPolicy {
        match self {
            BackendKind::TableApi => SyncPolicy::table_api(),
            BackendKind::ScriptApi => SyncPolicy::script_api(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub api_root: String,
    pub base_id: String,
    pub table_name: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub script_url: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub policy: SyncPolicy,
    /// Re-fetch the remote roster before replaying the queue on reconnect.
    pub refresh_on_reconnect: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::TableApi,
            api_root: DEFAULT_API_ROOT.to_string(),
            base_id: String::new(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            api_token: None,
            script_url: None,
            request_timeout_secs: 15,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: 5,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            policy: SyncPolicy::default(),
            refresh_on_reconnect: true,
        }
    }
}

fn default_database_url() -> String {
    let dir = dirs::data_local_dir()
        .map(|dir| dir.join("guestlist-sync"))
        .unwrap_or_else(|| PathBuf::from("./data"));
    format!("sqlite:{}", dir.join("guestlist.db").display())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Values that fail to parse keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(kind) = lookup("GUESTLIST_BACKEND").and_then(|v| BackendKind::parse(&v)) {
            cfg.backend.kind = kind;
            cfg.sync.policy = kind.default_policy();
        }
        if let Some(root) = non_empty(lookup("GUESTLIST_API_ROOT")) {
            cfg.backend.api_root = root;
        }
        if let Some(v) = lookup("GUESTLIST_BASE_ID") {
            cfg.backend.base_id = v.trim().to_string();
        }
        if let Some(table) = non_empty(lookup("GUESTLIST_TABLE_NAME")) {
            cfg.backend.table_name = table;
        }
        cfg.backend.api_token = non_empty(lookup("GUESTLIST_API_TOKEN"));
        cfg.backend.script_url = non_empty(lookup("GUESTLIST_SCRIPT_URL"));
        if let Some(value) = lookup("GUESTLIST_REQUEST_TIMEOUT_SECS").and_then(|v| parse_u64(&v)) {
            cfg.backend.request_timeout_secs = value.max(1);
        }

        if let Some(url) = non_empty(lookup("GUESTLIST_DATABASE_URL")) {
            cfg.storage.database_url = url;
        }
        if let Some(value) = lookup("GUESTLIST_DB_MAX_CONNECTIONS").and_then(|v| parse_u32(&v)) {
            cfg.storage.max_connections = value;
        }

        if let Some(presence) = lookup("GUESTLIST_PRESENCE_POLICY").and_then(|v| parse_presence(&v)) {
            cfg.sync.policy.presence = presence;
        }
        if let Some(policy) =
            lookup("GUESTLIST_ON_REMOTE_FAILURE").and_then(|v| parse_failure_policy(&v))
        {
            cfg.sync.policy.on_remote_failure = policy;
        }
        if let Some(fallback) =
            lookup("GUESTLIST_LOAD_FALLBACK").and_then(|v| parse_load_fallback(&v))
        {
            cfg.sync.policy.load_fallback = fallback;
        }
        if let Some(v) = lookup("GUESTLIST_REFRESH_ON_RECONNECT") {
            cfg.sync.refresh_on_reconnect = parse_bool(&v, cfg.sync.refresh_on_reconnect);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.storage.max_connections == 0 {
            return Err("Storage max_connections must be greater than 0".to_string());
        }
        if self.backend.request_timeout_secs == 0 {
            return Err("Backend request_timeout_secs must be greater than 0".to_string());
        }
        match self.backend.kind {
            BackendKind::TableApi => {
                if self.backend.base_id.is_empty() {
                    return Err("Table API base_id must be set".to_string());
                }
                if self.backend.table_name.is_empty() {
                    return Err("Table API table_name must be set".to_string());
                }
                if self.backend.api_token.is_none() {
                    return Err("Table API api_token must be set".to_string());
                }
            }
            BackendKind::ScriptApi => {
                if self.backend.script_url.is_none() {
                    return Err("Script API script_url must be set".to_string());
                }
            }
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_presence(value: &str) -> Option<PresencePolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "terminal" => Some(PresencePolicy::Terminal),
        "toggle" => Some(PresencePolicy::Toggle),
        _ => None,
    }
}

fn parse_failure_policy(value: &str) -> Option<RemoteFailurePolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "rollback" => Some(RemoteFailurePolicy::Rollback),
        "queue" | "queue_for_retry" => Some(RemoteFailurePolicy::QueueForRetry),
        _ => None,
    }
}

fn parse_load_fallback(value: &str) -> Option<LoadFallback> {
    match value.trim().to_ascii_lowercase().as_str() {
        "local_snapshot" | "snapshot" => Some(LoadFallback::LocalSnapshot),
        "fail" => Some(LoadFallback::Fail),
        _ => None,
    }
}
