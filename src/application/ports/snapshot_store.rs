use crate::domain::entities::{Guest, PendingChange};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything restored from local storage on startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    pub roster: Vec<Guest>,
    pub pending: Vec<PendingChange>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl LocalSnapshot {
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty() && self.pending.is_empty() && self.last_sync.is_none()
    }
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Writes roster and queue together.
    async fn save(&self, roster: &[Guest], pending: &[PendingChange]) -> Result<(), AppError>;

    async fn save_roster(&self, roster: &[Guest]) -> Result<(), AppError>;

    async fn save_pending(&self, pending: &[PendingChange]) -> Result<(), AppError>;

    async fn record_sync(&self, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Never fails: missing or unreadable keys load as empty.
    async fn load(&self) -> LocalSnapshot;
}
