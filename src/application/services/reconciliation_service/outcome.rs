use crate::domain::entities::Guest;
use crate::domain::value_objects::{EngineState, GuestId};
use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};

/// Why a remote call failed, as seen by callers of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFailure {
    Network,
    Protocol,
}

impl RemoteFailure {
    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::Network(_) => RemoteFailure::Network,
            _ => RemoteFailure::Protocol,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteFailure::Network => "network",
            RemoteFailure::Protocol => "protocol",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Success,
    Warning,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub category: NotificationCategory,
    pub kind: &'static str,
    pub message: String,
}

impl Notification {
    fn new(category: NotificationCategory, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            kind,
            message: message.into(),
        }
    }
}

/// Result of a single presence change or guest creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The remote store acknowledged the write.
    Synced(Guest),
    /// Applied locally and queued because the network is down.
    QueuedOffline(Guest),
    /// The remote write failed; the local change is kept and queued.
    SavedLocallyPendingSync { guest: Guest, cause: RemoteFailure },
    /// The remote write failed and the local change was rolled back.
    Failed {
        guest_id: Option<GuestId>,
        cause: RemoteFailure,
    },
    NotFound(GuestId),
    AlreadyPresent(GuestId),
    AlreadyAbsent(GuestId),
    /// The request was invalid and nothing was attempted.
    Rejected(String),
}

impl MutationOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationOutcome::Synced(_) => "synced",
            MutationOutcome::QueuedOffline(_) => "queued_offline",
            MutationOutcome::SavedLocallyPendingSync { .. } => "saved_locally_pending_sync",
            MutationOutcome::Failed { .. } => "failed",
            MutationOutcome::NotFound(_) => "not_found",
            MutationOutcome::AlreadyPresent(_) => "already_present",
            MutationOutcome::AlreadyAbsent(_) => "already_absent",
            MutationOutcome::Rejected(_) => "rejected",
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            MutationOutcome::Synced(_) => NotificationCategory::Success,
            MutationOutcome::QueuedOffline(_)
            | MutationOutcome::AlreadyPresent(_)
            | MutationOutcome::AlreadyAbsent(_) => NotificationCategory::Info,
            MutationOutcome::SavedLocallyPendingSync { .. } => NotificationCategory::Warning,
            MutationOutcome::Failed { .. }
            | MutationOutcome::NotFound(_)
            | MutationOutcome::Rejected(_) => NotificationCategory::Error,
        }
    }

    /// The guest as it stands after the call, when one was touched.
    pub fn guest(&self) -> Option<&Guest> {
        match self {
            MutationOutcome::Synced(guest)
            | MutationOutcome::QueuedOffline(guest)
            | MutationOutcome::SavedLocallyPendingSync { guest, .. } => Some(guest),
            _ => None,
        }
    }

    pub fn notification(&self) -> Notification {
        let message = match self {
            MutationOutcome::Synced(guest) => format!("{} saved", guest.name),
            MutationOutcome::QueuedOffline(guest) => {
                format!("{} saved offline, will sync when back online", guest.name)
            }
            MutationOutcome::SavedLocallyPendingSync { guest, cause } => format!(
                "{} saved locally, sync pending after {} error",
                guest.name,
                cause.as_str()
            ),
            MutationOutcome::Failed { cause, .. } => {
                format!("Update failed ({} error), change reverted", cause.as_str())
            }
            MutationOutcome::NotFound(id) => format!("Guest {id} not found"),
            MutationOutcome::AlreadyPresent(_) => "Guest is already checked in".to_string(),
            MutationOutcome::AlreadyAbsent(_) => "Guest is already marked absent".to_string(),
            MutationOutcome::Rejected(reason) => reason.clone(),
        };
        Notification::new(self.category(), self.kind(), message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// The remote roster was fetched and replaced the local one.
    pub refreshed: bool,
    /// Queued changes written to the remote store.
    pub replayed: usize,
    /// Queued changes dropped because a newer write already covered them.
    pub superseded: usize,
    /// Changes still queued after the pass.
    pub remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Refused because the network is down.
    Offline,
    /// Refused because another sync is running.
    AlreadySyncing,
    /// The roster refresh failed; nothing was replayed.
    Failed { cause: RemoteFailure },
}

impl SyncOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncOutcome::Completed(_) => "sync_completed",
            SyncOutcome::Offline => "sync_offline",
            SyncOutcome::AlreadySyncing => "already_syncing",
            SyncOutcome::Failed { .. } => "sync_failed",
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            SyncOutcome::Completed(report) if report.remaining > 0 => NotificationCategory::Warning,
            SyncOutcome::Completed(_) => NotificationCategory::Success,
            SyncOutcome::AlreadySyncing => NotificationCategory::Info,
            SyncOutcome::Offline | SyncOutcome::Failed { .. } => NotificationCategory::Error,
        }
    }

    pub fn notification(&self) -> Notification {
        let message = match self {
            SyncOutcome::Completed(report) if report.remaining > 0 => format!(
                "Sync finished, {} change(s) still pending",
                report.remaining
            ),
            SyncOutcome::Completed(report) => {
                format!("Sync finished, {} change(s) sent", report.replayed)
            }
            SyncOutcome::Offline => "Cannot sync while offline".to_string(),
            SyncOutcome::AlreadySyncing => "A sync is already running".to_string(),
            SyncOutcome::Failed { cause } => format!("Sync failed ({} error)", cause.as_str()),
        };
        Notification::new(self.category(), self.kind(), message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The remote roster was loaded; `replay` is set when restored changes were replayed.
    Loaded {
        guests: usize,
        replay: Option<SyncReport>,
    },
    /// The remote roster was unavailable and the local snapshot was used.
    RestoredFromSnapshot {
        guests: usize,
        pending: usize,
        cause: RemoteFailure,
    },
    /// The remote roster was unavailable and no fallback is allowed.
    Unavailable { cause: RemoteFailure },
}

impl StartupOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            StartupOutcome::Loaded { .. } => "loaded",
            StartupOutcome::RestoredFromSnapshot { .. } => "restored_from_snapshot",
            StartupOutcome::Unavailable { .. } => "unavailable",
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            StartupOutcome::Loaded { .. } => NotificationCategory::Success,
            StartupOutcome::RestoredFromSnapshot { .. } => NotificationCategory::Warning,
            StartupOutcome::Unavailable { .. } => NotificationCategory::Error,
        }
    }

    pub fn notification(&self) -> Notification {
        let message = match self {
            StartupOutcome::Loaded { guests, .. } => format!("{guests} guests loaded"),
            StartupOutcome::RestoredFromSnapshot { guests, pending, .. } => format!(
                "Offline mode: {guests} guests restored, {pending} change(s) pending"
            ),
            StartupOutcome::Unavailable { cause } => {
                format!("Unable to load the guest list ({} error)", cause.as_str())
            }
        };
        Notification::new(self.category(), self.kind(), message)
    }
}

/// Everything a rendering layer needs to follow the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    StateChanged(EngineState),
    RosterChanged(Vec<Guest>),
    PendingCountChanged(usize),
    Notification(Notification),
}
