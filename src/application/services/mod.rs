pub mod connectivity_monitor;
pub mod pending_queue;
pub mod reconciliation_service;

pub use connectivity_monitor::{ConnectivityListener, ConnectivityMonitor};
pub use pending_queue::{ChangeApplier, DrainReport, PendingChangeQueue};
pub use reconciliation_service::{
    EngineEvent, MutationOutcome, Notification, NotificationCategory, ReconciliationEngine,
    RemoteFailure, StartupOutcome, SyncOutcome, SyncReport,
};
