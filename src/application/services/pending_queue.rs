use crate::application::ports::SnapshotStore;
use crate::domain::entities::{ChangeAction, Guest, PendingChange};
use crate::domain::value_objects::{ChangeId, GuestId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Replays one queued change against the remote store.
#[async_trait]
pub trait ChangeApplier: Send + Sync {
    async fn apply(&self, change: &PendingChange) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: Vec<PendingChange>,
    /// Queue content after the drain, in original relative order.
    pub remaining: Vec<PendingChange>,
}

impl DrainReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.remaining.len()
    }
}

/// FIFO queue of changes not yet acknowledged by the remote store.
///
/// Every mutation is written through to the snapshot store. Persistence is
/// best-effort: a failed write is logged and the in-memory queue stays
/// authoritative for the session.
pub struct PendingChangeQueue {
    store: Arc<dyn SnapshotStore>,
    entries: Mutex<Vec<PendingChange>>,
}

impl PendingChangeQueue {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self::with_entries(store, Vec::new())
    }

    pub fn with_entries(store: Arc<dyn SnapshotStore>, entries: Vec<PendingChange>) -> Self {
        Self {
            store,
            entries: Mutex::new(entries),
        }
    }

    /// Replaces the in-memory queue with entries restored from storage.
    pub async fn restore(&self, entries: Vec<PendingChange>) {
        let mut guard = self.entries.lock().await;
        *guard = dedup_by_change_id(entries);
    }

    pub async fn enqueue(&self, action: ChangeAction, guest: Guest) -> PendingChange {
        let change = PendingChange::new(action, guest);
        let mut entries = self.entries.lock().await;
        entries.push(change.clone());
        self.persist(&entries).await;

        tracing::debug!(
            target: "guestlist::queue",
            change_id = %change.change_id,
            action = %change.action,
            guest_id = %change.guest.id,
            queued = entries.len(),
            "pending change queued"
        );
        change
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<PendingChange> {
        self.entries.lock().await.clone()
    }

    pub async fn has_pending_create(&self, id: &GuestId) -> bool {
        self.entries
            .lock()
            .await
            .iter()
            .any(|change| change.action == ChangeAction::Create && change.targets(id))
    }

    /// Drops queued updates for a guest whose current state was just written remotely.
    pub async fn discard_updates_for(&self, id: &GuestId) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|change| !(change.action == ChangeAction::Update && change.targets(id)));
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&entries).await;
            tracing::debug!(
                target: "guestlist::queue",
                guest_id = %id,
                removed,
                "superseded pending updates discarded"
            );
        }
        removed
    }

    /// Points queued entries for a placeholder ID at the ID assigned remotely.
    pub async fn retarget(&self, from: &GuestId, to: &GuestId) -> usize {
        let mut entries = self.entries.lock().await;
        let mut retargeted = 0;
        for change in entries.iter_mut().filter(|change| change.targets(from)) {
            change.guest.id = to.clone();
            retargeted += 1;
        }
        if retargeted > 0 {
            self.persist(&entries).await;
        }
        retargeted
    }

    /// Replays every queued change in FIFO order.
    ///
    /// A failed entry does not stop the drain. Entries whose replay succeeded
    /// are removed; failed entries and entries queued while the drain was
    /// running stay in place.
    pub async fn drain(&self, applier: &dyn ChangeApplier) -> DrainReport {
        let batch = self.snapshot().await;
        if batch.is_empty() {
            return DrainReport::default();
        }

        let mut succeeded = Vec::new();
        for change in batch {
            match applier.apply(&change).await {
                Ok(()) => succeeded.push(change),
                Err(err) => {
                    tracing::warn!(
                        target: "guestlist::queue",
                        change_id = %change.change_id,
                        action = %change.action,
                        guest_id = %change.guest.id,
                        error = %err,
                        "pending change replay failed; keeping it queued"
                    );
                }
            }
        }

        let done: HashSet<&ChangeId> = succeeded.iter().map(|change| &change.change_id).collect();
        let mut entries = self.entries.lock().await;
        entries.retain(|change| !done.contains(&change.change_id));
        self.persist(&entries).await;

        tracing::info!(
            target: "guestlist::queue",
            succeeded = succeeded.len(),
            remaining = entries.len(),
            "pending queue drained"
        );

        DrainReport {
            remaining: entries.clone(),
            succeeded,
        }
    }

    async fn persist(&self, entries: &[PendingChange]) {
        if let Err(err) = self.store.save_pending(entries).await {
            tracing::warn!(
                target: "guestlist::queue",
                error = %err,
                "failed to persist pending queue"
            );
        }
    }
}

fn dedup_by_change_id(entries: Vec<PendingChange>) -> Vec<PendingChange> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|change| seen.insert(change.change_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::TableNumber;
    use crate::infrastructure::storage::SqliteSnapshotStore;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> Arc<SqliteSnapshotStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        Arc::new(SqliteSnapshotStore::new(pool))
    }

    fn guest(id: &str) -> Guest {
        Guest::new(
            GuestId::parse(id).unwrap(),
            format!("Guest {id}"),
            TableNumber::new(1).unwrap(),
        )
        .unwrap()
    }

    struct ScriptedApplier {
        fail_guests: HashSet<String>,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedApplier {
        fn failing_for(ids: &[&str]) -> Self {
            Self {
                fail_guests: ids.iter().map(|id| id.to_string()).collect(),
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChangeApplier for ScriptedApplier {
        async fn apply(&self, change: &PendingChange) -> Result<(), AppError> {
            let id = change.guest.id.to_string();
            self.calls.lock().unwrap().push(id.clone());
            if self.fail_guests.contains(&id) {
                return Err(AppError::Network("connection reset".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_enqueue_persists_immediately() {
        let store = setup_store().await;
        let queue = PendingChangeQueue::new(store.clone());

        queue.enqueue(ChangeAction::Update, guest("1")).await;
        queue.enqueue(ChangeAction::Create, guest("local-2")).await;

        let snapshot = store.load().await;
        assert_eq!(snapshot.pending.len(), 2);
        assert_eq!(snapshot.pending[0].guest.id.as_str(), "1");
        assert_eq!(snapshot.pending[1].action, ChangeAction::Create);
    }

    #[tokio::test]
    async fn test_drain_keeps_failed_entries_in_order() {
        let store = setup_store().await;
        let queue = PendingChangeQueue::new(store.clone());
        for id in ["1", "2", "3", "4", "5", "6"] {
            queue.enqueue(ChangeAction::Update, guest(id)).await;
        }

        let applier = ScriptedApplier::failing_for(&["2", "5"]);
        let report = queue.drain(&applier).await;

        assert_eq!(applier.calls(), vec!["1", "2", "3", "4", "5", "6"]);
        assert_eq!(report.succeeded.len(), 4);
        let remaining: Vec<&str> = report
            .remaining
            .iter()
            .map(|change| change.guest.id.as_str())
            .collect();
        assert_eq!(remaining, vec!["2", "5"]);
        assert_eq!(queue.len().await, 2);

        let persisted = store.load().await;
        assert_eq!(persisted.pending, report.remaining);
    }

    #[tokio::test]
    async fn test_drain_of_empty_queue_is_a_noop() {
        let store = setup_store().await;
        let queue = PendingChangeQueue::new(store);
        let applier = ScriptedApplier::failing_for(&[]);

        let report = queue.drain(&applier).await;
        assert_eq!(report.attempted(), 0);
        assert!(applier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_discard_updates_only_touches_matching_updates() {
        let store = setup_store().await;
        let queue = PendingChangeQueue::new(store.clone());
        queue.enqueue(ChangeAction::Update, guest("1")).await;
        queue.enqueue(ChangeAction::Update, guest("2")).await;
        queue.enqueue(ChangeAction::Update, guest("1")).await;

        let removed = queue.discard_updates_for(&GuestId::parse("1").unwrap()).await;

        assert_eq!(removed, 2);
        let left = queue.snapshot().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].guest.id.as_str(), "2");
        assert_eq!(store.load().await.pending.len(), 1);
    }

    #[tokio::test]
    async fn test_retarget_rewrites_placeholder_ids() {
        let store = setup_store().await;
        let queue = PendingChangeQueue::new(store.clone());
        queue.enqueue(ChangeAction::Create, guest("local-7")).await;
        queue.enqueue(ChangeAction::Update, guest("local-7")).await;
        queue.enqueue(ChangeAction::Update, guest("3")).await;

        let from = GuestId::parse("local-7").unwrap();
        let to = GuestId::parse("rec7").unwrap();
        assert_eq!(queue.retarget(&from, &to).await, 2);

        assert!(queue.has_pending_create(&to).await);
        assert!(!queue.has_pending_create(&from).await);
        let persisted: Vec<String> = store
            .load()
            .await
            .pending
            .iter()
            .map(|change| change.guest.id.to_string())
            .collect();
        assert_eq!(persisted, vec!["rec7", "rec7", "3"]);
    }

    #[tokio::test]
    async fn test_restore_drops_duplicate_entries() {
        let store = setup_store().await;
        let queue = PendingChangeQueue::new(store);
        let change = PendingChange::update(guest("1"));

        queue.restore(vec![change.clone(), change.clone()]).await;

        assert_eq!(queue.len().await, 1);
        assert!(!queue.has_pending_create(&GuestId::parse("1").unwrap()).await);
    }
}
