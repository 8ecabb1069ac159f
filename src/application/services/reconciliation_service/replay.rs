use super::ReconciliationEngine;
use crate::application::services::pending_queue::ChangeApplier;
use crate::domain::entities::{ChangeAction, PendingChange};
use crate::domain::value_objects::GuestId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Replays queued changes for one drain pass.
///
/// Writes always carry the guest as it currently stands in the roster. Once
/// a guest has been written in this pass, later queued updates for it are
/// dropped without another call. Entries reached after the network went away
/// fail without a remote call and stay queued.
pub(super) struct ReplayApplier<'a> {
    engine: &'a ReconciliationEngine,
    remapped: Mutex<HashMap<GuestId, GuestId>>,
    written: Mutex<HashSet<GuestId>>,
    superseded: AtomicUsize,
    roster_touched: AtomicBool,
}

impl<'a> ReplayApplier<'a> {
    pub(super) fn new(engine: &'a ReconciliationEngine) -> Self {
        Self {
            engine,
            remapped: Mutex::new(HashMap::new()),
            written: Mutex::new(HashSet::new()),
            superseded: AtomicUsize::new(0),
            roster_touched: AtomicBool::new(false),
        }
    }

    pub(super) fn superseded(&self) -> usize {
        self.superseded.load(Ordering::SeqCst)
    }

    pub(super) fn roster_touched(&self) -> bool {
        self.roster_touched.load(Ordering::SeqCst)
    }

    async fn resolve(&self, id: &GuestId) -> GuestId {
        self.remapped
            .lock()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.clone())
    }

    fn ensure_online(&self) -> Result<(), AppError> {
        if self.engine.is_online() {
            Ok(())
        } else {
            Err(AppError::Network("went offline during replay".into()))
        }
    }

    fn supersede(&self, change: &PendingChange, reason: &'static str) {
        self.superseded.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            target: "guestlist::engine",
            change_id = %change.change_id,
            guest_id = %change.guest.id,
            reason,
            "queued change superseded"
        );
    }

    async fn replay_create(&self, change: &PendingChange) -> Result<(), AppError> {
        let local_id = change.guest_id().clone();
        if self.remapped.lock().await.contains_key(&local_id) {
            self.supersede(change, "duplicate create");
            return Ok(());
        }

        let current = self
            .engine
            .guest(&local_id)
            .await
            .unwrap_or_else(|| change.guest.clone());

        let created = {
            let _write = self.engine.write_gate.lock().await;
            self.ensure_online()?;
            self.engine.gateway.create_guest(&current.to_draft()).await?
        };
        let remote_id = created.id.clone();

        {
            let mut roster = self.engine.roster.write().await;
            if !roster.remap_id(&local_id, remote_id.clone()) {
                roster.upsert(created);
            }
        }
        self.roster_touched.store(true, Ordering::SeqCst);
        self.engine.queue.retarget(&local_id, &remote_id).await;
        self.remapped
            .lock()
            .await
            .insert(local_id.clone(), remote_id.clone());
        self.written.lock().await.insert(remote_id.clone());

        tracing::info!(
            target: "guestlist::engine",
            local_id = %local_id,
            remote_id = %remote_id,
            "queued guest created remotely"
        );
        Ok(())
    }

    async fn replay_update(&self, change: &PendingChange) -> Result<(), AppError> {
        let id = self.resolve(change.guest_id()).await;
        if self.written.lock().await.contains(&id) {
            self.supersede(change, "already written in this pass");
            return Ok(());
        }

        if id.is_local() {
            if self.engine.queue.has_pending_create(&id).await {
                return Err(AppError::NotFound(format!(
                    "guest {id} has not been created remotely yet"
                )));
            }
            tracing::warn!(
                target: "guestlist::engine",
                guest_id = %id,
                "dropping update for a placeholder guest with no pending create"
            );
            self.supersede(change, "orphaned placeholder");
            return Ok(());
        }

        let current = match self.engine.guest(&id).await {
            Some(guest) => guest,
            None => {
                let mut guest = change.guest.clone();
                guest.id = id.clone();
                guest
            }
        };

        {
            let _write = self.engine.write_gate.lock().await;
            self.ensure_online()?;
            self.engine.gateway.update_guest(&current).await?;
        }
        self.written.lock().await.insert(id);
        Ok(())
    }
}

#[async_trait]
impl ChangeApplier for ReplayApplier<'_> {
    async fn apply(&self, change: &PendingChange) -> Result<(), AppError> {
        match change.action {
            ChangeAction::Create => self.replay_create(change).await,
            ChangeAction::Update => self.replay_update(change).await,
        }
    }
}
