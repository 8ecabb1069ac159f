mod outcome;
mod replay;

pub use outcome::{
    EngineEvent, MutationOutcome, Notification, NotificationCategory, RemoteFailure,
    StartupOutcome, SyncOutcome, SyncReport,
};

use self::replay::ReplayApplier;
use crate::application::ports::{RemoteGateway, SnapshotStore};
use crate::application::services::connectivity_monitor::ConnectivityListener;
use crate::application::services::pending_queue::{DrainReport, PendingChangeQueue};
use crate::domain::entities::{
    AttendanceStats, ChangeAction, Guest, GuestDraft, PendingChange, Roster, RosterFilter,
    TableGroup, TableStats,
};
use crate::domain::value_objects::{
    ConnectivityState, EngineState, GuestId, LoadFallback, RemoteFailurePolicy, SyncPolicy,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast};

const EVENT_CAPACITY: usize = 64;

/// Owns the roster and the pending queue and decides what is authoritative.
///
/// Local changes are applied optimistically and then pushed to the remote
/// store. When that is not possible the configured [`SyncPolicy`] decides
/// between rolling back and queueing for a later replay. The model is
/// eventually consistent: no locking against other writers of the remote
/// store is attempted.
pub struct ReconciliationEngine {
    gateway: Arc<dyn RemoteGateway>,
    store: Arc<dyn SnapshotStore>,
    queue: PendingChangeQueue,
    policy: SyncPolicy,
    refresh_on_reconnect: bool,
    roster: RwLock<Roster>,
    state: RwLock<EngineState>,
    network_online: AtomicBool,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    sync_gate: Mutex<()>,
    resync_requested: AtomicBool,
    resync_refresh: AtomicBool,
    write_gate: Mutex<()>,
    events: broadcast::Sender<EngineEvent>,
}

impl ReconciliationEngine {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        store: Arc<dyn SnapshotStore>,
        policy: SyncPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            queue: PendingChangeQueue::new(Arc::clone(&store)),
            store,
            policy,
            refresh_on_reconnect: true,
            roster: RwLock::new(Roster::default()),
            state: RwLock::new(EngineState::Uninitialized),
            network_online: AtomicBool::new(false),
            last_sync: RwLock::new(None),
            sync_gate: Mutex::new(()),
            resync_requested: AtomicBool::new(false),
            resync_refresh: AtomicBool::new(false),
            write_gate: Mutex::new(()),
            events,
        }
    }

    /// Whether a reconnect re-fetches the remote roster before replaying.
    pub fn with_refresh_on_reconnect(mut self, enabled: bool) -> Self {
        self.refresh_on_reconnect = enabled;
        self
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.network_online.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().await
    }

    pub async fn roster_snapshot(&self) -> Vec<Guest> {
        self.roster.read().await.guests().to_vec()
    }

    pub async fn guest(&self, id: &GuestId) -> Option<Guest> {
        self.roster.read().await.get(id).cloned()
    }

    pub async fn filtered(&self, filter: &RosterFilter) -> Vec<Guest> {
        self.roster.read().await.filtered(filter)
    }

    pub async fn grouped_by_table(&self, filter: &RosterFilter) -> Vec<TableGroup> {
        self.roster.read().await.grouped_by_table(filter)
    }

    pub async fn stats(&self) -> AttendanceStats {
        self.roster.read().await.stats()
    }

    pub async fn table_stats(&self) -> Vec<TableStats> {
        self.roster.read().await.table_stats()
    }

    pub async fn pending_changes(&self) -> Vec<PendingChange> {
        self.queue.snapshot().await
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.len().await
    }

    /// Restores the queue, loads the roster and replays anything left over
    /// from a previous session.
    pub async fn start(&self, online: bool) -> StartupOutcome {
        self.network_online.store(online, Ordering::SeqCst);
        self.set_state(EngineState::Loading).await;

        let snapshot = self.store.load().await;
        self.queue.restore(snapshot.pending).await;
        *self.last_sync.write().await = snapshot.last_sync;
        let pending = self.queue.len().await;

        tracing::info!(
            target: "guestlist::engine",
            online,
            snapshot_guests = snapshot.roster.len(),
            pending,
            "engine starting"
        );

        let cause = if online {
            match self.gateway.list_guests().await {
                Ok(guests) => {
                    let outcome = self.finish_remote_load(guests, pending).await;
                    self.notify(outcome.notification());
                    return outcome;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "guestlist::engine",
                        error = %err,
                        "initial roster load failed"
                    );
                    RemoteFailure::from_error(&err)
                }
            }
        } else {
            RemoteFailure::Network
        };

        let outcome = match self.policy.load_fallback {
            LoadFallback::LocalSnapshot => {
                let guests = snapshot.roster.len();
                *self.roster.write().await = Roster::new(snapshot.roster);
                self.emit_roster().await;
                self.set_state(EngineState::Ready(ConnectivityState::Offline))
                    .await;
                StartupOutcome::RestoredFromSnapshot {
                    guests,
                    pending,
                    cause,
                }
            }
            LoadFallback::Fail => {
                self.set_state(EngineState::LoadFailed).await;
                StartupOutcome::Unavailable { cause }
            }
        };

        self.emit_pending_count().await;
        self.notify(outcome.notification());
        outcome
    }

    async fn finish_remote_load(&self, guests: Vec<Guest>, pending: usize) -> StartupOutcome {
        let count = guests.len();
        self.replace_roster(guests).await;
        self.mark_synced().await;
        self.set_state(EngineState::Ready(ConnectivityState::Online))
            .await;
        self.emit_pending_count().await;

        let replay = if pending > 0 {
            match self.run_sync(false).await {
                SyncOutcome::Completed(report) => Some(report),
                other => {
                    tracing::debug!(
                        target: "guestlist::engine",
                        outcome = other.kind(),
                        "startup replay skipped"
                    );
                    None
                }
            }
        } else {
            None
        };

        StartupOutcome::Loaded {
            guests: count,
            replay,
        }
    }

    /// Flips presence according to the policy.
    pub async fn apply_toggle(&self, id: &GuestId) -> MutationOutcome {
        let outcome = self.change_presence(id, None).await;
        self.notify(outcome.notification());
        outcome
    }

    /// Sets presence to an explicit value.
    pub async fn set_presence(&self, id: &GuestId, present: bool) -> MutationOutcome {
        let outcome = self.change_presence(id, Some(present)).await;
        self.notify(outcome.notification());
        outcome
    }

    pub async fn add_guest(&self, draft: GuestDraft) -> MutationOutcome {
        let outcome = self.create_guest(draft).await;
        self.notify(outcome.notification());
        outcome
    }

    /// Feeds a platform connectivity transition into the engine.
    ///
    /// Returns the sync outcome when coming back online triggered a sync.
    pub async fn on_connectivity_changed(&self, online: bool) -> Option<SyncOutcome> {
        self.apply_connectivity(online).await;
        if !online {
            return None;
        }
        self.sync_after_reconnect().await
    }

    /// Records the network flag and the displayed state without touching
    /// the network.
    async fn apply_connectivity(&self, online: bool) {
        self.network_online.store(online, Ordering::SeqCst);
        tracing::info!(target: "guestlist::engine", online, "connectivity changed");

        match self.state().await {
            EngineState::Ready(_) => self.set_state(self.ready_state()).await,
            EngineState::Syncing if !online => {
                self.set_state(EngineState::Ready(ConnectivityState::Offline))
                    .await
            }
            _ => {}
        }
    }

    async fn sync_after_reconnect(&self) -> Option<SyncOutcome> {
        if !self.is_online() {
            return None;
        }
        if matches!(
            self.state().await,
            EngineState::Uninitialized | EngineState::Loading
        ) {
            return None;
        }

        let outcome = self.run_sync(self.refresh_on_reconnect).await;
        self.notify(outcome.notification());
        Some(outcome)
    }

    /// Refreshes the roster and replays the queue now.
    pub async fn force_sync(&self) -> SyncOutcome {
        let outcome = self.run_sync(true).await;
        self.notify(outcome.notification());
        outcome
    }

    async fn change_presence(&self, id: &GuestId, requested: Option<bool>) -> MutationOutcome {
        let (previous, guest) = {
            let mut roster = self.roster.write().await;
            let Some(mut guest) = roster.get(id).cloned() else {
                return MutationOutcome::NotFound(id.clone());
            };
            let previous = guest.present;
            let terminal = self.policy.presence_is_terminal();

            let target = match requested {
                None if previous && terminal => {
                    return MutationOutcome::AlreadyPresent(id.clone());
                }
                None => self.policy.toggled(previous),
                Some(value) if value == previous => {
                    return if value {
                        MutationOutcome::AlreadyPresent(id.clone())
                    } else {
                        MutationOutcome::AlreadyAbsent(id.clone())
                    };
                }
                Some(false) if terminal => return MutationOutcome::AlreadyPresent(id.clone()),
                Some(value) => value,
            };

            roster.set_presence(id, target);
            guest.present = target;
            (previous, guest)
        };

        self.persist_roster().await;
        self.emit_roster().await;
        tracing::debug!(
            target: "guestlist::engine",
            guest_id = %guest.id,
            present = guest.present,
            "presence applied locally"
        );

        // Placeholders cannot be written before their create is replayed.
        if !self.is_online() || guest.id.is_local() {
            self.queue
                .enqueue(ChangeAction::Update, guest.clone())
                .await;
            self.emit_pending_count().await;
            return MutationOutcome::QueuedOffline(guest);
        }

        self.push_update(guest, previous).await
    }

    async fn push_update(&self, guest: Guest, previous: bool) -> MutationOutcome {
        let result = {
            let _write = self.write_gate.lock().await;
            // Send whatever the roster holds now, not the value captured above.
            let id = guest.id.clone();
            let current = self.guest(&id).await.unwrap_or(guest);
            match self.gateway.update_guest(&current).await {
                Ok(()) => Ok(current),
                Err(err) => Err((err, current)),
            }
        };

        match result {
            Ok(current) => {
                if self.queue.discard_updates_for(&current.id).await > 0 {
                    self.emit_pending_count().await;
                }
                self.mark_synced().await;
                MutationOutcome::Synced(current)
            }
            Err((err, current)) => {
                let cause = RemoteFailure::from_error(&err);
                tracing::warn!(
                    target: "guestlist::engine",
                    guest_id = %current.id,
                    error = %err,
                    policy = ?self.policy.on_remote_failure,
                    "remote presence update failed"
                );

                match self.policy.on_remote_failure {
                    RemoteFailurePolicy::Rollback => {
                        self.roll_back_presence(&current, previous).await;
                        MutationOutcome::Failed {
                            guest_id: Some(current.id),
                            cause,
                        }
                    }
                    RemoteFailurePolicy::QueueForRetry => {
                        self.queue
                            .enqueue(ChangeAction::Update, current.clone())
                            .await;
                        self.emit_pending_count().await;
                        MutationOutcome::SavedLocallyPendingSync {
                            guest: current,
                            cause,
                        }
                    }
                }
            }
        }
    }

    async fn roll_back_presence(&self, attempted: &Guest, previous: bool) {
        {
            let mut roster = self.roster.write().await;
            // Leave it alone if a newer change has landed meanwhile.
            let unchanged = roster
                .get(&attempted.id)
                .is_some_and(|guest| guest.present == attempted.present);
            if unchanged {
                roster.set_presence(&attempted.id, previous);
            }
        }
        self.persist_roster().await;
        self.emit_roster().await;
    }

    async fn create_guest(&self, mut draft: GuestDraft) -> MutationOutcome {
        draft.name = draft.name.trim().to_string();
        if let Err(reason) = draft.validate() {
            return MutationOutcome::Rejected(reason);
        }

        if !self.is_online() {
            return self.insert_local(draft, None).await;
        }

        let created = {
            let _write = self.write_gate.lock().await;
            self.gateway.create_guest(&draft).await
        };

        match created {
            Ok(guest) => {
                self.roster.write().await.upsert(guest.clone());
                self.persist_roster().await;
                self.emit_roster().await;
                self.mark_synced().await;
                tracing::info!(
                    target: "guestlist::engine",
                    guest_id = %guest.id,
                    "guest created"
                );
                MutationOutcome::Synced(guest)
            }
            Err(err) => {
                let cause = RemoteFailure::from_error(&err);
                tracing::warn!(
                    target: "guestlist::engine",
                    error = %err,
                    "remote guest creation failed"
                );
                match self.policy.on_remote_failure {
                    RemoteFailurePolicy::Rollback => MutationOutcome::Failed {
                        guest_id: None,
                        cause,
                    },
                    RemoteFailurePolicy::QueueForRetry => {
                        self.insert_local(draft, Some(cause)).await
                    }
                }
            }
        }
    }

    async fn insert_local(
        &self,
        draft: GuestDraft,
        cause: Option<RemoteFailure>,
    ) -> MutationOutcome {
        let guest = Guest::from_draft(GuestId::local(), draft);
        self.roster.write().await.upsert(guest.clone());
        self.persist_roster().await;
        self.emit_roster().await;

        self.queue
            .enqueue(ChangeAction::Create, guest.clone())
            .await;
        self.emit_pending_count().await;

        match cause {
            None => MutationOutcome::QueuedOffline(guest),
            Some(cause) => MutationOutcome::SavedLocallyPendingSync { guest, cause },
        }
    }

    /// Single-flight sync.
    ///
    /// A request that finds a sync running returns `AlreadySyncing` and is
    /// recorded; the running caller performs one more pass for it once its
    /// own pass finishes.
    async fn run_sync(&self, refresh: bool) -> SyncOutcome {
        let mut refresh = refresh;
        let mut previous = None;
        loop {
            if !self.is_online() {
                return previous.unwrap_or(SyncOutcome::Offline);
            }
            let gate = match self.sync_gate.try_lock() {
                Ok(gate) => gate,
                Err(_) => {
                    self.resync_refresh.fetch_or(refresh, Ordering::SeqCst);
                    self.resync_requested.store(true, Ordering::SeqCst);
                    // The holder may have checked for deferred work just
                    // before the flag was set.
                    match self.sync_gate.try_lock() {
                        Ok(gate) => gate,
                        Err(_) => {
                            tracing::debug!(
                                target: "guestlist::engine",
                                "sync already running, request deferred"
                            );
                            return previous.unwrap_or(SyncOutcome::AlreadySyncing);
                        }
                    }
                }
            };
            // This pass serves any request deferred before it started.
            self.resync_requested.store(false, Ordering::SeqCst);
            refresh |= self.resync_refresh.swap(false, Ordering::SeqCst);

            let outcome = self.sync_once(refresh).await;
            drop(gate);

            if !self.resync_requested.load(Ordering::SeqCst) {
                return outcome;
            }
            tracing::debug!(target: "guestlist::engine", "running deferred sync");
            refresh = false;
            previous = Some(outcome);
        }
    }

    /// Optional roster refresh followed by a queue drain. Callers hold the
    /// sync gate.
    async fn sync_once(&self, refresh: bool) -> SyncOutcome {
        let load_failed = self.state().await == EngineState::LoadFailed;
        self.set_state(EngineState::Syncing).await;

        let mut refreshed = false;
        if refresh || load_failed {
            match self.gateway.list_guests().await {
                Ok(guests) => {
                    self.replace_roster(guests).await;
                    refreshed = true;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "guestlist::engine",
                        error = %err,
                        "roster refresh failed"
                    );
                    let state = if load_failed {
                        EngineState::LoadFailed
                    } else {
                        self.ready_state()
                    };
                    self.set_state(state).await;
                    return SyncOutcome::Failed {
                        cause: RemoteFailure::from_error(&err),
                    };
                }
            }
        }

        let (drain, superseded) = self.replay_pending().await;
        if refreshed || !drain.succeeded.is_empty() {
            self.mark_synced().await;
        }

        self.set_state(self.ready_state()).await;
        self.emit_pending_count().await;

        let report = SyncReport {
            refreshed,
            replayed: drain.succeeded.len().saturating_sub(superseded),
            superseded,
            remaining: drain.remaining.len(),
        };
        tracing::info!(
            target: "guestlist::engine",
            refreshed,
            replayed = report.replayed,
            superseded,
            remaining = report.remaining,
            "sync finished"
        );
        SyncOutcome::Completed(report)
    }

    async fn replay_pending(&self) -> (DrainReport, usize) {
        let applier = ReplayApplier::new(self);
        let report = self.queue.drain(&applier).await;
        if applier.roster_touched() {
            self.persist_roster().await;
            self.emit_roster().await;
        }
        (report, applier.superseded())
    }

    /// Installs a freshly fetched roster with still-pending changes re-applied.
    async fn replace_roster(&self, guests: Vec<Guest>) {
        let pending = self.queue.snapshot().await;
        let mut roster = Roster::new(guests);
        roster.overlay_pending(&pending);
        let guests = roster.guests().to_vec();
        *self.roster.write().await = roster;

        if let Err(err) = self.store.save(&guests, &pending).await {
            tracing::warn!(
                target: "guestlist::store",
                error = %err,
                "failed to persist refreshed roster"
            );
        }
        self.emit_roster().await;
    }

    fn ready_state(&self) -> EngineState {
        EngineState::Ready(ConnectivityState::from_online(self.is_online()))
    }

    async fn set_state(&self, next: EngineState) {
        let previous = {
            let mut state = self.state.write().await;
            if *state == next {
                return;
            }
            std::mem::replace(&mut *state, next)
        };
        tracing::info!(
            target: "guestlist::engine",
            from = ?previous,
            to = ?next,
            "engine state changed"
        );
        let _ = self.events.send(EngineEvent::StateChanged(next));
    }

    async fn mark_synced(&self) {
        let now = Utc::now();
        *self.last_sync.write().await = Some(now);
        if let Err(err) = self.store.record_sync(now).await {
            tracing::warn!(
                target: "guestlist::store",
                error = %err,
                "failed to persist last sync timestamp"
            );
        }
    }

    async fn persist_roster(&self) {
        let guests = self.roster_snapshot().await;
        if let Err(err) = self.store.save_roster(&guests).await {
            tracing::warn!(
                target: "guestlist::store",
                error = %err,
                "failed to persist roster"
            );
        }
    }

    async fn emit_roster(&self) {
        let guests = self.roster_snapshot().await;
        let _ = self.events.send(EngineEvent::RosterChanged(guests));
    }

    async fn emit_pending_count(&self) {
        let count = self.queue.len().await;
        let _ = self.events.send(EngineEvent::PendingCountChanged(count));
    }

    fn notify(&self, notification: Notification) {
        let _ = self.events.send(EngineEvent::Notification(notification));
    }
}

#[async_trait]
impl ConnectivityListener for ReconciliationEngine {
    async fn connectivity_changed(&self, online: bool) {
        self.apply_connectivity(online).await;
    }

    async fn reconnected(&self) {
        self.sync_after_reconnect().await;
    }
}
