use crate::application::ports::snapshot_store::{LocalSnapshot, SnapshotStore};
use crate::domain::entities::{Guest, PendingChange};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{Executor, Pool, Sqlite};

pub const ROSTER_KEY: &str = "guest_roster";
pub const PENDING_KEY: &str = "pending_changes";
pub const LAST_SYNC_KEY: &str = "last_sync";

/// Key-value snapshot storage backed by the `local_snapshot` table.
pub struct SqliteSnapshotStore {
    pool: Pool<Sqlite>,
}

impl SqliteSnapshotStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn put<'e, E>(executor: E, key: &str, value: String) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO local_snapshot (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn read_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM local_snapshot WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Reads and decodes one key; failures are logged and read as absent.
    async fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let raw = match self.read_raw(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(err) => {
                tracing::warn!(
                    target: "guestlist::store",
                    key,
                    error = %err,
                    "failed to read local snapshot key"
                );
                return T::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    target: "guestlist::store",
                    key,
                    error = %err,
                    "discarding unreadable local snapshot value"
                );
                T::default()
            }
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(AppError::from)
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn save(&self, roster: &[Guest], pending: &[PendingChange]) -> Result<(), AppError> {
        let roster_json = encode(roster)?;
        let pending_json = encode(pending)?;

        let mut tx = self.pool.begin().await?;
        Self::put(&mut *tx, ROSTER_KEY, roster_json).await?;
        Self::put(&mut *tx, PENDING_KEY, pending_json).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_roster(&self, roster: &[Guest]) -> Result<(), AppError> {
        Self::put(&self.pool, ROSTER_KEY, encode(roster)?).await
    }

    async fn save_pending(&self, pending: &[PendingChange]) -> Result<(), AppError> {
        Self::put(&self.pool, PENDING_KEY, encode(pending)?).await
    }

    async fn record_sync(&self, at: DateTime<Utc>) -> Result<(), AppError> {
        Self::put(&self.pool, LAST_SYNC_KEY, at.to_rfc3339()).await
    }

    async fn load(&self) -> LocalSnapshot {
        let roster: Vec<Guest> = self.read_or_default(ROSTER_KEY).await;
        let pending: Vec<PendingChange> = self.read_or_default(PENDING_KEY).await;

        let last_sync = match self.read_raw(LAST_SYNC_KEY).await {
            Ok(Some(raw)) => DateTime::parse_from_rfc3339(&raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|err| {
                    tracing::warn!(
                        target: "guestlist::store",
                        error = %err,
                        "discarding unreadable last sync timestamp"
                    );
                })
                .ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(
                    target: "guestlist::store",
                    error = %err,
                    "failed to read last sync timestamp"
                );
                None
            }
        };

        LocalSnapshot {
            roster,
            pending,
            last_sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{GuestId, TableNumber};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> (SqliteSnapshotStore, Pool<Sqlite>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        (SqliteSnapshotStore::new(pool.clone()), pool)
    }

    fn guest(id: &str, present: bool) -> Guest {
        Guest::new(
            GuestId::parse(id).unwrap(),
            format!("Guest {id}"),
            TableNumber::new(2).unwrap(),
        )
        .unwrap()
        .with_present(present)
    }

    #[tokio::test]
    async fn test_load_from_empty_storage() {
        let (store, _pool) = setup_store().await;
        let snapshot = store.load().await;
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (store, _pool) = setup_store().await;
        let roster = vec![guest("a", false), guest("b", true)];
        let pending = vec![PendingChange::update(guest("b", true))];
        let synced_at = Utc::now();

        store.save(&roster, &pending).await.unwrap();
        store.record_sync(synced_at).await.unwrap();

        let snapshot = store.load().await;
        assert_eq!(snapshot.roster, roster);
        assert_eq!(snapshot.pending, pending);
        assert_eq!(
            snapshot.last_sync.map(|at| at.timestamp_millis()),
            Some(synced_at.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (store, pool) = setup_store().await;
        store.save_roster(&[guest("a", false)]).await.unwrap();
        store.save_pending(&[]).await.unwrap();
        store.save_roster(&[guest("a", true)]).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM local_snapshot")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let snapshot = store.load().await;
        assert!(snapshot.roster[0].present);
        assert!(snapshot.pending.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_values_load_as_empty() {
        let (store, pool) = setup_store().await;
        store.save_pending(&[PendingChange::update(guest("a", true))]).await.unwrap();
        sqlx::query("INSERT INTO local_snapshot (key, value, updated_at) VALUES (?1, ?2, 0)")
            .bind(ROSTER_KEY)
            .bind("{not json")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO local_snapshot (key, value, updated_at) VALUES (?1, ?2, 0)")
            .bind(LAST_SYNC_KEY)
            .bind("yesterday")
            .execute(&pool)
            .await
            .unwrap();

        let snapshot = store.load().await;
        assert!(snapshot.roster.is_empty());
        assert_eq!(snapshot.pending.len(), 1);
        assert!(snapshot.last_sync.is_none());
    }
}
