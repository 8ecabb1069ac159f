use crate::application::ports::{RemoteGateway, SnapshotStore};
use crate::application::services::{ConnectivityMonitor, ReconciliationEngine, StartupOutcome};
use crate::infrastructure::database::{Database, DbPool};
use crate::infrastructure::remote::build_gateway;
use crate::infrastructure::storage::SqliteSnapshotStore;
use crate::shared::config::AppConfig;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything the application needs, wired together.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Arc<DbPool>,
    pub engine: Arc<ReconciliationEngine>,
    pub connectivity: Arc<ConnectivityMonitor>,
}

impl AppState {
    pub async fn initialize(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;

        let db_pool = Database::initialize(
            &config.storage.database_url,
            config.storage.max_connections,
        )
        .await?;
        let gateway = build_gateway(&config.backend)?;

        info!(
            backend = ?config.backend.kind,
            policy = ?config.sync.policy,
            "guest list state initialized"
        );
        Ok(Self::with_gateway(config, db_pool, gateway))
    }

    /// Wires the state around an already constructed gateway.
    pub fn with_gateway(
        config: AppConfig,
        db_pool: DbPool,
        gateway: Arc<dyn RemoteGateway>,
    ) -> Self {
        let store: Arc<dyn SnapshotStore> = Arc::new(SqliteSnapshotStore::new(db_pool.clone()));
        let engine = Arc::new(
            ReconciliationEngine::new(gateway, store, config.sync.policy)
                .with_refresh_on_reconnect(config.sync.refresh_on_reconnect),
        );
        let connectivity = Arc::new(ConnectivityMonitor::new(engine.clone()));

        Self {
            config: Arc::new(config),
            db_pool: Arc::new(db_pool),
            engine,
            connectivity,
        }
    }

    /// Runs the engine startup sequence with the current platform connectivity.
    pub async fn start(&self, initial_online: bool) -> StartupOutcome {
        self.connectivity.prime(initial_online).await;
        self.engine.start(initial_online).await
    }

    /// Binds the connectivity monitor to a platform signal.
    pub fn attach_connectivity(&self, signal: watch::Receiver<bool>) -> JoinHandle<()> {
        Arc::clone(&self.connectivity).watch(signal)
    }
}
