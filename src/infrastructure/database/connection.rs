use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub type DbPool = Pool<Sqlite>;

pub struct Database;

impl Database {
    pub async fn initialize(database_url: &str, max_connections: u32) -> Result<DbPool> {
        if let Some(parent) = database_file(database_url).and_then(|path| path.parent()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Database connected: {}", database_url);

        Self::run_migrations(&pool).await?;

        Ok(pool)
    }

    async fn run_migrations(pool: &DbPool) -> Result<()> {
        info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(pool).await?;

        info!("Database migrations completed");
        Ok(())
    }
}

/// Filesystem path of a `sqlite:` URL, if it points at a file.
fn database_file(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    Some(Path::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_database_file_from_url() {
        assert_eq!(
            database_file("sqlite://./data/guests.db?mode=rwc"),
            Some(Path::new("./data/guests.db"))
        );
        assert_eq!(database_file("sqlite:guests.db"), Some(Path::new("guests.db")));
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn test_database_initialize_creates_file_and_schema() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("guests.db");
        let db_url = format!("sqlite://{}", db_path.display());

        let pool = Database::initialize(&db_url, 2).await.unwrap();

        assert!(db_path.exists());
        let table_check = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='local_snapshot'",
        )
        .fetch_optional(&pool)
        .await
        .unwrap();
        assert!(table_check.is_some());

        pool.close().await;
    }
}
