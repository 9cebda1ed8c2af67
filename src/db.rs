use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::debug;

use crate::error::StoreError;

/// Open a pool on `database_url`, creating the database file (and its
/// directory) when it does not exist yet.
pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parse database url {database_url}"))?
        .create_if_missing(true);

    if let Some(dir) = database_file(database_url).and_then(Path::parent) {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create database directory {}", dir.display()))?;
        }
    }

    let db = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("connect to database")?;
    debug!(max_connections, "database pool ready");
    Ok(db)
}

/// File path named by a `sqlite:` url, or `None` for in-memory databases.
fn database_file(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split_once('?').map_or(rest, |(path, _)| path);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

/// Apply the schema in `migrations/`.
pub async fn run_migrations(db: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(db).await?;
    Ok(())
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let db = connect("sqlite::memory:", 1)
        .await
        .expect("in-memory pool should open");
    run_migrations(&db).await.expect("schema should apply");
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_file_from_url() {
        assert_eq!(
            database_file("sqlite://DATA/intelligence_platform.db"),
            Some(Path::new("DATA/intelligence_platform.db"))
        );
        assert_eq!(database_file("sqlite:users.db?mode=rwc"), Some(Path::new("users.db")));
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn migrations_are_repeatable() {
        let db = memory_pool().await;
        run_migrations(&db).await.expect("second run is a no-op");

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn creates_missing_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DATA").join("platform.db");
        let url = format!("sqlite://{}", path.display());

        let db = connect(&url, 1).await.expect("file database should open");
        run_migrations(&db).await.unwrap();
        assert!(path.exists());
    }
}
