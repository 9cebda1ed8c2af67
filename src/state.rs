use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::password::CredentialHasher;
use crate::auth::repo::SqlUserStore;
use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::db;

/// Shared handles. The pool is created here and lent to the stores; nothing
/// else opens connections of its own.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService<SqlUserStore>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let hasher = CredentialHasher::new(&config.hash)?;
        let db = db::connect(&config.database_url, config.max_connections).await?;
        Ok(Self::from_parts(db, Arc::new(config), hasher))
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>, hasher: CredentialHasher) -> Self {
        let auth = Arc::new(AuthService::new(SqlUserStore::new(db.clone()), hasher));
        Self { db, config, auth }
    }

    pub fn users(&self) -> &SqlUserStore {
        self.auth.store()
    }

    #[cfg(test)]
    pub(crate) async fn fake() -> Self {
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".into()),
            _ => None,
        })
        .expect("test config is valid");
        let db = db::memory_pool().await;
        Self::from_parts(db, Arc::new(config), CredentialHasher::fast())
    }
}
