use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::auth::repo_types::{Credential, User};
use crate::error::StoreError;
use crate::source::{CredentialIter, CredentialSource};

/// Record-store capability the auth service is written against.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact, case-sensitive lookup.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Create a user. Fails with [`StoreError::DuplicateUsername`] when the
    /// username is taken; the check and the write are one statement.
    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, StoreError>;

    /// Create a user unless the username is taken. Returns whether a row
    /// was written; duplicates are not an error.
    async fn insert_if_absent(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<bool, StoreError>;
}

/// `users` table behind a caller-owned pool.
#[derive(Debug, Clone)]
pub struct SqlUserStore {
    db: SqlitePool,
}

impl SqlUserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// All users in id order.
    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, StoreError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES (?, ?, ?)
            RETURNING id, username, password_hash, role
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(user) => {
                debug!(user_id = user.id, username = %user.username, "user row inserted");
                Ok(user)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_if_absent(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<bool, StoreError> {
        let done = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (username, password_hash, role)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .execute(&self.db)
        .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl CredentialSource for SqlUserStore {
    fn name(&self) -> &'static str {
        "users table"
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.find_by_username(username).await?.map(Credential::from))
    }

    async fn credentials(&self) -> Result<CredentialIter, StoreError> {
        let users = self.list().await?;
        Ok(Box::new(users.into_iter().map(|u| Ok(Credential::from(u)))))
    }

    async fn insert_credential_if_absent(
        &self,
        credential: &Credential,
        role: &str,
    ) -> Result<bool, StoreError> {
        self.insert_if_absent(&credential.username, &credential.password_hash, role)
            .await
    }
}
