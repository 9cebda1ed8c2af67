use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::auth::password::CredentialHasher;
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{User, DEFAULT_ROLE};
use crate::error::{AuthError, StoreError};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 50;

pub(crate) fn validate_username(username: &str) -> Result<(), AuthError> {
    lazy_static! {
        static ref FORBIDDEN_RE: Regex = Regex::new(r#"[\\/:*?"<>|]"#).unwrap();
    }
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AuthError::InvalidUsername(
            "Username must be between 3 and 20 characters.",
        ));
    }
    if FORBIDDEN_RE.is_match(username) {
        return Err(AuthError::InvalidUsername(
            "Username cannot contain the following symbols: \\/:*?\"<>|",
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(AuthError::InvalidPassword(
            "Password must be between 6 and 50 characters long.",
        ));
    }
    Ok(())
}

/// Proof of a successful login. Callers keep this for the rest of their
/// session and pass it along explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

/// Registration and login on top of a [`UserStore`].
#[derive(Debug, Clone)]
pub struct AuthService<S> {
    store: S,
    hasher: CredentialHasher,
}

impl<S: UserStore> AuthService<S> {
    pub fn new(store: S, hasher: CredentialHasher) -> Self {
        Self { store, hasher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an account. `role` defaults to `"user"`.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<User, AuthError> {
        if let Err(e) = validate_username(username) {
            warn!(error = %e, "register rejected");
            return Err(e);
        }
        if let Err(e) = validate_password(password) {
            warn!(error = %e, "register rejected");
            return Err(e);
        }

        if self.store.find_by_username(username).await?.is_some() {
            warn!("username already registered");
            return Err(AuthError::UsernameTaken);
        }

        let hash = self.hash_blocking(password).await?;
        let role = role.unwrap_or(DEFAULT_ROLE);

        let user = match self.store.insert(username, &hash, role).await {
            Ok(u) => u,
            Err(StoreError::DuplicateUsername(_)) => {
                warn!("username taken by a concurrent registration");
                return Err(AuthError::UsernameTaken);
            }
            Err(e) => {
                error!(error = %e, "create user failed");
                return Err(e.into());
            }
        };

        info!(user_id = user.id, role = %user.role, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthenticatedUser, AuthError> {
        let user = match self.store.find_by_username(username).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                self.verify_dummy_blocking(password).await?;
                warn!("login unknown username");
                return Err(AuthError::UserNotFound);
            }
            Err(e) => {
                error!(error = %e, "find_by_username failed");
                return Err(e.into());
            }
        };

        if !self.verify_blocking(password, &user.password_hash).await? {
            warn!(user_id = user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, "user logged in");
        Ok(user.into())
    }

    async fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn verify_dummy_blocking(&self, password: &str) -> Result<(), AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify_dummy(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}
