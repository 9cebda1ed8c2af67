//! Credential and authentication core for the intelligence platform
//! dashboard: Argon2 password hashing, the `users` table, the legacy
//! `username, hash` file and the one-way migration between them.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod legacy;
pub mod source;
pub mod state;

pub use auth::password::CredentialHasher;
pub use auth::repo::{SqlUserStore, UserStore};
pub use auth::repo_types::{Credential, User, DEFAULT_ROLE};
pub use auth::services::{AuthService, AuthenticatedUser};
pub use error::{AuthError, MalformedRecord, StoreError};
pub use legacy::{migrate, LegacyFileStore, MigrationReport};
pub use source::{CredentialIter, CredentialSource};
