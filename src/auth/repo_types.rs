use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_ROLE: &str = "user";

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,                  // surrogate key, never reused
    pub username: String,         // natural key, unique
    #[serde(skip_serializing)]
    pub password_hash: String,    // Argon2 PHC string, not exposed in JSON
    pub role: String,
}

/// The `(username, hash)` pair every credential source can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password_hash: String,
}

impl From<User> for Credential {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            password_hash: user.password_hash,
        }
    }
}
