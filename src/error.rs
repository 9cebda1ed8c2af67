//! Error types for the credential stores and the auth service.

use std::fmt;

/// A legacy credential line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// 1-based line number in the source file.
    pub line: usize,
    pub reason: &'static str,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Failure reported by a credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with this username already exists.
    #[error("username already exists: {0}")]
    DuplicateUsername(String),

    /// A stored record has the wrong shape.
    #[error("malformed record at {0}")]
    Malformed(MalformedRecord),

    /// The record cannot be written in this store's format.
    #[error("record not representable: {0}")]
    Unrepresentable(String),

    /// The backing database or file cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    #[inline]
    pub fn unavailable<E: fmt::Display>(err: E) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::unavailable(err)
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::unavailable(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::unavailable(err)
    }
}

/// Outcome of a rejected register or login call.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username: {0}")]
    InvalidUsername(&'static str),

    #[error("invalid password: {0}")]
    InvalidPassword(&'static str),

    #[error("username already taken")]
    UsernameTaken,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    /// Retryable infrastructure failure.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Hasher or worker pool failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Message safe to show to an unauthenticated caller.
    ///
    /// Unknown users and wrong passwords read the same so the response does
    /// not reveal which usernames exist.
    pub fn public_message(&self) -> String {
        match self {
            Self::UserNotFound | Self::InvalidCredentials => "Invalid credentials".into(),
            Self::InvalidUsername(reason) | Self::InvalidPassword(reason) => (*reason).into(),
            Self::UsernameTaken => "Username already taken".into(),
            Self::StorageUnavailable(_) => "Storage unavailable, try again later".into(),
            Self::Internal(_) => "Internal error".into(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername(_) => Self::UsernameTaken,
            StoreError::Malformed(record) => Self::Internal(format!("malformed record at {record}")),
            StoreError::Unrepresentable(detail) => Self::Internal(detail),
            StoreError::Unavailable(detail) => Self::StorageUnavailable(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_and_wrong_password_read_the_same() {
        assert_eq!(
            AuthError::UserNotFound.public_message(),
            AuthError::InvalidCredentials.public_message()
        );
    }

    #[test]
    fn late_duplicate_becomes_username_taken() {
        let err: AuthError = StoreError::DuplicateUsername("alice".into()).into();
        assert!(matches!(err, AuthError::UsernameTaken));
    }

    #[test]
    fn io_failure_is_storage_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AuthError = StoreError::from(io).into();
        assert!(matches!(err, AuthError::StorageUnavailable(_)));
    }

    #[test]
    fn malformed_record_display_names_the_line() {
        let record = MalformedRecord { line: 3, reason: "missing comma" };
        assert_eq!(record.to_string(), "line 3: missing comma");
    }
}
