//! Storage-agnostic view over places that hold credentials.

use async_trait::async_trait;

use crate::auth::repo_types::Credential;
use crate::error::StoreError;

/// Lazy scan over a source. Unparseable records come back as
/// [`StoreError::Malformed`] and the scan carries on past them.
pub type CredentialIter = Box<dyn Iterator<Item = Result<Credential, StoreError>> + Send>;

/// Capability shared by the legacy credential file and the users table.
///
/// The migration routine only talks to this trait, so it does not care
/// which storage technology sits on either side.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError>;

    async fn credentials(&self) -> Result<CredentialIter, StoreError>;

    /// Store `credential` unless the username is already present.
    /// Returns whether anything was written. Sources without a role
    /// column ignore `role`.
    async fn insert_credential_if_absent(
        &self,
        credential: &Credential,
        role: &str,
    ) -> Result<bool, StoreError>;
}
