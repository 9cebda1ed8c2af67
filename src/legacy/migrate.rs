use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::auth::repo_types::DEFAULT_ROLE;
use crate::error::StoreError;
use crate::source::CredentialSource;

/// Tally of one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Records that became new rows in the target.
    pub migrated: usize,
    /// Records whose username the target already had.
    pub already_present: usize,
    pub malformed: usize,
    /// Records the target refused for any other reason.
    pub failed: usize,
}

/// Copy every credential from `source` into `target` with the default role.
///
/// Hashes are copied verbatim. Existing usernames are left alone, so
/// running this again over the same input changes nothing. Bad records and
/// single failed writes are logged and skipped; only an unreadable source
/// aborts the run.
#[instrument(skip_all, fields(source = source.name(), target = target.name()))]
pub async fn migrate(
    source: &dyn CredentialSource,
    target: &dyn CredentialSource,
) -> Result<MigrationReport, StoreError> {
    let mut report = MigrationReport::default();

    for entry in source.credentials().await? {
        let credential = match entry {
            Ok(c) => c,
            Err(StoreError::Malformed(record)) => {
                warn!(%record, "skipping malformed record");
                report.malformed += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        match target
            .insert_credential_if_absent(&credential, DEFAULT_ROLE)
            .await
        {
            Ok(true) => {
                debug!(username = %credential.username, "credential migrated");
                report.migrated += 1;
            }
            Ok(false) => report.already_present += 1,
            Err(e) => {
                warn!(error = %e, username = %credential.username, "failed to migrate credential");
                report.failed += 1;
            }
        }
    }

    info!(
        migrated = report.migrated,
        already_present = report.already_present,
        malformed = report.malformed,
        failed = report.failed,
        "credential migration finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::CredentialHasher;
    use crate::auth::repo::{SqlUserStore, UserStore};
    use crate::auth::services::AuthService;
    use crate::db::memory_pool;
    use crate::legacy::LegacyFileStore;
    use tempfile::TempDir;

    fn legacy_with(contents: &str) -> (TempDir, LegacyFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.txt");
        std::fs::write(&path, contents).unwrap();
        (dir, LegacyFileStore::new(path))
    }

    async fn users() -> SqlUserStore {
        SqlUserStore::new(memory_pool().await)
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let (_dir, legacy) = legacy_with("alice, h1\nbob, h2\ncarol, h3\n");
        let target = users().await;

        let first = migrate(&legacy, &target).await.unwrap();
        assert_eq!(first.migrated, 3);
        let after_first = target.list().await.unwrap();

        let second = migrate(&legacy, &target).await.unwrap();
        assert_eq!(second.migrated, 0);
        assert_eq!(second.already_present, 3);
        assert_eq!(target.list().await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_not_fatal() {
        let (_dir, legacy) = legacy_with("alice, h1\nmissing-comma\n");
        let target = users().await;

        let report = migrate(&legacy, &target).await.unwrap();
        assert_eq!(report.migrated, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(target.count().await.unwrap(), 1);
        assert!(target.find_by_username("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_legacy_file_migrates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = LegacyFileStore::new(dir.path().join("absent.txt"));
        let target = users().await;

        let report = migrate(&legacy, &target).await.unwrap();
        assert_eq!(report, MigrationReport::default());
    }

    #[tokio::test]
    async fn existing_users_are_not_overwritten() {
        let (_dir, legacy) = legacy_with("alice, legacy-hash\nalice, second-legacy-hash\n");
        let target = users().await;
        target.insert("alice", "current-hash", "admin").await.unwrap();

        let report = migrate(&legacy, &target).await.unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(report.already_present, 2);

        let alice = target.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.password_hash, "current-hash");
        assert_eq!(alice.role, "admin");
    }

    #[tokio::test]
    async fn migrated_users_can_log_in_with_their_old_password() {
        let hasher = CredentialHasher::fast();
        let dir = tempfile::tempdir().unwrap();
        let legacy = LegacyFileStore::new(dir.path().join("users.txt"));
        legacy.append("alice", &hasher.hash("SecurePass123!").unwrap()).unwrap();

        let target = users().await;
        assert_eq!(migrate(&legacy, &target).await.unwrap().migrated, 1);

        let service = AuthService::new(target, hasher);
        let authed = service.login("alice", "SecurePass123!").await.unwrap();
        assert_eq!(authed.role, "user");
    }

    #[tokio::test]
    async fn bcrypt_users_from_the_old_file_can_log_in() {
        let (_dir, legacy) =
            legacy_with("alice, $2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW\n");
        let target = users().await;
        assert_eq!(migrate(&legacy, &target).await.unwrap().migrated, 1);

        let service = AuthService::new(target, CredentialHasher::fast());
        let authed = service.login("alice", "U*U").await.unwrap();
        assert_eq!(authed.username, "alice");
        assert!(matches!(
            service.login("alice", "U*V").await,
            Err(crate::error::AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn failed_writes_are_counted_and_skipped() {
        let (_dir, legacy) = legacy_with("alice, h1\nbob, h2\n");
        let target = users().await;
        target.pool().close().await;

        let report = migrate(&legacy, &target).await.unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.migrated, 0);
    }

    #[tokio::test]
    async fn unreadable_source_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = LegacyFileStore::new(dir.path());
        let target = users().await;

        let err = migrate(&legacy, &target).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn works_in_either_direction() {
        let source = users().await;
        source.insert("dave", "hd", DEFAULT_ROLE).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let legacy = LegacyFileStore::new(dir.path().join("export.txt"));

        assert_eq!(migrate(&source, &legacy).await.unwrap().migrated, 1);
        assert_eq!(std::fs::read_to_string(legacy.path()).unwrap(), "dave, hd\n");
    }

    #[tokio::test]
    async fn usernames_the_file_cannot_hold_are_counted_as_failed() {
        let source = users().await;
        source.insert("dave", "hd", DEFAULT_ROLE).await.unwrap();
        source.insert("eve,admin", "he", DEFAULT_ROLE).await.unwrap();
        source.insert("mallory\nroot", "hm", DEFAULT_ROLE).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let legacy = LegacyFileStore::new(dir.path().join("export.txt"));

        let report = migrate(&source, &legacy).await.unwrap();
        assert_eq!(report.migrated, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(std::fs::read_to_string(legacy.path()).unwrap(), "dave, hd\n");
    }
}
