use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::{Arc, OnceLock};

use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::HashConfig;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Argon2id hasher producing self-describing PHC strings.
///
/// The work factor applies to new hashes only. Verification reads the
/// parameters embedded in the stored string, so raising the cost does not
/// lock out existing users. Bcrypt strings carried over from the legacy
/// file are still accepted by [`verify`](Self::verify).
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
    // shared between clones, built on first use
    dummy_hash: Arc<OnceLock<String>>,
}

impl CredentialHasher {
    pub fn new(cfg: &HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self {
            params,
            dummy_hash: Arc::new(OnceLock::new()),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Constant-time check of `plain` against a stored hash. Any hash that
    /// does not parse is a mismatch.
    pub fn verify(&self, plain: &str, hash: &str) -> bool {
        if BCRYPT_PREFIXES.iter().any(|prefix| hash.starts_with(prefix)) {
            return match bcrypt::verify(plain, hash) {
                Ok(ok) => ok,
                Err(e) => {
                    warn!(error = %e, "stored bcrypt hash is invalid");
                    false
                }
            };
        }
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored hash is not a valid PHC string");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// Run a verify of the same cost as a real one for a username that has
    /// no account. The result is always a mismatch.
    pub fn verify_dummy(&self, plain: &str) {
        let hash = match self.dummy_hash.get() {
            Some(hash) => hash,
            None => match self.hash("dummy-password-for-unknown-users") {
                Ok(hash) => self.dummy_hash.get_or_init(|| hash),
                Err(_) => return,
            },
        };
        let _ = self.verify(plain, hash);
    }
}

#[cfg(test)]
impl CredentialHasher {
    /// Minimal work factor so tests stay fast.
    pub(crate) fn fast() -> Self {
        Self::new(&HashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .expect("test params are valid")
    }

    pub(crate) fn dummy_hash_built(&self) -> bool {
        self.dummy_hash.get().is_some()
    }
}
