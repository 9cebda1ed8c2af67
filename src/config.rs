use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

/// Argon2 work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for Argon2id)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub legacy_users_file: PathBuf,
    pub hash: HashConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Address the HTTP API listens on.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid APP_HOST {:?}: {e}", self.host))
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = HashConfig::default();
        let number = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(default)
        };

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://DATA/intelligence_platform.db".into());
        anyhow::ensure!(
            database_url.starts_with("sqlite:"),
            "DATABASE_URL must be a sqlite: url, got {database_url}"
        );

        let hash = HashConfig {
            memory_kib: number("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: number("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: number("ARGON2_PARALLELISM", defaults.parallelism),
        };

        Ok(Self {
            database_url,
            max_connections: number("DB_MAX_CONNECTIONS", 5).max(1),
            legacy_users_file: lookup("LEGACY_USERS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("DATA/users.txt")),
            hash,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: lookup("APP_PORT")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(8080),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.database_url, "sqlite://DATA/intelligence_platform.db");
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.legacy_users_file, PathBuf::from("DATA/users.txt"));
        assert_eq!(cfg.hash, HashConfig::default());
        assert_eq!(cfg.bind_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn listen_address_comes_from_config() {
        let cfg = config_from(&[("APP_HOST", "127.0.0.1"), ("APP_PORT", "3000")]).unwrap();
        assert_eq!(cfg.bind_addr().unwrap(), "127.0.0.1:3000".parse().unwrap());

        let cfg = config_from(&[("APP_PORT", "99999")]).unwrap();
        assert_eq!(cfg.port, 8080);

        let cfg = config_from(&[("APP_HOST", "not a host")]).unwrap();
        assert!(cfg.bind_addr().is_err());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DB_MAX_CONNECTIONS", "2"),
            ("LEGACY_USERS_FILE", "/tmp/users.txt"),
            ("ARGON2_MEMORY_KIB", "4096"),
            ("ARGON2_ITERATIONS", "3"),
        ])
        .unwrap();
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.max_connections, 2);
        assert_eq!(cfg.legacy_users_file, PathBuf::from("/tmp/users.txt"));
        assert_eq!(cfg.hash.memory_kib, 4096);
        assert_eq!(cfg.hash.iterations, 3);
        assert_eq!(cfg.hash.parallelism, 1);
    }

    #[test]
    fn unparseable_numbers_fall_back() {
        let cfg = config_from(&[("ARGON2_ITERATIONS", "lots"), ("DB_MAX_CONNECTIONS", "0")]).unwrap();
        assert_eq!(cfg.hash.iterations, 2);
        assert_eq!(cfg.max_connections, 1);
    }

    #[test]
    fn rejects_non_sqlite_url() {
        let err = config_from(&[("DATABASE_URL", "postgres://localhost/db")]).unwrap_err();
        assert!(err.to_string().contains("sqlite"));
    }
}
