use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Connection settings for the S3 / MinIO snapshot backend.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Where engine snapshots are kept. Only the selected backend's variables
/// are required.
#[derive(Debug, Clone)]
pub enum SnapshotBackend {
    Memory,
    File { path: PathBuf },
    /// Keeps the newest `retention` snapshots per tenant.
    Postgres { database_url: String, retention: u32 },
    S3(S3Settings),
    Redis { url: String },
}

/// Application configuration loaded from environment variables.
/// Startup fails if a variable required by the selected backend is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub tenant: String,
    /// Optional JSON file with a (partial) `EngineConfig`.
    pub engine_config_path: Option<PathBuf>,
    pub deterministic: bool,
    /// Seed for the decision RNG. Deterministic mode falls back to 42.
    pub rng_seed: Option<u64>,
    pub snapshot_backend: SnapshotBackend,
    pub snapshot_debounce: Duration,
    pub training_queue_capacity: usize,
}

pub const DEFAULT_RNG_SEED: u64 = 42;
pub const DEFAULT_SNAPSHOT_RETENTION: u32 = 5;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let backend = lookup("SNAPSHOT_BACKEND").unwrap_or_else(|| "memory".to_string());
        let snapshot_backend = match backend.to_ascii_lowercase().as_str() {
            "memory" => SnapshotBackend::Memory,
            "file" => SnapshotBackend::File {
                path: PathBuf::from(require("SNAPSHOT_PATH")?),
            },
            "postgres" => SnapshotBackend::Postgres {
                database_url: require("DATABASE_URL")?,
                retention: parse_or(&lookup, "SNAPSHOT_RETENTION", DEFAULT_SNAPSHOT_RETENTION)
                    .context("SNAPSHOT_RETENTION must be a positive integer")?,
            },
            "s3" => SnapshotBackend::S3(S3Settings {
                bucket: require("S3_BUCKET")?,
                endpoint: require("S3_ENDPOINT")?,
                access_key_id: require("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            }),
            "redis" => SnapshotBackend::Redis {
                url: require("REDIS_URL")?,
            },
            other => bail!("SNAPSHOT_BACKEND must be one of memory, file, postgres, s3, redis (got '{other}')"),
        };

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            tenant: lookup("ENGINE_TENANT").unwrap_or_else(|| "default".to_string()),
            engine_config_path: lookup("ENGINE_CONFIG_PATH").map(PathBuf::from),
            deterministic: parse_or(&lookup, "ENGINE_DETERMINISTIC", false)
                .context("ENGINE_DETERMINISTIC must be true or false")?,
            rng_seed: lookup("ENGINE_RNG_SEED")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("ENGINE_RNG_SEED must be an unsigned integer")?,
            snapshot_backend,
            snapshot_debounce: Duration::from_millis(
                parse_or(&lookup, "SNAPSHOT_DEBOUNCE_MS", 5_000u64)
                    .context("SNAPSHOT_DEBOUNCE_MS must be a number of milliseconds")?,
            ),
            training_queue_capacity: parse_or(&lookup, "TRAINING_QUEUE_CAPACITY", 1_024usize)
                .context("TRAINING_QUEUE_CAPACITY must be a positive integer")?,
        })
    }

    /// Seed to use for the decision RNG, if any.
    pub fn effective_seed(&self) -> Option<u64> {
        self.rng_seed
            .or_else(|| self.deterministic.then_some(DEFAULT_RNG_SEED))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => Ok(raw.trim().parse::<T>()?),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_need_no_variables() {
        let defaults = config(&[]).unwrap();
        assert_eq!(defaults.port, 8080);
        assert_eq!(defaults.tenant, "default");
        assert!(matches!(defaults.snapshot_backend, SnapshotBackend::Memory));
        assert_eq!(defaults.snapshot_debounce, Duration::from_millis(5_000));
        assert_eq!(defaults.training_queue_capacity, 1_024);
        assert_eq!(defaults.effective_seed(), None);
    }

    #[test]
    fn test_deterministic_mode_pins_the_seed() {
        let pinned = config(&[("ENGINE_DETERMINISTIC", "true")]).unwrap();
        assert_eq!(pinned.effective_seed(), Some(42));

        let explicit = config(&[("ENGINE_DETERMINISTIC", "true"), ("ENGINE_RNG_SEED", "7")]).unwrap();
        assert_eq!(explicit.effective_seed(), Some(7));
    }

    #[test]
    fn test_selected_backend_requires_its_variables() {
        let err = config(&[("SNAPSHOT_BACKEND", "redis")]).unwrap_err();
        assert!(err.to_string().contains("REDIS_URL"));

        let file = config(&[("SNAPSHOT_BACKEND", "file"), ("SNAPSHOT_PATH", "/tmp/engine.json")]).unwrap();
        assert!(matches!(file.snapshot_backend, SnapshotBackend::File { .. }));
    }

    #[test]
    fn test_postgres_retention_defaults_and_parses() {
        let defaulted = config(&[("SNAPSHOT_BACKEND", "postgres"), ("DATABASE_URL", "postgres://db")]).unwrap();
        assert!(matches!(
            defaulted.snapshot_backend,
            SnapshotBackend::Postgres { retention: 5, .. }
        ));

        let explicit = config(&[
            ("SNAPSHOT_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://db"),
            ("SNAPSHOT_RETENTION", "12"),
        ])
        .unwrap();
        assert!(matches!(
            explicit.snapshot_backend,
            SnapshotBackend::Postgres { retention: 12, .. }
        ));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(config(&[("SNAPSHOT_BACKEND", "floppy")]).is_err());
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let err = config(&[("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
