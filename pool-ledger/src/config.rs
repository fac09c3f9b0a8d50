//! Configuration for the pool ledger

use crate::types::{PoolStatus, Symbol, TxHash};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Pool ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Storage backend
    pub backend: BackendKind,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Batching configuration
    pub batching: BatchingConfig,

    /// Registry configuration
    pub registry: RegistryConfig,

    /// Transactions known to the memo decoder by hash
    pub observed_txs: Vec<ObservedTx>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/pool-ledger"),
            service_name: "pool-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            backend: BackendKind::Memory,
            rocksdb: RocksDBConfig::default(),
            batching: BatchingConfig::default(),
            registry: RegistryConfig::default(),
            observed_txs: Vec::new(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process only
    Memory,
    /// RocksDB under `data_dir`
    RocksDb,
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Batching configuration for the storage writer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Maximum batch size (commits)
    pub max_batch_size: usize,

    /// Batch timeout (milliseconds)
    pub batch_timeout_ms: u64,

    /// Enable batching
    pub enabled: bool,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 64,
            batch_timeout_ms: 5,
            enabled: false,
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Pools created at startup, in order, before any transaction
    pub seed_pools: Vec<SeedPool>,

    /// Status of pools created by transactions
    #[serde(deserialize_with = "deserialize_pool_status")]
    pub new_pool_status: PoolStatus,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            seed_pools: vec![SeedPool {
                symbol: "BNB".to_string(),
                status: PoolStatus::Enabled,
            }],
            new_pool_status: PoolStatus::Bootstrap,
        }
    }
}

/// Bootstrap pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPool {
    /// Asset symbol
    pub symbol: String,

    /// Initial status
    #[serde(
        default = "default_seed_status",
        deserialize_with = "deserialize_pool_status"
    )]
    pub status: PoolStatus,
}

fn default_seed_status() -> PoolStatus {
    PoolStatus::Enabled
}

/// Pool statuses in config files are case-insensitive (`enabled`, `BOOTSTRAP`)
fn deserialize_pool_status<'de, D>(deserializer: D) -> Result<PoolStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    PoolStatus::from_code(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown pool status: {}", s)))
}

/// Observed transaction (hash → memo)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedTx {
    /// Transaction hash (hex)
    pub hash: String,

    /// Memo carried by the transaction
    pub memo: String,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = match std::env::var("POOL_LEDGER_CONFIG") {
            Ok(path) => Config::from_file(path)?,
            Err(_) => Config::default(),
        };

        if let Ok(data_dir) = std::env::var("POOL_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(backend) = std::env::var("POOL_LEDGER_BACKEND") {
            config.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => BackendKind::Memory,
                "rocksdb" => BackendKind::RocksDb,
                other => {
                    return Err(crate::Error::Config(format!("unknown backend: {}", other)));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the service cannot start with
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen = HashSet::new();
        for seed in &self.registry.seed_pools {
            let symbol = Symbol::parse(&seed.symbol).ok_or_else(|| {
                crate::Error::Config(format!("invalid seed pool symbol: {}", seed.symbol))
            })?;
            if !seen.insert(symbol.clone()) {
                return Err(crate::Error::Config(format!(
                    "seed pool {} listed twice",
                    symbol
                )));
            }
        }

        for tx in &self.observed_txs {
            if TxHash::parse(&tx.hash).is_none() {
                return Err(crate::Error::Config(format!(
                    "invalid observed transaction hash: {}",
                    tx.hash
                )));
            }
        }

        if self.batching.enabled && self.batching.max_batch_size == 0 {
            return Err(crate::Error::Config(
                "max_batch_size must be positive when batching is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "pool-ledger");
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.registry.seed_pools.len(), 1);
        assert_eq!(config.registry.new_pool_status, PoolStatus::Bootstrap);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            backend = "rocksdb"

            [registry]
            new_pool_status = "Enabled"
            seed_pools = [{ symbol = "BNB" }, { symbol = "RUNE", status = "Suspended" }]

            [[observed_txs]]
            hash = "AF64E866F7EDD74A558BF1519FB12700DDE51CD0DB5166ED37C568BE04E0C7F3"
            memo = "create:TCAN-014"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::RocksDb);
        assert_eq!(config.registry.seed_pools[1].status, PoolStatus::Suspended);
        assert_eq!(config.registry.seed_pools[0].status, PoolStatus::Enabled);
        assert_eq!(config.observed_txs.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_status_case_insensitive() {
        let config: Config = toml::from_str(
            r#"
            [registry]
            new_pool_status = "enabled"
            seed_pools = [{ symbol = "BNB", status = "SUSPENDED" }, { symbol = "RUNE", status = "bootstrap" }]
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.new_pool_status, PoolStatus::Enabled);
        assert_eq!(config.registry.seed_pools[0].status, PoolStatus::Suspended);
        assert_eq!(config.registry.seed_pools[1].status, PoolStatus::Bootstrap);

        let bad = toml::from_str::<Config>("[registry]\nnew_pool_status = \"paused\"\n");
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_seeds() {
        let mut config = Config::default();
        config.registry.seed_pools.push(SeedPool {
            symbol: "bnb".to_string(),
            status: PoolStatus::Enabled,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_observed_hash() {
        let mut config = Config::default();
        config.observed_txs.push(ObservedTx {
            hash: "bogus".to_string(),
            memo: "create:A".to_string(),
        });
        assert!(config.validate().is_err());
    }
}
