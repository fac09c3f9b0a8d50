//! Storage layer
//!
//! The in-memory ledger, registry and status store are authoritative while
//! the service runs. A [`Backend`] persists every committed transition and
//! hands the state back at startup.
//!
//! # Column Families (RocksDB)
//!
//! - `ledger` - Idempotency ledger entries (key: tx hash)
//! - `status` - Status store records (key: tx hash)
//! - `pools` - Pools (key: big-endian creation sequence number)

use crate::{
    error::{Error, Result},
    types::{LedgerEntry, Pool, TransactionRecord},
    Config,
};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;

/// Column family names
const CF_LEDGER: &str = "ledger";
const CF_STATUS: &str = "status";
const CF_POOLS: &str = "pools";

/// A durable state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Ledger entry with its status record, plus the pool it created
    Outcome {
        /// Ledger entry (its outcome doubles as the status record)
        entry: LedgerEntry,
        /// Pool created by the transaction
        pool: Option<Pool>,
    },
    /// Bootstrap pool
    SeedPool(Pool),
}

/// Persisted state, as loaded at startup
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Ledger entries
    pub entries: Vec<LedgerEntry>,
    /// Status store records
    pub statuses: Vec<TransactionRecord>,
    /// Pools in creation order
    pub pools: Vec<Pool>,
}

/// Persistence interface
pub trait Backend: Send + Sync {
    /// Persist mutations atomically (all or none)
    fn commit(&self, mutations: &[Mutation]) -> Result<()>;

    /// Load everything persisted so far
    fn load(&self) -> Result<Snapshot>;
}

/// Backend that keeps committed state in process memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<Snapshot>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn commit(&self, mutations: &[Mutation]) -> Result<()> {
        let mut state = self.state.lock();
        for mutation in mutations {
            match mutation {
                Mutation::Outcome { entry, pool } => {
                    state.entries.push(entry.clone());
                    state.statuses.push(entry.outcome.clone());
                    if let Some(pool) = pool {
                        state.pools.push(pool.clone());
                    }
                }
                Mutation::SeedPool(pool) => state.pools.push(pool.clone()),
            }
        }
        Ok(())
    }

    fn load(&self) -> Result<Snapshot> {
        Ok(self.state.lock().clone())
    }
}

/// RocksDB backend
pub struct RocksStorage {
    db: Arc<DB>,
}

impl std::fmt::Debug for RocksStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStorage")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksStorage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_LEDGER, Self::cf_options_keyed()),
            ColumnFamilyDescriptor::new(CF_STATUS, Self::cf_options_keyed()),
            ColumnFamilyDescriptor::new(CF_POOLS, Self::cf_options_pools()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_keyed() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups by hash benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_pools() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn put_pool(&self, batch: &mut WriteBatch, pool: &Pool) -> Result<()> {
        let cf_pools = self.cf_handle(CF_POOLS)?;
        batch.put_cf(cf_pools, pool.created_at.to_be_bytes(), bincode::serialize(pool)?);
        Ok(())
    }

    fn scan<T: serde::de::DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf_handle(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            items.push(bincode::deserialize(&value)?);
        }
        Ok(items)
    }
}

impl Backend for RocksStorage {
    fn commit(&self, mutations: &[Mutation]) -> Result<()> {
        let mut batch = WriteBatch::default();

        for mutation in mutations {
            match mutation {
                Mutation::Outcome { entry, pool } => {
                    let key = entry.tx_hash.as_str().as_bytes();

                    let cf_ledger = self.cf_handle(CF_LEDGER)?;
                    batch.put_cf(cf_ledger, key, bincode::serialize(entry)?);

                    let cf_status = self.cf_handle(CF_STATUS)?;
                    batch.put_cf(cf_status, key, bincode::serialize(&entry.outcome)?);

                    if let Some(pool) = pool {
                        self.put_pool(&mut batch, pool)?;
                    }
                }
                Mutation::SeedPool(pool) => self.put_pool(&mut batch, pool)?,
            }
        }

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(mutations = mutations.len(), "Committed to RocksDB");
        Ok(())
    }

    fn load(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            entries: self.scan(CF_LEDGER)?,
            statuses: self.scan(CF_STATUS)?,
            pools: self.scan(CF_POOLS)?,
        };

        tracing::info!(
            entries = snapshot.entries.len(),
            pools = snapshot.pools.len(),
            "Loaded snapshot from RocksDB"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PoolId, PoolStatus, Symbol, TxHash, TxStatus};
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn pool(symbol: &str, seq: u64) -> Pool {
        let symbol = Symbol::parse(symbol).unwrap();
        Pool {
            pool_id: PoolId::from_symbol(&symbol),
            symbol,
            created_at: seq,
            status: PoolStatus::Bootstrap,
            created_by: None,
        }
    }

    fn outcome(n: u8, pool: Option<Pool>) -> Mutation {
        let tx_hash = TxHash::from_digest([n; 32]);
        Mutation::Outcome {
            entry: LedgerEntry {
                tx_hash: tx_hash.clone(),
                outcome: TransactionRecord {
                    tx_hash,
                    request: "create:X".to_string(),
                    status: TxStatus::Success,
                    result_pool_id: pool.as_ref().map(|p| p.pool_id.clone()),
                },
            },
            pool,
        }
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = RocksStorage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_LEDGER).is_some());
        assert!(storage.db.cf_handle(CF_POOLS).is_some());
    }

    #[test]
    fn test_commit_and_load() {
        let (config, _temp) = test_config();
        let storage = RocksStorage::open(&config).unwrap();

        storage
            .commit(&[Mutation::SeedPool(pool("BNB", 0)), outcome(1, Some(pool("TCAN-014", 1)))])
            .unwrap();

        let snapshot = storage.load().unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.statuses.len(), 1);
        let ids: Vec<_> = snapshot.pools.iter().map(|p| p.pool_id.as_str()).collect();
        assert_eq!(ids, vec!["pool-BNB", "pool-TCAN-014"]);
    }

    #[test]
    fn test_reopen_preserves_pool_order() {
        let (config, _temp) = test_config();
        {
            let storage = RocksStorage::open(&config).unwrap();
            // Sequence 256 sorts after 3 only with big-endian keys
            storage.commit(&[Mutation::SeedPool(pool("LATE", 256))]).unwrap();
            storage.commit(&[Mutation::SeedPool(pool("EARLY", 3))]).unwrap();
        }

        let storage = RocksStorage::open(&config).unwrap();
        let seqs: Vec<_> = storage.load().unwrap().pools.iter().map(|p| p.created_at).collect();
        assert_eq!(seqs, vec![3, 256]);
    }

    #[test]
    fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::new();
        backend.commit(&[outcome(2, None)]).unwrap();

        let snapshot = backend.load().unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert!(snapshot.pools.is_empty());
    }
}
