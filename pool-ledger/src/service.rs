//! Pool service orchestration layer
//!
//! Ties together the backend, writer actor, ledger, registry, status store
//! and processor into the high-level API used by the gateway and binary.
//!
//! # Example
//!
//! ```no_run
//! use pool_ledger::{Config, PoolService};
//!
//! #[tokio::main]
//! async fn main() -> pool_ledger::Result<()> {
//!     let service = PoolService::open(Config::default()).await?;
//!
//!     let outcome = service
//!         .submit(br#"{"memo":"create:TCAN-014"}"#)
//!         .await?;
//!     println!("{}", outcome.state());
//!
//!     service.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_storage_writer, WriterHandle},
    config::BackendKind,
    decoder::{MemoDecoder, TxDecoder},
    ledger::IdempotencyLedger,
    metrics::Metrics,
    processor::{ProcessOutcome, TransactionProcessor},
    query::QueryFacade,
    registry::{CreateOutcome, PoolRegistry},
    status::StatusStore,
    storage::{Backend, MemoryBackend, Mutation, RocksStorage},
    types::{PoolId, Symbol},
    Config, Error, Result,
};
use std::sync::Arc;

/// Pool service
pub struct PoolService {
    processor: TransactionProcessor,
    query: QueryFacade,
    writer: WriterHandle,
    metrics: Metrics,
    config: Config,
}

impl std::fmt::Debug for PoolService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolService")
            .field("service_name", &self.config.service_name)
            .field("backend", &self.config.backend)
            .finish_non_exhaustive()
    }
}

impl PoolService {
    /// Open the service with the configured backend and memo decoder
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let backend: Arc<dyn Backend> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::RocksDb => Arc::new(RocksStorage::open(&config)?),
        };
        let decoder = Arc::new(MemoDecoder::from_config(&config)?);

        Self::with_parts(config, backend, decoder).await
    }

    /// Open the service over an explicit backend and decoder.
    ///
    /// Persisted state is restored first; seed pools missing from it are then
    /// created and persisted in configuration order.
    pub async fn with_parts(
        config: Config,
        backend: Arc<dyn Backend>,
        decoder: Arc<dyn TxDecoder>,
    ) -> Result<Self> {
        let metrics = Metrics::new()?;
        let ledger = Arc::new(IdempotencyLedger::new());
        let registry = Arc::new(PoolRegistry::new());
        let status = Arc::new(StatusStore::new());

        let snapshot = backend.load()?;
        for entry in snapshot.entries {
            ledger.restore(entry)?;
        }
        for record in snapshot.statuses {
            status.put(record)?;
        }
        registry.restore(snapshot.pools)?;

        tracing::info!(
            entries = ledger.len(),
            pools = registry.len(),
            "Restored pool ledger state"
        );

        let writer = spawn_storage_writer(backend, &config.batching, metrics.clone());

        for seed in &config.registry.seed_pools {
            let symbol = Symbol::parse(&seed.symbol).ok_or_else(|| {
                Error::Config(format!("invalid seed pool symbol: {}", seed.symbol))
            })?;
            if registry.get(&PoolId::from_symbol(&symbol)).is_some() {
                continue;
            }
            if let CreateOutcome::Created(pool) = registry.create(symbol, seed.status, None) {
                writer.commit(Mutation::SeedPool(pool)).await?;
            }
        }
        metrics.set_pools(registry.len());

        let processor = TransactionProcessor::new(
            decoder,
            ledger.clone(),
            registry.clone(),
            status.clone(),
            writer.clone(),
            metrics.clone(),
            config.registry.new_pool_status,
        );
        let query = QueryFacade::new(registry, status, ledger);

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            backend = ?config.backend,
            "Pool service opened"
        );

        Ok(Self {
            processor,
            query,
            writer,
            metrics,
            config,
        })
    }

    /// Submit a raw transaction
    pub async fn submit(&self, raw: &[u8]) -> Result<ProcessOutcome> {
        self.processor.process(raw).await
    }

    /// Whether a failed commit has stopped transaction processing
    pub fn is_halted(&self) -> bool {
        self.processor.is_halted()
    }

    /// Read-only queries
    pub fn query(&self) -> &QueryFacade {
        &self.query
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the service was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flush pending writes
    pub async fn flush(&self) -> Result<()> {
        self.writer.flush().await
    }

    /// Flush pending writes and stop the writer
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down pool service");
        self.writer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::TerminalState;
    use crate::types::{PoolStatus, TxHash, TxStatus};
    use tempfile::TempDir;

    const HASH: &str = "AF64E866F7EDD74A558BF1519FB12700DDE51CD0DB5166ED37C568BE04E0C7F3";

    fn decoder() -> Arc<dyn TxDecoder> {
        Arc::new(MemoDecoder::new().with_observed(TxHash::parse(HASH).unwrap(), "create:TCAN-014"))
    }

    #[tokio::test]
    async fn test_open_seeds_pools() {
        let service = PoolService::open(Config::default()).await.unwrap();

        let pools = service.query().pools();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].pool_id.as_str(), "pool-BNB");
        assert_eq!(pools[0].status, PoolStatus::Enabled);
        assert_eq!(service.metrics().pools.get(), 1);

        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reopen_restores_claims_and_pools() {
        let backend = Arc::new(MemoryBackend::new());

        let service = PoolService::with_parts(Config::default(), backend.clone(), decoder())
            .await
            .unwrap();
        let outcome = service.submit(HASH.as_bytes()).await.unwrap();
        assert_eq!(outcome.state(), TerminalState::Applied);
        service.shutdown().await.unwrap();

        let reopened = PoolService::with_parts(Config::default(), backend.clone(), decoder())
            .await
            .unwrap();

        // Seed pool is not duplicated on reopen
        let ids: Vec<_> = reopened
            .query()
            .pools()
            .into_iter()
            .map(|p| p.pool_id.to_string())
            .collect();
        assert_eq!(ids, vec!["pool-BNB", "pool-TCAN-014"]);

        let replay = reopened.submit(HASH.as_bytes()).await.unwrap();
        assert_eq!(replay.state(), TerminalState::ReplayRejected);
        assert_eq!(reopened.query().tx(HASH).status, TxStatus::Success.code());

        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rocksdb_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.backend = BackendKind::RocksDb;
        config.data_dir = temp_dir.path().to_path_buf();
        config.observed_txs.push(crate::config::ObservedTx {
            hash: HASH.to_string(),
            memo: "create:TCAN-014".to_string(),
        });

        {
            let service = PoolService::open(config.clone()).await.unwrap();
            let outcome = service.submit(HASH.as_bytes()).await.unwrap();
            assert_eq!(outcome.state(), TerminalState::Applied);
            service.shutdown().await.unwrap();
        }

        let service = PoolService::open(config).await.unwrap();
        assert!(service.query().pool("pool-TCAN-014").is_some());
        assert_eq!(service.query().pools().len(), 2);

        let replay = service.submit(HASH.as_bytes()).await.unwrap();
        assert_eq!(replay.state(), TerminalState::ReplayRejected);
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_batched_writes_flush() {
        let mut config = Config::default();
        config.batching.enabled = true;
        config.batching.batch_timeout_ms = 1_000;

        let backend = Arc::new(MemoryBackend::new());
        let service = Arc::new(
            PoolService::with_parts(config, backend.clone(), decoder())
                .await
                .unwrap(),
        );

        let submit = {
            let service = service.clone();
            tokio::spawn(async move { service.submit(br#"{"memo":"create:ETH"}"#).await })
        };

        // Give the submission time to reach the writer, then force the flush
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        service.flush().await.unwrap();

        let outcome = submit.await.unwrap().unwrap();
        assert_eq!(outcome.state(), TerminalState::Applied);
        assert_eq!(backend.load().unwrap().entries.len(), 1);

        service.shutdown().await.unwrap();
    }

    struct FailingBackend;

    impl Backend for FailingBackend {
        fn commit(&self, _mutations: &[Mutation]) -> Result<()> {
            Err(Error::Storage("disk unavailable".to_string()))
        }

        fn load(&self) -> Result<crate::storage::Snapshot> {
            Ok(Default::default())
        }
    }

    #[tokio::test]
    async fn test_failed_commit_halts_service() {
        let mut config = Config::default();
        config.registry.seed_pools.clear();

        let service = PoolService::with_parts(
            config,
            Arc::new(FailingBackend),
            Arc::new(MemoDecoder::new()),
        )
        .await
        .unwrap();
        assert!(!service.is_halted());

        let body = br#"{"memo":"create:ETH"}"#;
        assert!(service.submit(body).await.is_err());
        assert!(service.is_halted());

        // The retry is refused as a storage failure, not reported as a replay
        match service.submit(body).await {
            Err(Error::Storage(msg)) => assert!(msg.contains("halted")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

