//! Read-only query facade
//!
//! Reads never claim, create or record anything.

use crate::{
    ledger::IdempotencyLedger,
    registry::PoolRegistry,
    status::{StatusStore, StatusView},
    types::{Pool, PoolId, TransactionRecord, TxHash},
};
use std::sync::Arc;

/// Query facade over the registry, status store and ledger
#[derive(Debug, Clone)]
pub struct QueryFacade {
    registry: Arc<PoolRegistry>,
    status: Arc<StatusStore>,
    ledger: Arc<IdempotencyLedger>,
}

impl QueryFacade {
    /// Create facade
    pub fn new(
        registry: Arc<PoolRegistry>,
        status: Arc<StatusStore>,
        ledger: Arc<IdempotencyLedger>,
    ) -> Self {
        Self {
            registry,
            status,
            ledger,
        }
    }

    /// Pool by id or bare symbol (`pool-TCAN-014` or `TCAN-014`)
    pub fn pool(&self, id: &str) -> Option<Pool> {
        PoolId::resolve(id).and_then(|pool_id| self.registry.get(&pool_id))
    }

    /// All pools in creation order
    pub fn pools(&self) -> Vec<Pool> {
        self.registry.list()
    }

    /// Status triple for a hash. Unknown or invalid hashes yield the empty triple.
    pub fn tx(&self, hash: &str) -> StatusView {
        self.status.view(hash)
    }

    /// Full status record
    pub fn tx_record(&self, tx_hash: &TxHash) -> Option<TransactionRecord> {
        self.status.get(tx_hash)
    }

    /// Outcome held by the idempotency ledger
    pub fn ledger_outcome(&self, tx_hash: &TxHash) -> Option<TransactionRecord> {
        self.ledger.lookup(tx_hash)
    }
}
