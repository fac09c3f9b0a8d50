//! Status store
//!
//! Durable `{request, status, txhash}` record per transaction hash, queryable
//! without going through the ledger or registry. Internally absence is an
//! `Option`; the empty-string triple only exists at the serialization
//! boundary ([`StatusView`]).

use crate::{
    types::{TransactionRecord, TxHash},
    Error, Result,
};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};

/// Status store
#[derive(Debug, Default)]
pub struct StatusStore {
    records: DashMap<TxHash, TransactionRecord>,
}

impl StatusStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the record for its hash.
    ///
    /// Re-putting an identical record is a no-op; a different record for a
    /// stored hash is refused.
    pub fn put(&self, record: TransactionRecord) -> Result<()> {
        match self.records.entry(record.tx_hash.clone()) {
            Entry::Occupied(existing) if existing.get() == &record => Ok(()),
            Entry::Occupied(_) => {
                let msg = format!("status for {} is already recorded", record.tx_hash);
                tracing::error!("{}", msg);
                Err(Error::InvariantViolation(msg))
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Record for a hash
    pub fn get(&self, tx_hash: &TxHash) -> Option<TransactionRecord> {
        self.records.get(tx_hash).map(|r| r.clone())
    }

    /// Boundary view for an arbitrary (possibly invalid) hash string
    pub fn view(&self, hash: &str) -> StatusView {
        TxHash::parse(hash)
            .and_then(|h| self.get(&h))
            .map(|record| StatusView::from(&record))
            .unwrap_or_default()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// External `{request, status, txhash}` triple. All fields are empty strings
/// for an unknown hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    /// Submitted request
    pub request: String,
    /// Outcome status name
    pub status: String,
    /// Transaction hash
    pub txhash: String,
}

impl StatusView {
    /// The not-found triple
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this is the not-found triple
    pub fn is_empty(&self) -> bool {
        self.request.is_empty() && self.status.is_empty() && self.txhash.is_empty()
    }
}

impl From<&TransactionRecord> for StatusView {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            request: record.request.clone(),
            status: record.status.code().to_string(),
            txhash: record.tx_hash.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxStatus;

    fn record(status: TxStatus) -> TransactionRecord {
        TransactionRecord {
            tx_hash: TxHash::from_digest([9; 32]),
            request: "create:TCAN-014".to_string(),
            status,
            result_pool_id: None,
        }
    }

    #[test]
    fn test_unknown_hash_is_empty_triple() {
        let store = StatusStore::new();
        assert_eq!(store.view("bogus"), StatusView::empty());
        assert_eq!(store.view(&"A".repeat(64)), StatusView::empty());

        let json = serde_json::to_value(store.view("bogus")).unwrap();
        assert_eq!(json, serde_json::json!({"request": "", "status": "", "txhash": ""}));
    }

    #[test]
    fn test_put_and_view() {
        let store = StatusStore::new();
        let rec = record(TxStatus::Success);
        store.put(rec.clone()).unwrap();

        let view = store.view(&rec.tx_hash.as_str().to_lowercase());
        assert_eq!(view.status, "Success");
        assert_eq!(view.request, "create:TCAN-014");
        assert_eq!(view.txhash, rec.tx_hash.as_str());
        assert!(!view.is_empty());
    }

    #[test]
    fn test_record_is_immutable() {
        let store = StatusStore::new();
        store.put(record(TxStatus::Success)).unwrap();
        store.put(record(TxStatus::Success)).unwrap();

        assert!(store.put(record(TxStatus::Conflict)).is_err());
        assert_eq!(store.get(&record(TxStatus::Success).tx_hash).unwrap().status, TxStatus::Success);
        assert_eq!(store.len(), 1);
    }
}
