//! Idempotency ledger
//!
//! Maps a transaction hash to the outcome recorded for it. This is the single
//! source of truth for "has this transaction already been applied".
//!
//! # Invariants
//!
//! - `try_claim` is the only write entry point and is atomic per hash:
//!   under concurrent calls exactly one caller observes [`Claim::Claimed`]
//! - An outcome is recorded at most once per hash, and only after a claim
//! - Entries are never removed

use crate::{
    types::{LedgerEntry, TransactionRecord, TxHash},
    Error, Result,
};
use dashmap::{mapref::entry::Entry, DashMap};

/// Result of a claim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// This caller owns the hash and must record an outcome
    Claimed,
    /// The hash was claimed earlier. Carries the recorded outcome, or `None`
    /// while the first claimant is still applying it.
    AlreadyClaimed(Option<TransactionRecord>),
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Recorded(TransactionRecord),
}

/// Idempotency ledger
#[derive(Debug, Default)]
pub struct IdempotencyLedger {
    entries: DashMap<TxHash, Slot>,
}

impl IdempotencyLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserve a hash for processing
    pub fn try_claim(&self, tx_hash: &TxHash) -> Claim {
        match self.entries.entry(tx_hash.clone()) {
            Entry::Occupied(slot) => {
                let existing = match slot.get() {
                    Slot::Pending => None,
                    Slot::Recorded(record) => Some(record.clone()),
                };
                tracing::debug!(tx_hash = %tx_hash, recorded = existing.is_some(), "Hash already claimed");
                Claim::AlreadyClaimed(existing)
            }
            Entry::Vacant(slot) => {
                slot.insert(Slot::Pending);
                tracing::debug!(tx_hash = %tx_hash, "Hash claimed");
                Claim::Claimed
            }
        }
    }

    /// Finalize a claimed hash with its outcome.
    ///
    /// Calling this without a prior successful claim, or twice for the same
    /// hash, is a programmer error and fails without touching the entry.
    pub fn record_outcome(&self, tx_hash: &TxHash, outcome: TransactionRecord) -> Result<LedgerEntry> {
        if &outcome.tx_hash != tx_hash {
            return Err(violation(format!(
                "outcome for {} recorded under {}",
                outcome.tx_hash, tx_hash
            )));
        }

        let mut slot = self
            .entries
            .get_mut(tx_hash)
            .ok_or_else(|| violation(format!("outcome recorded for unclaimed hash {}", tx_hash)))?;

        if let Slot::Recorded(_) = *slot {
            return Err(violation(format!("outcome for {} already recorded", tx_hash)));
        }

        *slot = Slot::Recorded(outcome.clone());
        Ok(LedgerEntry {
            tx_hash: tx_hash.clone(),
            outcome,
        })
    }

    /// Recorded outcome for a hash
    pub fn lookup(&self, tx_hash: &TxHash) -> Option<TransactionRecord> {
        self.entries.get(tx_hash).and_then(|slot| match &*slot {
            Slot::Recorded(record) => Some(record.clone()),
            Slot::Pending => None,
        })
    }

    /// Whether a hash has been claimed (recorded or still pending)
    pub fn is_claimed(&self, tx_hash: &TxHash) -> bool {
        self.entries.contains_key(tx_hash)
    }

    /// Reinstate a persisted entry at startup
    pub fn restore(&self, entry: LedgerEntry) -> Result<()> {
        match self.entries.entry(entry.tx_hash.clone()) {
            Entry::Occupied(_) => Err(violation(format!(
                "duplicate ledger entry for {} in snapshot",
                entry.tx_hash
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Slot::Recorded(entry.outcome));
                Ok(())
            }
        }
    }

    /// Number of claimed hashes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was claimed yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn violation(msg: String) -> Error {
    tracing::error!("{}", msg);
    Error::InvariantViolation(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxStatus;
    use std::sync::Arc;

    fn hash(n: u8) -> TxHash {
        TxHash::from_digest([n; 32])
    }

    fn record(tx_hash: &TxHash) -> TransactionRecord {
        TransactionRecord {
            tx_hash: tx_hash.clone(),
            request: "create:BNB".to_string(),
            status: TxStatus::Success,
            result_pool_id: None,
        }
    }

    #[test]
    fn test_claim_then_record() {
        let ledger = IdempotencyLedger::new();
        let h = hash(1);

        assert_eq!(ledger.try_claim(&h), Claim::Claimed);
        assert_eq!(ledger.try_claim(&h), Claim::AlreadyClaimed(None));
        assert!(ledger.lookup(&h).is_none());

        let entry = ledger.record_outcome(&h, record(&h)).unwrap();
        assert_eq!(entry.outcome.status, TxStatus::Success);
        assert_eq!(ledger.try_claim(&h), Claim::AlreadyClaimed(Some(record(&h))));
        assert_eq!(ledger.lookup(&h), Some(record(&h)));
    }

    #[test]
    fn test_record_without_claim_is_invariant_violation() {
        let ledger = IdempotencyLedger::new();
        let h = hash(2);

        let err = ledger.record_outcome(&h, record(&h)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(!ledger.is_claimed(&h));
    }

    #[test]
    fn test_second_record_rejected() {
        let ledger = IdempotencyLedger::new();
        let h = hash(3);
        ledger.try_claim(&h);
        ledger.record_outcome(&h, record(&h)).unwrap();

        let mut other = record(&h);
        other.status = TxStatus::Conflict;
        assert!(ledger.record_outcome(&h, other).is_err());
        assert_eq!(ledger.lookup(&h).unwrap().status, TxStatus::Success);
    }

    #[test]
    fn test_mismatched_hash_rejected() {
        let ledger = IdempotencyLedger::new();
        let h = hash(4);
        ledger.try_claim(&h);
        assert!(ledger.record_outcome(&h, record(&hash(5))).is_err());
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let ledger = Arc::new(IdempotencyLedger::new());
        let h = hash(6);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                let h = h.clone();
                std::thread::spawn(move || ledger.try_claim(&h))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|claim| *claim == Claim::Claimed)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_restore_rejects_duplicates() {
        let ledger = IdempotencyLedger::new();
        let h = hash(7);
        let entry = LedgerEntry {
            tx_hash: h.clone(),
            outcome: record(&h),
        };

        ledger.restore(entry.clone()).unwrap();
        assert!(ledger.restore(entry).is_err());
        assert_eq!(ledger.try_claim(&h), Claim::AlreadyClaimed(Some(record(&h))));
    }
}
