//! Transaction processor
//!
//! Applies decoded pool-creation transactions exactly once.
//!
//! # State machine
//!
//! ```text
//! Received → Decoding ─┬─ Malformed
//!                      └─ Decoded → ClaimAttempt ─┬─ AlreadyClaimed → ReplayRejected
//!                                                 └─ Claimed → Applying ─┬─ Applied
//!                                                                        └─ RegistryConflict
//! ```
//!
//! Between a successful claim and the recorded outcome there is no
//! suspension point: claim, registry mutation, ledger record and status
//! record happen synchronously. The durable commit runs in a spawned task,
//! so dropping the caller's future after the claim cannot abandon it.
//!
//! A failed commit halts the processor: memory now holds an outcome the
//! backend never stored, so every later submission is refused with
//! [`Error::Storage`] until the service is reopened from the backend.

use crate::{
    actor::WriterHandle,
    decoder::{DecodedTx, Instruction, TxDecoder},
    ledger::{Claim, IdempotencyLedger},
    metrics::Metrics,
    registry::{CreateOutcome, PoolRegistry},
    status::StatusStore,
    storage::Mutation,
    types::{Pool, PoolId, PoolStatus, Symbol, TransactionRecord, TxHash, TxStatus},
    Error, Result,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Terminal state of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalState {
    /// Pool created
    Applied,
    /// Hash claimed, but the symbol belongs to another pool
    RegistryConflict,
    /// Hash already processed
    ReplayRejected,
    /// Input could not be used
    Malformed,
}

impl TerminalState {
    /// Metric label
    pub fn code(&self) -> &'static str {
        match self {
            TerminalState::Applied => "applied",
            TerminalState::RegistryConflict => "registry_conflict",
            TerminalState::ReplayRejected => "replay_rejected",
            TerminalState::Malformed => "malformed",
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// User-visible rejection kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Decoding or validation failed
    MalformedInput,
    /// Hash already claimed
    ReplayConflict,
    /// Symbol already owned by a pool created by another transaction
    RegistryConflict,
}

/// Outcome of processing one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Pool created and recorded
    Applied {
        /// Recorded outcome
        record: TransactionRecord,
        /// The new pool
        pool: Pool,
    },

    /// Hash claimed and recorded as `Conflict`
    RegistryConflict {
        /// Recorded outcome
        record: TransactionRecord,
        /// Pool that already owns the symbol
        existing: PoolId,
    },

    /// Hash was claimed by an earlier submission
    ReplayRejected {
        /// Replayed hash
        tx_hash: TxHash,
        /// Outcome recorded by the first submission (`None` while in flight)
        previous: Option<TransactionRecord>,
    },

    /// Nothing applied. When the hash could be decoded the outcome is
    /// recorded (`Rejected` or `Unknown`) and returned in `record`.
    Malformed {
        /// Why the input was refused
        reason: String,
        /// Recorded outcome, if the hash was claimed
        record: Option<TransactionRecord>,
    },
}

impl ProcessOutcome {
    /// Terminal state
    pub fn state(&self) -> TerminalState {
        match self {
            ProcessOutcome::Applied { .. } => TerminalState::Applied,
            ProcessOutcome::RegistryConflict { .. } => TerminalState::RegistryConflict,
            ProcessOutcome::ReplayRejected { .. } => TerminalState::ReplayRejected,
            ProcessOutcome::Malformed { .. } => TerminalState::Malformed,
        }
    }

    /// Rejection kind, `None` when applied
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            ProcessOutcome::Applied { .. } => None,
            ProcessOutcome::RegistryConflict { .. } => Some(Rejection::RegistryConflict),
            ProcessOutcome::ReplayRejected { .. } => Some(Rejection::ReplayConflict),
            ProcessOutcome::Malformed { .. } => Some(Rejection::MalformedInput),
        }
    }

    /// Hash of the submission, when it was decoded
    pub fn tx_hash(&self) -> Option<&TxHash> {
        match self {
            ProcessOutcome::Applied { record, .. } => Some(&record.tx_hash),
            ProcessOutcome::RegistryConflict { record, .. } => Some(&record.tx_hash),
            ProcessOutcome::ReplayRejected { tx_hash, .. } => Some(tx_hash),
            ProcessOutcome::Malformed { record, .. } => record.as_ref().map(|r| &r.tx_hash),
        }
    }
}

/// Synchronous part of processing, decided while holding the claim
enum Transition {
    Replayed(ProcessOutcome),
    Recorded {
        outcome: ProcessOutcome,
        mutation: Mutation,
    },
}

/// Transaction processor
#[derive(Clone)]
pub struct TransactionProcessor {
    decoder: Arc<dyn TxDecoder>,
    ledger: Arc<IdempotencyLedger>,
    registry: Arc<PoolRegistry>,
    status: Arc<StatusStore>,
    writer: WriterHandle,
    metrics: Metrics,
    new_pool_status: PoolStatus,
    halted: Arc<AtomicBool>,
}

impl fmt::Debug for TransactionProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionProcessor")
            .field("new_pool_status", &self.new_pool_status)
            .field("halted", &self.is_halted())
            .finish_non_exhaustive()
    }
}

impl TransactionProcessor {
    /// Create a processor over shared components
    pub fn new(
        decoder: Arc<dyn TxDecoder>,
        ledger: Arc<IdempotencyLedger>,
        registry: Arc<PoolRegistry>,
        status: Arc<StatusStore>,
        writer: WriterHandle,
        metrics: Metrics,
        new_pool_status: PoolStatus,
    ) -> Self {
        Self {
            decoder,
            ledger,
            registry,
            status,
            writer,
            metrics,
            new_pool_status,
            halted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a failed commit has stopped the processor
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Process a raw submission.
    ///
    /// Replays, conflicts and malformed input are returned as outcomes;
    /// `Err` means storage failure or a broken invariant.
    pub async fn process(&self, raw: &[u8]) -> Result<ProcessOutcome> {
        if self.is_halted() {
            return Err(Error::Storage(
                "processor halted after a failed commit".to_string(),
            ));
        }

        let timer = self.metrics.process_duration.start_timer();

        let decoded = match self.decoder.decode(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed transaction");
                let outcome = ProcessOutcome::Malformed {
                    reason: e.to_string(),
                    record: None,
                };
                self.metrics.record_outcome(outcome.state().code());
                return Ok(outcome);
            }
        };

        let outcome = match self.transition(decoded)? {
            Transition::Replayed(outcome) => outcome,
            Transition::Recorded { outcome, mutation } => {
                self.persist(mutation).await?;
                outcome
            }
        };

        timer.observe_duration();
        self.metrics.record_outcome(outcome.state().code());
        Ok(outcome)
    }

    /// Claim the hash and, when claimed, apply and record the outcome
    fn transition(&self, decoded: DecodedTx) -> Result<Transition> {
        let DecodedTx {
            tx_hash,
            request,
            instruction,
        } = decoded;

        match self.ledger.try_claim(&tx_hash) {
            Claim::AlreadyClaimed(previous) => {
                self.metrics.record_claim(false);
                tracing::warn!(tx_hash = %tx_hash, "Replay rejected");
                return Ok(Transition::Replayed(ProcessOutcome::ReplayRejected {
                    tx_hash,
                    previous,
                }));
            }
            Claim::Claimed => {
                self.metrics.record_claim(true);
                tracing::debug!(tx_hash = %tx_hash, "Claimed transaction");
            }
        }

        let record = |status: TxStatus, result_pool_id: Option<PoolId>| TransactionRecord {
            tx_hash: tx_hash.clone(),
            request: request.clone(),
            status,
            result_pool_id,
        };

        let (outcome, pool) = match instruction {
            Instruction::CreatePool { asset } => match Symbol::parse(&asset) {
                None => {
                    tracing::warn!(tx_hash = %tx_hash, asset = %asset, "Invalid pool symbol");
                    let outcome = ProcessOutcome::Malformed {
                        reason: format!("invalid pool symbol: {}", asset),
                        record: Some(record(TxStatus::Rejected, None)),
                    };
                    (outcome, None)
                }
                Some(symbol) => {
                    match self
                        .registry
                        .create(symbol, self.new_pool_status, Some(tx_hash.clone()))
                    {
                        CreateOutcome::Created(pool) => {
                            self.metrics.set_pools(self.registry.len());
                            let outcome = ProcessOutcome::Applied {
                                record: record(TxStatus::Success, Some(pool.pool_id.clone())),
                                pool: pool.clone(),
                            };
                            (outcome, Some(pool))
                        }
                        CreateOutcome::AlreadyExists(existing) => {
                            tracing::warn!(
                                tx_hash = %tx_hash,
                                pool_id = %existing.pool_id,
                                "Pool already exists"
                            );
                            let outcome = ProcessOutcome::RegistryConflict {
                                record: record(TxStatus::Conflict, None),
                                existing: existing.pool_id,
                            };
                            (outcome, None)
                        }
                    }
                }
            },
            Instruction::Other(tx_type) => {
                tracing::info!(tx_hash = %tx_hash, tx_type = %tx_type, "Ignoring non-pool transaction");
                let outcome = ProcessOutcome::Malformed {
                    reason: format!("unsupported instruction: {}", tx_type),
                    record: Some(record(TxStatus::Unknown, None)),
                };
                (outcome, None)
            }
        };

        let recorded = match &outcome {
            ProcessOutcome::Applied { record, .. } | ProcessOutcome::RegistryConflict { record, .. } => {
                record.clone()
            }
            ProcessOutcome::Malformed {
                record: Some(record),
                ..
            } => record.clone(),
            _ => {
                return Err(Error::InvariantViolation(format!(
                    "claimed transaction {} produced no record",
                    tx_hash
                )))
            }
        };

        let entry = self.ledger.record_outcome(&tx_hash, recorded.clone())?;
        self.status.put(recorded)?;

        Ok(Transition::Recorded {
            outcome,
            mutation: Mutation::Outcome { entry, pool },
        })
    }

    /// Write the mutation durably, surviving cancellation of the caller.
    /// Any failure halts the processor.
    async fn persist(&self, mutation: Mutation) -> Result<()> {
        let writer = self.writer.clone();
        let result = tokio::spawn(async move { writer.commit(mutation).await })
            .await
            .map_err(|e| Error::Concurrency(format!("commit task failed: {}", e)))
            .and_then(|committed| committed);

        if let Err(e) = &result {
            self.halted.store(true, Ordering::Release);
            tracing::error!(error = %e, "Commit failed, halting transaction processing");
        }
        result
    }
}
