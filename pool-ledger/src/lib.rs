//! Pool Ledger
//!
//! Exactly-once pool creation over at-least-once transaction delivery.
//!
//! # Architecture
//!
//! - **Idempotency Ledger**: Atomic claim per transaction hash; a hash is applied at most once
//! - **Pool Registry**: One pool per symbol, listed in creation order
//! - **Status Store**: `{request, status, txhash}` per processed hash
//! - **Single Writer**: One storage task persists every recorded transition
//!
//! # Invariants
//!
//! - A claimed hash is never claimed again, including across restarts
//! - Every claimed hash ends with exactly one recorded outcome
//! - Pool ids are derived from symbols (`pool-<SYMBOL>`) and never reused
//! - Reads never mutate

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod decoder;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod processor;
pub mod query;
pub mod registry;
pub mod service;
pub mod status;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use decoder::{DecodeError, MemoDecoder, TxDecoder};
pub use error::{Error, Result};
pub use processor::{ProcessOutcome, Rejection, TerminalState};
pub use query::QueryFacade;
pub use service::PoolService;
pub use status::StatusView;
pub use types::{Pool, PoolId, PoolStatus, Symbol, TransactionRecord, TxHash, TxStatus};
