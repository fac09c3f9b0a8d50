//! Transaction decoding
//!
//! The processor never looks at raw chain encodings. A [`TxDecoder`] turns a
//! submitted body into a [`DecodedTx`]; [`MemoDecoder`] is the default
//! implementation.
//!
//! # Accepted bodies
//!
//! - JSON envelope: `{"tx_hash": "<hex>", "memo": "create:TCAN-014"}`.
//!   Without `tx_hash`, the hash is SHA-256 of the raw body.
//! - Bare 64-char hex hash, resolved against the observed transactions
//!   table (hash → memo) loaded from configuration.
//!
//! # Memo grammar
//!
//! `TYPE:ASSET[:...]`, with `TYPE` case-insensitive and abbreviations
//! accepted (`c`/`#` for create, `+` for stake, ...).

use crate::{
    types::{TxHash, TxType},
    Config, Error, Result,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

/// Why a body could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Empty body
    #[error("empty transaction body")]
    Empty,

    /// Malformed hash
    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    /// Hash not present in the observed transactions table
    #[error("transaction {0} has not been observed")]
    UnknownTransaction(String),

    /// Body is neither an envelope nor a hash
    #[error("invalid transaction envelope: {0}")]
    InvalidEnvelope(String),

    /// Memo could not be parsed
    #[error("invalid memo: {0}")]
    InvalidMemo(String),
}

/// Decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Create a pool for the asset (not yet validated as a symbol)
    CreatePool {
        /// Asset as written in the memo
        asset: String,
    },
    /// Any other recognised memo type
    Other(TxType),
}

impl Instruction {
    /// Memo type of the instruction
    pub fn tx_type(&self) -> TxType {
        match self {
            Instruction::CreatePool { .. } => TxType::Create,
            Instruction::Other(tx_type) => *tx_type,
        }
    }
}

/// Output of a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTx {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// The request, as recorded in the status store
    pub request: String,
    /// Parsed instruction
    pub instruction: Instruction,
}

/// Turns a raw submitted body into a typed instruction
pub trait TxDecoder: Send + Sync {
    /// Decode a raw body
    fn decode(&self, raw: &[u8]) -> std::result::Result<DecodedTx, DecodeError>;
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    tx_hash: Option<String>,
    memo: String,
}

/// Memo-based decoder
#[derive(Debug, Clone, Default)]
pub struct MemoDecoder {
    observed: HashMap<TxHash, String>,
}

impl MemoDecoder {
    /// Decoder with an empty observed transactions table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observed transaction
    pub fn with_observed(mut self, tx_hash: TxHash, memo: impl Into<String>) -> Self {
        self.observed.insert(tx_hash, memo.into());
        self
    }

    /// Build from the `observed_txs` configuration table
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut decoder = Self::new();
        for tx in &config.observed_txs {
            let tx_hash = TxHash::parse(&tx.hash).ok_or_else(|| {
                Error::Config(format!("invalid observed transaction hash: {}", tx.hash))
            })?;
            decoder = decoder.with_observed(tx_hash, tx.memo.clone());
        }
        Ok(decoder)
    }

    fn decode_envelope(&self, raw: &[u8]) -> std::result::Result<DecodedTx, DecodeError> {
        let envelope: Envelope = serde_json::from_slice(raw)
            .map_err(|e| DecodeError::InvalidEnvelope(e.to_string()))?;

        let tx_hash = match envelope.tx_hash {
            Some(hash) => TxHash::parse(&hash).ok_or(DecodeError::InvalidHash(hash))?,
            None => TxHash::from_digest(Sha256::digest(raw).into()),
        };

        let instruction = parse_memo(&envelope.memo)?;
        Ok(DecodedTx {
            tx_hash,
            request: envelope.memo.trim().to_string(),
            instruction,
        })
    }

    fn decode_hash(&self, body: &str) -> std::result::Result<DecodedTx, DecodeError> {
        let tx_hash =
            TxHash::parse(body).ok_or_else(|| DecodeError::InvalidHash(body.to_string()))?;
        let memo = self
            .observed
            .get(&tx_hash)
            .ok_or_else(|| DecodeError::UnknownTransaction(tx_hash.to_string()))?;

        let instruction = parse_memo(memo)?;
        Ok(DecodedTx {
            tx_hash,
            request: memo.trim().to_string(),
            instruction,
        })
    }
}

impl TxDecoder for MemoDecoder {
    fn decode(&self, raw: &[u8]) -> std::result::Result<DecodedTx, DecodeError> {
        let body = std::str::from_utf8(raw)
            .map_err(|e| DecodeError::InvalidEnvelope(e.to_string()))?
            .trim();

        if body.is_empty() {
            return Err(DecodeError::Empty);
        }
        if body.starts_with('{') {
            self.decode_envelope(raw)
        } else {
            self.decode_hash(body)
        }
    }
}

/// Parse a memo into an instruction
pub fn parse_memo(memo: &str) -> std::result::Result<Instruction, DecodeError> {
    let memo = memo.trim();
    if memo.is_empty() {
        return Err(DecodeError::InvalidMemo("memo can't be empty".to_string()));
    }

    let mut parts = memo.split(':');
    let word = parts.next().unwrap_or_default();
    let tx_type = TxType::from_code(word)
        .ok_or_else(|| DecodeError::InvalidMemo(format!("invalid tx type: {}", word)))?;

    let asset = parts.next().map(str::trim).filter(|a| !a.is_empty());
    if tx_type.has_asset() && asset.is_none() {
        return Err(DecodeError::InvalidMemo(format!(
            "{} memo requires an asset",
            tx_type
        )));
    }

    Ok(match (tx_type, asset) {
        (TxType::Create, Some(asset)) => Instruction::CreatePool {
            asset: asset.to_string(),
        },
        (other, _) => Instruction::Other(other),
    })
}
