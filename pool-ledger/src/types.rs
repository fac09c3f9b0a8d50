//! Core types for the pool ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode for storage, JSON at the boundary)
//! - Normalised identifiers (hashes and symbols are upper-cased on parse)
//! - Immutability of recorded outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every pool identifier
pub const POOL_ID_PREFIX: &str = "pool-";

/// Maximum accepted symbol length
pub const MAX_SYMBOL_LEN: usize = 32;

/// Transaction hash (upper-case hex, 32 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Parse a hex hash, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(s.to_ascii_uppercase()))
    }

    /// Build from a raw 32-byte digest
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode_upper(digest))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset symbol a pool is keyed on (e.g. `TCAN-014`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Parse an asset into a symbol.
    ///
    /// Upper-cases the input and strips an optional `CHAIN.` prefix, so
    /// `bnb.tcan-014` and `TCAN-014` name the same pool.
    pub fn parse(asset: &str) -> Option<Self> {
        let asset = asset.trim();
        let symbol = match asset.split_once('.') {
            Some((chain, rest))
                if !chain.is_empty() && chain.bytes().all(|b| b.is_ascii_alphabetic()) =>
            {
                rest
            }
            _ => asset,
        };

        if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
            return None;
        }
        let valid = symbol
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
        if !valid {
            return None;
        }
        Some(Self(symbol.to_ascii_uppercase()))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pool identifier, always `pool-<SYMBOL>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    /// Derive the pool id for a symbol
    pub fn from_symbol(symbol: &Symbol) -> Self {
        Self(format!("{}{}", POOL_ID_PREFIX, symbol.as_str()))
    }

    /// Resolve user input that is either a pool id or a bare symbol
    pub fn resolve(s: &str) -> Option<Self> {
        let s = s.trim();
        let symbol = s.strip_prefix(POOL_ID_PREFIX).unwrap_or(s);
        Symbol::parse(symbol).map(|sym| Self::from_symbol(&sym))
    }

    /// Symbol part of the id
    pub fn symbol(&self) -> &str {
        self.0.strip_prefix(POOL_ID_PREFIX).unwrap_or(&self.0)
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pool lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolStatus {
    /// Freshly created, not yet trading
    Bootstrap,
    /// Open for use
    Enabled,
    /// Halted
    Suspended,
}

impl PoolStatus {
    /// Canonical name
    pub fn code(&self) -> &'static str {
        match self {
            PoolStatus::Bootstrap => "Bootstrap",
            PoolStatus::Enabled => "Enabled",
            PoolStatus::Suspended => "Suspended",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_code(s: &str) -> Option<Self> {
        [PoolStatus::Bootstrap, PoolStatus::Enabled, PoolStatus::Suspended]
            .into_iter()
            .find(|status| status.code().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Recorded status of a processed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    /// Pool created
    Success,
    /// Pool symbol already taken by another transaction
    Conflict,
    /// Pool creation with an invalid symbol
    Rejected,
    /// Recognised instruction that does not mutate the registry
    Unknown,
}

impl TxStatus {
    /// Canonical name, as exposed by the status endpoint
    pub fn code(&self) -> &'static str {
        match self {
            TxStatus::Success => "Success",
            TxStatus::Conflict => "Conflict",
            TxStatus::Rejected => "Rejected",
            TxStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Outcome recorded for a transaction hash. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash
    pub tx_hash: TxHash,

    /// The request as submitted (decoded memo)
    pub request: String,

    /// Outcome status
    pub status: TxStatus,

    /// Pool created by this transaction, if any
    pub result_pool_id: Option<PoolId>,
}

/// A liquidity pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Pool id (`pool-<SYMBOL>`)
    pub pool_id: PoolId,

    /// Asset symbol (unique)
    pub symbol: Symbol,

    /// Creation sequence number
    pub created_at: u64,

    /// Current status
    pub status: PoolStatus,

    /// Creating transaction (`None` for bootstrap pools)
    pub created_by: Option<TxHash>,
}

/// Idempotency ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Transaction hash (key)
    pub tx_hash: TxHash,

    /// Recorded outcome
    pub outcome: TransactionRecord,
}

/// Memo transaction types understood by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TxType {
    /// Create a pool
    Create,
    /// Stake into a pool
    Stake,
    /// Withdraw from a pool
    Withdraw,
    /// Swap
    Swap,
    /// Outbound transfer
    Outbound,
    /// Add to pool without units
    Add,
    /// Gas top-up
    Gas,
    /// Node bond
    Bond,
    /// Node leave
    Leave,
    /// Yggdrasil vault funding
    YggdrasilFund,
    /// Yggdrasil vault return
    YggdrasilReturn,
    /// Reserve contribution
    Reserve,
    /// Refund
    Refund,
    /// Vault migration
    Migrate,
}

impl TxType {
    /// Canonical memo word
    pub fn code(&self) -> &'static str {
        match self {
            TxType::Create => "create",
            TxType::Stake => "stake",
            TxType::Withdraw => "withdraw",
            TxType::Swap => "swap",
            TxType::Outbound => "outbound",
            TxType::Add => "add",
            TxType::Gas => "gas",
            TxType::Bond => "bond",
            TxType::Leave => "leave",
            TxType::YggdrasilFund => "yggdrasil+",
            TxType::YggdrasilReturn => "yggdrasil-",
            TxType::Reserve => "reserve",
            TxType::Refund => "refund",
            TxType::Migrate => "migrate",
        }
    }

    /// Parse a memo word, including the abbreviated forms
    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" | "c" | "#" => Some(TxType::Create),
            "stake" | "st" | "+" => Some(TxType::Stake),
            "withdraw" | "wd" | "-" => Some(TxType::Withdraw),
            "swap" | "s" | "=" => Some(TxType::Swap),
            "outbound" => Some(TxType::Outbound),
            "add" | "a" | "%" => Some(TxType::Add),
            "gas" | "g" | "$" => Some(TxType::Gas),
            "bond" => Some(TxType::Bond),
            "leave" => Some(TxType::Leave),
            "yggdrasil+" => Some(TxType::YggdrasilFund),
            "yggdrasil-" => Some(TxType::YggdrasilReturn),
            "reserve" => Some(TxType::Reserve),
            "refund" => Some(TxType::Refund),
            "migrate" => Some(TxType::Migrate),
            _ => None,
        }
    }

    /// Whether the memo carries an asset as its second field
    pub fn has_asset(&self) -> bool {
        !matches!(
            self,
            TxType::Gas
                | TxType::Outbound
                | TxType::Bond
                | TxType::Leave
                | TxType::Refund
                | TxType::YggdrasilFund
                | TxType::YggdrasilReturn
                | TxType::Reserve
        )
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "AF64E866F7EDD74A558BF1519FB12700DDE51CD0DB5166ED37C568BE04E0C7F3";

    #[test]
    fn test_tx_hash_normalises_case() {
        let lower = TxHash::parse(&HASH.to_lowercase()).unwrap();
        assert_eq!(lower.as_str(), HASH);
        assert!(TxHash::parse("bogus").is_none());
        assert!(TxHash::parse(&HASH[1..]).is_none());
    }

    #[test]
    fn test_pool_id_derivation() {
        let symbol = Symbol::parse("TCAN-014").unwrap();
        assert_eq!(PoolId::from_symbol(&symbol).as_str(), "pool-TCAN-014");
    }

    #[test]
    fn test_symbol_strips_chain_and_uppercases() {
        assert_eq!(Symbol::parse("bnb.tcan-014").unwrap().as_str(), "TCAN-014");
        assert_eq!(Symbol::parse("bnb").unwrap().as_str(), "BNB");
        assert!(Symbol::parse("").is_none());
        assert!(Symbol::parse("BAD SYMBOL").is_none());
        assert!(Symbol::parse(&"X".repeat(MAX_SYMBOL_LEN + 1)).is_none());
    }

    #[test]
    fn test_pool_id_resolve_accepts_symbol_or_id() {
        assert_eq!(PoolId::resolve("TCAN-014").unwrap().as_str(), "pool-TCAN-014");
        assert_eq!(PoolId::resolve("pool-TCAN-014").unwrap().as_str(), "pool-TCAN-014");
        assert_eq!(PoolId::resolve("pool-TCAN-014").unwrap().symbol(), "TCAN-014");
        assert!(PoolId::resolve("pool-").is_none());
    }

    #[test]
    fn test_pool_status_from_code() {
        assert_eq!(PoolStatus::from_code("enabled"), Some(PoolStatus::Enabled));
        assert_eq!(PoolStatus::from_code("SUSPENDED"), Some(PoolStatus::Suspended));
        assert_eq!(PoolStatus::from_code("active"), None);
    }

    #[test]
    fn test_tx_type_abbreviations() {
        assert_eq!(TxType::from_code("#"), Some(TxType::Create));
        assert_eq!(TxType::from_code("CREATE"), Some(TxType::Create));
        assert_eq!(TxType::from_code("="), Some(TxType::Swap));
        assert_eq!(TxType::from_code("nope"), None);
        assert!(!TxType::Gas.has_asset());
        assert!(TxType::Create.has_asset());
    }
}
