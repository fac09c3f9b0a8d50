//! Pool registry
//!
//! Owns every [`Pool`]. One pool per symbol; the pool id is derived from the
//! symbol and never reused. Listing returns pools in creation order,
//! bootstrap pools included.

use crate::{
    types::{Pool, PoolId, PoolStatus, Symbol, TxHash},
    Error, Result,
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Result of a create attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new pool was registered
    Created(Pool),
    /// A pool for this symbol already exists; carries the existing pool
    AlreadyExists(Pool),
}

#[derive(Debug, Default)]
struct RegistryInner {
    pools: HashMap<PoolId, Pool>,
    /// Pool ids in creation order
    order: Vec<PoolId>,
    next_seq: u64,
}

/// Pool registry
#[derive(Debug, Default)]
pub struct PoolRegistry {
    inner: RwLock<RegistryInner>,
}

impl PoolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool for `symbol` unless one exists.
    ///
    /// Concurrent creates for the same symbol are serialized by the write
    /// lock; the loser receives `AlreadyExists`.
    pub fn create(
        &self,
        symbol: Symbol,
        status: PoolStatus,
        created_by: Option<TxHash>,
    ) -> CreateOutcome {
        let pool_id = PoolId::from_symbol(&symbol);
        let mut inner = self.inner.write();

        if let Some(existing) = inner.pools.get(&pool_id) {
            return CreateOutcome::AlreadyExists(existing.clone());
        }

        let pool = Pool {
            pool_id: pool_id.clone(),
            symbol,
            created_at: inner.next_seq,
            status,
            created_by,
        };
        inner.next_seq += 1;
        inner.order.push(pool_id.clone());
        inner.pools.insert(pool_id, pool.clone());
        drop(inner);

        tracing::info!(
            pool_id = %pool.pool_id,
            seq = pool.created_at,
            status = %pool.status,
            "Pool registered"
        );

        CreateOutcome::Created(pool)
    }

    /// Get pool by id
    pub fn get(&self, pool_id: &PoolId) -> Option<Pool> {
        self.inner.read().pools.get(pool_id).cloned()
    }

    /// All pools in creation order
    pub fn list(&self) -> Vec<Pool> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.pools.get(id).cloned())
            .collect()
    }

    /// Number of pools
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reinstate persisted pools at startup.
    ///
    /// Pools are re-ordered by their sequence number, and the next sequence
    /// continues after the highest restored one.
    pub fn restore(&self, mut pools: Vec<Pool>) -> Result<()> {
        pools.sort_by_key(|pool| pool.created_at);

        let mut inner = self.inner.write();
        for pool in pools {
            if pool.pool_id != PoolId::from_symbol(&pool.symbol) {
                return Err(Error::InvariantViolation(format!(
                    "pool {} does not match symbol {}",
                    pool.pool_id, pool.symbol
                )));
            }
            if inner.pools.contains_key(&pool.pool_id) {
                return Err(Error::InvariantViolation(format!(
                    "duplicate pool {} in snapshot",
                    pool.pool_id
                )));
            }
            if pool.created_at < inner.next_seq {
                return Err(Error::InvariantViolation(format!(
                    "pool {} reuses sequence number {}",
                    pool.pool_id, pool.created_at
                )));
            }
            inner.next_seq = pool.created_at + 1;
            inner.order.push(pool.pool_id.clone());
            inner.pools.insert(pool.pool_id.clone(), pool);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn symbol(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let registry = PoolRegistry::new();

        let pool = match registry.create(symbol("TCAN-014"), PoolStatus::Bootstrap, None) {
            CreateOutcome::Created(pool) => pool,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(pool.pool_id.as_str(), "pool-TCAN-014");
        assert_eq!(pool.created_at, 0);

        let fetched = registry.get(&PoolId::resolve("TCAN-014").unwrap()).unwrap();
        assert_eq!(fetched, pool);
        assert!(registry.get(&PoolId::resolve("NOPE").unwrap()).is_none());
    }

    #[test]
    fn test_duplicate_symbol_already_exists() {
        let registry = PoolRegistry::new();
        registry.create(symbol("BNB"), PoolStatus::Enabled, None);

        match registry.create(symbol("bnb"), PoolStatus::Bootstrap, None) {
            CreateOutcome::AlreadyExists(existing) => {
                assert_eq!(existing.status, PoolStatus::Enabled);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_preserves_creation_order() {
        let registry = PoolRegistry::new();
        for s in ["BNB", "TCAN-014", "AAA", "ZZZ"] {
            registry.create(symbol(s), PoolStatus::Enabled, None);
        }

        let ids: Vec<_> = registry
            .list()
            .into_iter()
            .map(|p| p.pool_id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["pool-BNB", "pool-TCAN-014", "pool-AAA", "pool-ZZZ"]);
        assert_eq!(registry.list(), registry.list());
    }

    #[test]
    fn test_concurrent_creates_single_pool() {
        let registry = Arc::new(PoolRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.create(symbol("RACE"), PoolStatus::Bootstrap, None)
                })
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|outcome| matches!(outcome, CreateOutcome::Created(_)))
            .count();

        assert_eq!(created, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_restore_orders_by_sequence() {
        let registry = PoolRegistry::new();
        let pool = |s: &str, seq: u64| Pool {
            pool_id: PoolId::resolve(s).unwrap(),
            symbol: symbol(s),
            created_at: seq,
            status: PoolStatus::Enabled,
            created_by: None,
        };

        registry.restore(vec![pool("B", 4), pool("A", 1)]).unwrap();
        let listed: Vec<_> = registry.list().into_iter().map(|p| p.created_at).collect();
        assert_eq!(listed, vec![1, 4]);

        match registry.create(symbol("C"), PoolStatus::Enabled, None) {
            CreateOutcome::Created(p) => assert_eq!(p.created_at, 5),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_restore_rejects_duplicate_pool() {
        let registry = PoolRegistry::new();
        let pool = Pool {
            pool_id: PoolId::resolve("A").unwrap(),
            symbol: symbol("A"),
            created_at: 0,
            status: PoolStatus::Enabled,
            created_by: None,
        };
        let mut again = pool.clone();
        again.created_at = 1;

        assert!(registry.restore(vec![pool, again]).is_err());
    }
}
