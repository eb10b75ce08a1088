use crate::error::{QueryError, QueryResult};
use crate::model::{Address, Bundle, Seed};
use crate::node::{AccountData, NodeApi};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Test double for [`NodeApi`]. Answers are served in the order they were
/// registered.
#[derive(Default)]
pub struct MemoryNode {
    inner: RwLock<NodeState>,
    bundle_queries: AtomicUsize,
}

#[derive(Default)]
struct NodeState {
    accounts: HashMap<Seed, AccountData>,
    balances: HashMap<Address, i64>,
    hashes_by_address: HashMap<Address, Vec<String>>,
    bundles_by_tail: HashMap<String, Vec<Bundle>>,
    non_tail: HashSet<String>,
    failing: HashSet<String>,
    offline: bool,
}

impl MemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every transaction of `bundle` at its address and makes the
    /// bundle resolvable from its tail hash.
    pub fn add_bundle(&self, bundle: Bundle) {
        let mut state = self.write();
        for trx in bundle.transactions() {
            state
                .hashes_by_address
                .entry(trx.address.clone())
                .or_default()
                .push(trx.hash.clone());
            if !trx.is_tail() {
                state.non_tail.insert(trx.hash.clone());
            }
        }
        state
            .bundles_by_tail
            .entry(bundle.head().hash.clone())
            .or_default()
            .push(bundle);
    }

    /// A hash seen at `address` that resolves to no bundle at all.
    pub fn add_orphan_hash(&self, address: &Address, hash: &str) {
        self.write()
            .hashes_by_address
            .entry(address.clone())
            .or_default()
            .push(hash.to_string());
    }

    pub fn fail_bundle_query(&self, hash: &str) {
        self.write().failing.insert(hash.to_string());
    }

    pub fn set_balance(&self, address: &Address, balance: i64) {
        self.write().balances.insert(address.clone(), balance);
    }

    pub fn set_account(&self, seed: &Seed, data: AccountData) {
        self.write().accounts.insert(seed.clone(), data);
    }

    pub fn set_offline(&self, offline: bool) {
        self.write().offline = offline;
    }

    pub fn bundle_queries(&self) -> usize {
        self.bundle_queries.load(Ordering::SeqCst)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, NodeState> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self, operation: &'static str) -> QueryResult<std::sync::RwLockReadGuard<'_, NodeState>> {
        let state = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.offline {
            return Err(QueryError::query_failure(operation, "node unreachable"));
        }
        Ok(state)
    }
}

#[async_trait]
impl NodeApi for MemoryNode {
    async fn get_account_data(&self, seed: &Seed, horizon: usize) -> QueryResult<AccountData> {
        let state = self.read("getAccountData")?;
        let mut data = state.accounts.get(seed).cloned().ok_or_else(|| {
            QueryError::query_failure(
                "getAccountData",
                format!("no account known for seed {}", seed.short()),
            )
        })?;
        data.addresses.truncate(horizon);
        Ok(data)
    }

    async fn get_balances(&self, addresses: &[Address]) -> QueryResult<Vec<i64>> {
        let state = self.read("getBalances")?;
        Ok(addresses
            .iter()
            .map(|address| state.balances.get(address).copied().unwrap_or(0))
            .collect())
    }

    async fn find_transactions(&self, address: &Address) -> QueryResult<Vec<String>> {
        let state = self.read("findTransactions")?;
        Ok(state
            .hashes_by_address
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_bundles(&self, hash: &str) -> QueryResult<Vec<Bundle>> {
        self.bundle_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.read("getBundles")?;
        if state.failing.contains(hash) {
            return Err(QueryError::query_failure("getBundles", "request timed out"));
        }
        if state.non_tail.contains(hash) {
            return Err(QueryError::InvalidBundle(format!(
                "{} is not a tail transaction",
                hash
            )));
        }
        Ok(state.bundles_by_tail.get(hash).cloned().unwrap_or_default())
    }
}
