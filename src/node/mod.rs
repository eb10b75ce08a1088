pub mod http;
pub mod memory;

use crate::error::QueryResult;
use crate::model::{Address, Bundle, Seed};
use async_trait::async_trait;

pub use http::HttpNode;
pub use memory::MemoryNode;

#[derive(Clone, Debug)]
pub struct AccountData {
    pub balance: i64,
    pub addresses: Vec<Address>,
    pub bundles: Vec<Bundle>,
}

/// Read-only query capability of a ledger node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    async fn get_account_data(&self, seed: &Seed, horizon: usize) -> QueryResult<AccountData>;

    /// Balances aligned with `addresses`.
    async fn get_balances(&self, addresses: &[Address]) -> QueryResult<Vec<i64>>;

    async fn find_transactions(&self, address: &Address) -> QueryResult<Vec<String>>;

    /// Bundles whose tail is `hash`. Empty, or an error, when `hash` does not
    /// name a tail transaction of a visible bundle.
    async fn get_bundles(&self, hash: &str) -> QueryResult<Vec<Bundle>>;
}
