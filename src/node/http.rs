use crate::derivation::AddressDeriver;
use crate::error::{QueryError, QueryResult};
use crate::model::{Address, Bundle, Seed, Transaction};
use crate::node::{AccountData, NodeApi};
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const API_VERSION_HEADER: &str = "x-iota-api-version";
const BALANCE_THRESHOLD: u8 = 100;

#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
enum Command<'a> {
    FindTransactions {
        #[serde(skip_serializing_if = "Vec::is_empty")]
        addresses: Vec<&'a str>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        bundles: Vec<&'a str>,
    },
    GetBalances {
        addresses: Vec<&'a str>,
        threshold: u8,
    },
    GetTrytes {
        hashes: Vec<&'a str>,
    },
}

impl Command<'_> {
    fn name(&self) -> &'static str {
        match self {
            Command::FindTransactions { .. } => "findTransactions",
            Command::GetBalances { .. } => "getBalances",
            Command::GetTrytes { .. } => "getTrytes",
        }
    }
}

#[derive(Debug, Deserialize)]
struct FindTransactionsResponse {
    hashes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Balance {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
struct GetBalancesResponse {
    balances: Vec<Balance>,
}

#[derive(Debug, Deserialize)]
struct GetTrytesResponse {
    trytes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Node reached over its JSON command API.
pub struct HttpNode {
    client: Client,
    endpoint: String,
    deriver: Arc<dyn AddressDeriver>,
    security: u8,
}

impl HttpNode {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        deriver: Arc<dyn AddressDeriver>,
        security: u8,
    ) -> QueryResult<Self> {
        let mut headers = HeaderMap::new();
        headers.append(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.append(API_VERSION_HEADER, HeaderValue::from_static("1"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| QueryError::query_failure("connect", err))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            deriver,
            security,
        })
    }

    async fn command<Resp: DeserializeOwned>(&self, command: &Command<'_>) -> QueryResult<Resp> {
        let operation = command.name();
        let response = self
            .client
            .post(&self.endpoint)
            .json(command)
            .send()
            .await
            .map_err(|err| QueryError::query_failure(operation, err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| QueryError::query_failure(operation, err))?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|err| err.error)
                .unwrap_or(body);
            return Err(QueryError::query_failure(
                operation,
                format!("node answered {}: {}", status, message),
            ));
        }
        parse_response(operation, &body)
    }

    async fn find_hashes(&self, addresses: &[&str], bundles: &[&str]) -> QueryResult<Vec<String>> {
        let response: FindTransactionsResponse = self
            .command(&Command::FindTransactions {
                addresses: addresses.to_vec(),
                bundles: bundles.to_vec(),
            })
            .await?;
        Ok(response.hashes)
    }

    async fn get_transactions(&self, hashes: &[String]) -> QueryResult<Vec<Option<Transaction>>> {
        if hashes.is_empty() {
            return Ok(vec![]);
        }
        let response: GetTrytesResponse = self
            .command(&Command::GetTrytes {
                hashes: hashes.iter().map(String::as_str).collect(),
            })
            .await?;
        if response.trytes.len() != hashes.len() {
            return Err(QueryError::query_failure(
                "getTrytes",
                format!(
                    "asked for {} transactions, got {}",
                    hashes.len(),
                    response.trytes.len()
                ),
            ));
        }
        hashes
            .iter()
            .zip(response.trytes.iter())
            .map(|(hash, trytes)| {
                Transaction::from_trytes(hash, trytes)
                    .map_err(|err| QueryError::query_failure("getTrytes", err))
            })
            .collect()
    }

    /// Tails of every bundle touching `addresses`, including bundles where
    /// the addresses only appear in non-tail transactions.
    async fn tails_for_addresses(&self, addresses: &[Address]) -> QueryResult<Vec<String>> {
        let addresses: Vec<&str> = addresses.iter().map(Address::hash).collect();
        let hashes = self.find_hashes(&addresses, &[]).await?;
        let transactions: Vec<Transaction> = self
            .get_transactions(&hashes)
            .await?
            .into_iter()
            .flatten()
            .collect();

        let mut tails: Vec<String> = transactions
            .iter()
            .filter(|trx| trx.is_tail())
            .map(|trx| trx.hash.clone())
            .collect();
        let non_tail_bundles: Vec<&str> = transactions
            .iter()
            .filter(|trx| !trx.is_tail())
            .map(|trx| trx.bundle.as_str())
            .unique()
            .collect();

        if !non_tail_bundles.is_empty() {
            let bundle_hashes = self.find_hashes(&[], &non_tail_bundles).await?;
            for trx in self.get_transactions(&bundle_hashes).await?.into_iter().flatten() {
                if trx.is_tail() && !tails.contains(&trx.hash) {
                    tails.push(trx.hash);
                }
            }
        }
        Ok(tails)
    }
}

fn parse_response<Resp: DeserializeOwned>(operation: &'static str, body: &str) -> QueryResult<Resp> {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return Err(QueryError::query_failure(operation, err.error));
    }
    serde_json::from_str(body)
        .map_err(|err| QueryError::query_failure(operation, format!("malformed response: {}", err)))
}

fn parse_balance(balance: &Balance) -> QueryResult<i64> {
    match balance {
        Balance::Number(value) => Ok(*value),
        Balance::Text(text) => text.parse::<i64>().map_err(|err| {
            QueryError::query_failure("getBalances", format!("balance {:?}: {}", text, err))
        }),
    }
}

#[async_trait]
trait TransactionSource: Send + Sync {
    async fn transaction(&self, hash: &str) -> QueryResult<Option<Transaction>>;
}

#[async_trait]
impl TransactionSource for HttpNode {
    async fn transaction(&self, hash: &str) -> QueryResult<Option<Transaction>> {
        let mut transactions = self.get_transactions(&[hash.to_string()]).await?;
        Ok(transactions.pop().flatten())
    }
}

/// Follows trunk references from a tail until the last index of its bundle.
async fn traverse_bundle(source: &dyn TransactionSource, tail_hash: &str) -> QueryResult<Bundle> {
    let mut transactions: Vec<Transaction> = Vec::new();
    let mut next = tail_hash.to_string();
    loop {
        let trx = source.transaction(&next).await?.ok_or_else(|| {
            QueryError::InvalidBundle(format!("bundle transaction {} not visible", next))
        })?;
        match transactions.first() {
            None if !trx.is_tail() => {
                return Err(QueryError::InvalidBundle(format!(
                    "{} is not a tail transaction",
                    tail_hash
                )))
            }
            Some(head) if head.bundle != trx.bundle => break,
            _ => {}
        }
        if trx.current_index != transactions.len() as i64 {
            return Err(QueryError::InvalidBundle(format!(
                "transaction {} has index {} at position {} of bundle {}",
                trx.hash,
                trx.current_index,
                transactions.len(),
                trx.bundle
            )));
        }
        let last_index = transactions
            .first()
            .map_or(trx.last_index, |head| head.last_index);
        let done = trx.current_index >= last_index;
        next = trx.trunk.clone();
        transactions.push(trx);
        if done {
            break;
        }
    }
    Bundle::new(transactions)
}

#[async_trait]
impl NodeApi for HttpNode {
    async fn get_account_data(&self, seed: &Seed, horizon: usize) -> QueryResult<AccountData> {
        let addresses = (0..horizon as u64)
            .map(|index| self.deriver.derive(seed, index, self.security))
            .collect::<QueryResult<Vec<_>>>()?;
        let balance = self.get_balances(&addresses).await?.iter().sum();

        let mut bundles = Vec::new();
        for tail in self.tails_for_addresses(&addresses).await? {
            match traverse_bundle(self, &tail).await {
                Ok(bundle) => bundles.push(bundle),
                Err(err @ QueryError::QueryFailure { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!("skipping bundle with tail {:?}: {}", tail, err);
                }
            }
        }
        bundles.sort_by(|a, b| {
            (a.head().attachment_timestamp, a.hash()).cmp(&(b.head().attachment_timestamp, b.hash()))
        });

        Ok(AccountData {
            balance,
            addresses,
            bundles,
        })
    }

    async fn get_balances(&self, addresses: &[Address]) -> QueryResult<Vec<i64>> {
        let response: GetBalancesResponse = self
            .command(&Command::GetBalances {
                addresses: addresses.iter().map(Address::hash).collect(),
                threshold: BALANCE_THRESHOLD,
            })
            .await?;
        if response.balances.len() != addresses.len() {
            return Err(QueryError::query_failure(
                "getBalances",
                format!(
                    "asked for {} balances, got {}",
                    addresses.len(),
                    response.balances.len()
                ),
            ));
        }
        response.balances.iter().map(parse_balance).collect()
    }

    async fn find_transactions(&self, address: &Address) -> QueryResult<Vec<String>> {
        self.find_hashes(&[address.hash()], &[]).await
    }

    async fn get_bundles(&self, hash: &str) -> QueryResult<Vec<Bundle>> {
        Ok(vec![traverse_bundle(self, hash).await?])
    }
}
