use crate::error::{QueryError, QueryResult};
use crate::trytes::{
    int_to_trytes, is_empty_trytes, is_trytes, trytes_to_int, CHECKSUM_LENGTH, HASH_LENGTH,
    SIGNATURE_FRAGMENT_LENGTH, TRANSACTION_LENGTH,
};
use serde::Deserialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::str::FromStr;

#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Seed(String);

impl Seed {
    pub fn parse(value: &str) -> QueryResult<Self> {
        let value = value.trim();
        if value.is_empty() || value.len() > HASH_LENGTH || !is_trytes(value) {
            return Err(QueryError::InvalidInput(
                "seed must be 1 to 81 trytes".to_string(),
            ));
        }
        Ok(Seed(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First trytes only, for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(5)]
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({}...)", self.short())
    }
}

impl TryFrom<String> for Seed {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Seed::parse(&value)
    }
}

/// Ledger address. Equality only looks at the 81 address trytes, never the
/// checksum or the balance attached at query time.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "String")]
pub struct Address {
    hash: String,
    checksum: Option<String>,
    pub balance: Option<i64>,
    pub key_index: Option<u64>,
    pub security_level: Option<u8>,
}

impl Address {
    pub fn parse(value: &str) -> QueryResult<Self> {
        let value = value.trim();
        if !is_trytes(value) {
            return Err(QueryError::InvalidInput(format!(
                "address {} contains non-tryte characters",
                value
            )));
        }
        let (hash, checksum) = match value.len() {
            HASH_LENGTH => (value, None),
            len if len == HASH_LENGTH + CHECKSUM_LENGTH => {
                let (hash, checksum) = value.split_at(HASH_LENGTH);
                (hash, Some(checksum.to_string()))
            }
            len => {
                return Err(QueryError::InvalidInput(format!(
                    "address {} has {} trytes, expected {} or {}",
                    value,
                    len,
                    HASH_LENGTH,
                    HASH_LENGTH + CHECKSUM_LENGTH
                )))
            }
        };
        Ok(Address {
            hash: hash.to_string(),
            checksum,
            balance: None,
            key_index: None,
            security_level: None,
        })
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Checksummed form when the checksum is known, raw trytes otherwise.
    pub fn with_checksum(&self) -> String {
        match &self.checksum {
            Some(checksum) => format!("{}{}", self.hash, checksum),
            None => self.hash.clone(),
        }
    }

    pub fn with_balance(mut self, balance: i64) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_key_index(mut self, key_index: u64) -> Self {
        self.key_index = Some(key_index);
        self
    }

    pub fn with_security_level(mut self, security_level: u8) -> Self {
        self.security_level = Some(security_level);
        self
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

impl FromStr for Address {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

const SIGNATURE_FRAGMENT: Range<usize> = 0..2187;
const ADDRESS: Range<usize> = 2187..2268;
const VALUE: Range<usize> = 2268..2295;
const OBSOLETE_TAG: Range<usize> = 2295..2322;
const TIMESTAMP: Range<usize> = 2322..2331;
const CURRENT_INDEX: Range<usize> = 2331..2340;
const LAST_INDEX: Range<usize> = 2340..2349;
const BUNDLE: Range<usize> = 2349..2430;
const TRUNK: Range<usize> = 2430..2511;
const BRANCH: Range<usize> = 2511..2592;
const TAG: Range<usize> = 2592..2619;
const ATTACHMENT_TIMESTAMP: Range<usize> = 2619..2628;
const ATTACHMENT_TIMESTAMP_LOWER_BOUND: Range<usize> = 2628..2637;
const ATTACHMENT_TIMESTAMP_UPPER_BOUND: Range<usize> = 2637..2646;
const NONCE: Range<usize> = 2646..2673;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    pub signature_fragment: String,
    pub address: Address,
    pub value: i64,
    pub obsolete_tag: String,
    pub timestamp: i64,
    pub current_index: i64,
    pub last_index: i64,
    pub bundle: String,
    pub trunk: String,
    pub branch: String,
    pub tag: String,
    pub attachment_timestamp: i64,
    pub attachment_timestamp_lower_bound: i64,
    pub attachment_timestamp_upper_bound: i64,
    pub nonce: String,
    /// Wire encoding exactly as served by the node.
    pub trytes: String,
}

impl Transaction {
    /// Returns `Ok(None)` for the all-`9` placeholder a node serves for
    /// transactions it does not know.
    pub fn from_trytes(hash: &str, trytes: &str) -> QueryResult<Option<Self>> {
        if trytes.len() != TRANSACTION_LENGTH || !is_trytes(trytes) {
            return Err(QueryError::InvalidTransaction(format!(
                "transaction {} is not {} trytes",
                hash, TRANSACTION_LENGTH
            )));
        }
        if is_empty_trytes(trytes) {
            return Ok(None);
        }
        let int = |range: Range<usize>, field: &str| {
            trytes_to_int(&trytes[range]).map_err(|err| {
                QueryError::InvalidTransaction(format!("{} of {}: {}", field, hash, err))
            })
        };

        Ok(Some(Transaction {
            hash: hash.to_string(),
            signature_fragment: trytes[SIGNATURE_FRAGMENT].to_string(),
            address: Address::parse(&trytes[ADDRESS])?,
            value: int(VALUE, "value")?,
            obsolete_tag: trytes[OBSOLETE_TAG].to_string(),
            timestamp: int(TIMESTAMP, "timestamp")?,
            current_index: int(CURRENT_INDEX, "current index")?,
            last_index: int(LAST_INDEX, "last index")?,
            bundle: trytes[BUNDLE].to_string(),
            trunk: trytes[TRUNK].to_string(),
            branch: trytes[BRANCH].to_string(),
            tag: trytes[TAG].to_string(),
            attachment_timestamp: int(ATTACHMENT_TIMESTAMP, "attachment timestamp")?,
            attachment_timestamp_lower_bound: int(
                ATTACHMENT_TIMESTAMP_LOWER_BOUND,
                "attachment timestamp lower bound",
            )?,
            attachment_timestamp_upper_bound: int(
                ATTACHMENT_TIMESTAMP_UPPER_BOUND,
                "attachment timestamp upper bound",
            )?,
            nonce: trytes[NONCE].to_string(),
            trytes: trytes.to_string(),
        }))
    }

    /// Re-encodes the decoded fields into the wire layout.
    pub fn encode(&self) -> QueryResult<String> {
        let int = |value: i64, range: Range<usize>| {
            int_to_trytes(value, range.len()).ok_or_else(|| {
                QueryError::InvalidTransaction(format!(
                    "{} does not fit in {} trytes",
                    value,
                    range.len()
                ))
            })
        };
        let fixed = |value: &str, range: Range<usize>, field: &str| {
            if value.len() != range.len() {
                return Err(QueryError::InvalidTransaction(format!(
                    "{} of {} must be {} trytes",
                    field,
                    self.hash,
                    range.len()
                )));
            }
            Ok(value.to_string())
        };

        let mut out = String::with_capacity(TRANSACTION_LENGTH);
        out += &fixed(
            &self.signature_fragment,
            SIGNATURE_FRAGMENT,
            "signature fragment",
        )?;
        out += self.address.hash();
        out += &int(self.value, VALUE)?;
        out += &fixed(&self.obsolete_tag, OBSOLETE_TAG, "obsolete tag")?;
        out += &int(self.timestamp, TIMESTAMP)?;
        out += &int(self.current_index, CURRENT_INDEX)?;
        out += &int(self.last_index, LAST_INDEX)?;
        out += &fixed(&self.bundle, BUNDLE, "bundle")?;
        out += &fixed(&self.trunk, TRUNK, "trunk")?;
        out += &fixed(&self.branch, BRANCH, "branch")?;
        out += &fixed(&self.tag, TAG, "tag")?;
        out += &int(self.attachment_timestamp, ATTACHMENT_TIMESTAMP)?;
        out += &int(
            self.attachment_timestamp_lower_bound,
            ATTACHMENT_TIMESTAMP_LOWER_BOUND,
        )?;
        out += &int(
            self.attachment_timestamp_upper_bound,
            ATTACHMENT_TIMESTAMP_UPPER_BOUND,
        )?;
        out += &fixed(&self.nonce, NONCE, "nonce")?;
        Ok(out)
    }

    pub fn is_tail(&self) -> bool {
        self.current_index == 0
    }
}

/// Transactions of one atomic transfer, ordered by `current_index`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bundle {
    transactions: Vec<Transaction>,
}

impl Bundle {
    pub fn new(transactions: Vec<Transaction>) -> QueryResult<Self> {
        let head = transactions
            .first()
            .ok_or_else(|| QueryError::InvalidBundle("bundle has no transactions".to_string()))?;
        let bundle_hash = head.bundle.clone();
        let last_index = head.last_index;

        if last_index < 0 || transactions.len() as i64 != last_index + 1 {
            return Err(QueryError::InvalidBundle(format!(
                "bundle {} has {} transactions but last index {}",
                bundle_hash,
                transactions.len(),
                last_index
            )));
        }

        let mut total: i64 = 0;
        for (position, trx) in transactions.iter().enumerate() {
            if trx.current_index != position as i64 {
                return Err(QueryError::InvalidBundle(format!(
                    "transaction {} of bundle {} has index {}, expected {}",
                    trx.hash, bundle_hash, trx.current_index, position
                )));
            }
            if trx.last_index != last_index || trx.bundle != bundle_hash {
                return Err(QueryError::InvalidBundle(format!(
                    "transaction {} does not belong to bundle {}",
                    trx.hash, bundle_hash
                )));
            }
            total = total.checked_add(trx.value).ok_or_else(|| {
                QueryError::InvalidBundle(format!("bundle {} value overflows", bundle_hash))
            })?;
        }
        if total != 0 {
            return Err(QueryError::InvalidBundle(format!(
                "bundle {} sums to {} instead of 0",
                bundle_hash, total
            )));
        }

        Ok(Bundle { transactions })
    }

    pub fn hash(&self) -> &str {
        &self.transactions[0].bundle
    }

    pub fn head(&self) -> &Transaction {
        &self.transactions[0]
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn last_index(&self) -> i64 {
        self.transactions[0].last_index
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transaction_hashes(&self) -> Vec<&str> {
        self.transactions
            .iter()
            .map(|trx| trx.hash.as_str())
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct AccountSnapshot {
    pub seed: Seed,
    pub balance: i64,
    pub addresses: Vec<Address>,
    pub bundles: Vec<Bundle>,
}

pub fn empty_signature_fragment() -> String {
    "9".repeat(SIGNATURE_FRAGMENT_LENGTH)
}
