/// Errors produced while querying the node and reconciling its answers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("query failure during {operation}: {reason}")]
    QueryFailure {
        operation: &'static str,
        reason: String,
    },

    #[error(
        "could not find bundle for trx {address} ({value}i): \
         {candidates} candidate transactions, {skipped} unresolved"
    )]
    BundleNotFound {
        address: String,
        value: i64,
        candidates: usize,
        skipped: usize,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

impl QueryError {
    pub fn query_failure(operation: &'static str, reason: impl ToString) -> Self {
        QueryError::QueryFailure {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Only transport-level failures may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::QueryFailure { .. })
    }
}
