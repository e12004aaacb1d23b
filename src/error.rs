use thiserror::Error;

use crate::domain::TransactionStatus;

/// Postgres SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for `check_violation`.
const PG_CHECK_VIOLATION: &str = "23514";
/// Postgres SQLSTATE for `query_canceled`, raised when `statement_timeout` fires.
const PG_QUERY_CANCELED: &str = "57014";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Duplicate key: transaction {0} already exists")]
    DuplicateKey(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Not found: transaction {0}")]
    NotFound(String),

    #[error("Invalid transition for {transaction_id}: {from} -> {to}")]
    InvalidTransition {
        transaction_id: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Conflicting transition for {transaction_id}: already {current}, requested {requested}")]
    ConflictingTransition {
        transaction_id: String,
        current: TransactionStatus,
        requested: TransactionStatus,
    },

    #[error("Storage timeout: {0}")]
    StorageTimeout(String),

    #[error("Validation error: {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// Only timeouts may be retried; every other kind is final for the call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StorageTimeout(_))
    }

    /// Maps a sqlx failure, using `transaction_id` to label key conflicts.
    pub fn from_sqlx(err: sqlx::Error, transaction_id: &str) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => {
                LedgerError::StorageTimeout("timed out acquiring a connection".to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(PG_UNIQUE_VIOLATION) => LedgerError::DuplicateKey(transaction_id.to_string()),
                Some(PG_CHECK_VIOLATION)
                    if db_err.constraint().is_some_and(|c| c.contains("amount")) =>
                {
                    LedgerError::InvalidAmount(db_err.message().to_string())
                }
                Some(PG_QUERY_CANCELED) => LedgerError::StorageTimeout(db_err.message().to_string()),
                _ => LedgerError::Storage(err.to_string()),
            },
            _ => LedgerError::Storage(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::from_sqlx(err, "<unknown>")
    }
}

impl From<crate::validation::ValidationError> for LedgerError {
    fn from(err: crate::validation::ValidationError) -> Self {
        LedgerError::Validation {
            field: err.field,
            message: err.message,
        }
    }
}
