//! Error types for the ledger

use crate::types::AccountStatus;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// The taxonomy follows three bands: caller errors (invalid input,
/// not-found), business-rule violations (state conflicts, each carrying the
/// exact rule broken), and transient concurrency conflicts which the engine
/// may retry before surfacing.
#[derive(Error, Debug)]
pub enum Error {
    /// Account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Customer does not exist
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Transaction record does not exist
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Amount failed validation (must be strictly positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Account exists but is not ACTIVE; carries the concrete status
    #[error("Account {account} is not active: {status}")]
    AccountNotActive {
        /// Account number of the rejected account
        account: String,
        /// The concrete non-active status (INACTIVE/FROZEN/BANNED)
        status: AccountStatus,
    },

    /// Balance is smaller than the requested debit
    #[error("Insufficient funds on {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account number of the rejected account
        account: String,
        /// Balance at the time of the check
        balance: rust_decimal::Decimal,
        /// Requested debit amount
        requested: rust_decimal::Decimal,
    },

    /// Source and destination of a transfer resolve to the same account
    #[error("Transfer to self: {0}")]
    TransferToSelf(String),

    /// Account number already assigned
    #[error("Duplicate account number: {0}")]
    DuplicateAccountNumber(String),

    /// Record lock (account, loan) not acquired within the configured bound
    #[error("Lock timeout on {0}")]
    LockTimeout(String),

    /// Compare-and-save saw a stale account version
    #[error("Version conflict on account {account}: expected {expected}, found {found}")]
    VersionConflict {
        /// Account ID of the conflicting write
        account: String,
        /// Version the writer expected
        expected: u64,
        /// Version actually stored
        found: u64,
    },

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient concurrency conflicts: safe to retry, never a state change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockTimeout(_) | Error::VersionConflict { .. })
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::LockTimeout("a".into()).is_retryable());
        assert!(Error::VersionConflict {
            account: "a".into(),
            expected: 1,
            found: 2
        }
        .is_retryable());
        assert!(!Error::InvalidAmount("-1".into()).is_retryable());
        assert!(!Error::AccountNotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_lock_timeout_message_is_resource_neutral() {
        // The lock table also serializes loans, so the message must not
        // label every key an account
        let err = Error::LockTimeout("0198c0de-0000-7000-8000-000000000000".into());
        assert!(!err.to_string().contains("account"));
        assert!(err.to_string().starts_with("Lock timeout on "));
    }

    #[test]
    fn test_not_active_message_names_status() {
        let err = Error::AccountNotActive {
            account: "ACC-1".into(),
            status: AccountStatus::Frozen,
        };
        assert!(err.to_string().contains("FROZEN"));
    }
}
