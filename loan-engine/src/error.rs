//! Error types for the loan lifecycle

use thiserror::Error;

/// Result type for loan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Loan lifecycle errors
///
/// Ledger-side failures (customer not found, account not active,
/// insufficient funds, lock timeouts) pass through the `Ledger` variant and
/// stay individually matchable.
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Loan does not exist
    #[error("Loan not found: {0}")]
    LoanNotFound(String),

    /// Application parameters failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the loan's current state
    #[error("Invalid loan state for {loan}: {reason}")]
    InvalidLoanState {
        /// Loan ID of the rejected transition
        loan: String,
        /// Which rule was broken
        reason: String,
    },

    /// Repayment amount is non-positive or exceeds the outstanding balance
    #[error("Invalid repayment amount for {loan}: {requested} (outstanding {outstanding})")]
    InvalidRepaymentAmount {
        /// Loan ID of the rejected repayment
        loan: String,
        /// Requested repayment amount
        requested: rust_decimal::Decimal,
        /// Outstanding balance at the time of the check
        outstanding: rust_decimal::Decimal,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient concurrency conflicts: safe to retry, never a state change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Ledger(inner) if inner.is_retryable())
    }
}
