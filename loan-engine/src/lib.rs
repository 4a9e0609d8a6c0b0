//! Loan origination and repayment over the shared ledger
//!
//! Loans move through a small state machine (PENDING → APPROVED | REJECTED,
//! UNPAID → PAID) with interest computed once at application time. Balance
//! effects — disbursement on approval, debits on repayment — commit in the
//! same atomic storage batch as the loan-state write, via the ledger
//! engine's internal credit/debit primitives.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod manager;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use manager::LoanManager;
pub use store::LoanStore;
pub use types::{ApprovalStatus, Loan, LoanDetails, Repayment, RepaymentStatus};
