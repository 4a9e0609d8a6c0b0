//! CoreBank Ledger Core
//!
//! Account store, append-only transaction log, and the ledger engine that
//! owns the balance-mutation invariants of the retail-banking backend.
//!
//! # Architecture
//!
//! - **Single database of record**: accounts, customers, and the
//!   transaction log live in one RocksDB instance; collaborating crates
//!   attach their own column families and commit in the same write batch
//! - **Per-account serialization**: every mutation holds the account's
//!   async lock; transfers take both locks in ascending-ID order
//! - **Exact arithmetic**: `Decimal` for money, truncation toward zero
//!
//! # Invariants
//!
//! - Balance non-negativity after every committed operation
//! - Conservation under transfer: value moves, it is never created
//! - Atomic units of work: partial writes are never observable
//! - Append-only log: transaction records are immutable once written

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::LedgerEngine;
pub use locks::ResourceLocks;
pub use storage::{Batch, Storage};
pub use types::{
    Account, AccountId, AccountNumber, AccountStatus, AccountType, Customer, CustomerId,
    HistoryFilter, Page, Transaction, TransactionStatus, TransactionType,
};
