//! Periodic interest accrual over the shared ledger
//!
//! An accrual run applies one period's interest to every active
//! interest-bearing account. Runs are idempotent per period: the ledger
//! records a per-(period, account) mark in the same atomic batch as the
//! balance credit, so interrupted runs resume and finished periods are
//! never re-applied. Accrual shares the per-account locks with user
//! operations and needs no quiesced system to run.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod job;
pub mod scheduler;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use job::AccrualJob;
pub use scheduler::AccrualScheduler;
pub use types::{AccrualPeriod, RunSummary};
