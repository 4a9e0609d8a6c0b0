//! Core types for the banking ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Monetary scale: all committed balances and amounts carry 2 decimal places.
pub const MONEY_SCALE: u32 = 2;

/// Truncate a monetary value toward zero at [`MONEY_SCALE`].
///
/// This is the single rounding policy for the whole core: interest and any
/// divided amounts are truncated, never rounded up.
pub fn truncate_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero)
}

/// Account identifier (internal, immutable)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a fresh account ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Raw bytes (used as storage key)
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Customer identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CustomerId(Uuid);

impl CustomerId {
    /// Generate a fresh customer ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Raw bytes (used as storage key)
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Customer-facing account number
///
/// Globally unique and immutable once assigned. Transfers address their
/// counterparty by account number, never by internal ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Create new account number
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account product type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccountType {
    /// Interest-bearing savings account
    Savings = 1,
    /// Current (checking) account
    Current = 2,
}

/// Account status
///
/// Only `Active` accounts accept balance mutations. The concrete non-active
/// reason is preserved so callers can distinguish the rule that was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccountStatus {
    /// Accepts all operations
    Active = 1,
    /// Dormant, no operations allowed
    Inactive = 2,
    /// Temporarily blocked
    Frozen = 3,
    /// Permanently blocked
    Banned = 4,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Frozen => "FROZEN",
            AccountStatus::Banned => "BANNED",
        };
        write!(f, "{}", s)
    }
}

/// Bank account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Internal identifier
    pub id: AccountId,

    /// Customer-facing account number (unique, immutable)
    pub number: AccountNumber,

    /// Current balance (exact decimal, never negative after commit)
    pub balance: Decimal,

    /// Annual interest rate in percent (e.g. 2.50)
    pub interest_rate: Decimal,

    /// Product type
    pub account_type: AccountType,

    /// Status
    pub status: AccountStatus,

    /// Owning customer (non-owning back-reference)
    pub customer_id: CustomerId,

    /// Optimistic-lock version, bumped on every committed write
    pub version: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Check the account accepts balance mutations
    pub fn is_active(&self) -> bool {
        matches!(self.status, AccountStatus::Active)
    }
}

/// Customer record
///
/// Owns exactly one account (1:1) and zero or more loans. The loan side of
/// the relation lives in the loan store, keyed by customer ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier
    pub id: CustomerId,

    /// Display name
    pub name: String,

    /// The customer's single account
    pub account_id: AccountId,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionType {
    /// Balance increase
    Deposit = 1,
    /// Balance decrease
    Withdrawal = 2,
    /// Debit on this account, credit on the counterparty
    Transfer = 3,
}

/// Transaction status
///
/// Records are immutable once written; the status is asserted at creation
/// and never edited retroactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Created but not yet resolved
    Pending = 1,
    /// Applied to the balance
    Completed = 2,
    /// Rejected by a business rule (kept for audit)
    Failed = 3,
}

/// Immutable transaction record, the audit trail of every balance mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Owning account
    pub account_id: AccountId,

    /// Amount (always positive; the type determines the sign of the effect)
    pub amount: Decimal,

    /// Transaction type
    pub tx_type: TransactionType,

    /// Status asserted at creation
    pub status: TransactionStatus,

    /// Counterparty account number; present iff `tx_type == Transfer`
    pub counterparty: Option<AccountNumber>,

    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Build a record for a deposit or withdrawal
    pub fn new(
        account_id: AccountId,
        amount: Decimal,
        tx_type: TransactionType,
        status: TransactionStatus,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            amount,
            tx_type,
            status,
            counterparty: None,
            timestamp: Utc::now(),
        }
    }

    /// Build a record for a transfer debited from `account_id`
    pub fn transfer(
        account_id: AccountId,
        counterparty: AccountNumber,
        amount: Decimal,
        status: TransactionStatus,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            amount,
            tx_type: TransactionType::Transfer,
            status,
            counterparty: Some(counterparty),
            timestamp: Utc::now(),
        }
    }

    /// Nanoseconds since epoch, used in index keys for stable ordering
    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or(0)
    }
}

/// History query filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter {
    /// Every record owned by the account
    All,
    /// Deposits only
    Deposits,
    /// Withdrawals only
    Withdrawals,
    /// Outgoing transfers (this account is the source)
    Sent,
    /// Incoming transfers (this account's number is the counterparty)
    Received,
}

/// History page request
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// Zero-based page index
    pub number: usize,
    /// Records per page
    pub size: usize,
}

impl Page {
    /// First page with the given size
    pub fn first(size: usize) -> Self {
        Self { number: 0, size }
    }

    /// Records to skip before this page starts
    pub fn offset(&self) -> usize {
        self.number * self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_truncate_money_toward_zero() {
        assert_eq!(truncate_money(Decimal::new(12349, 3)), Decimal::new(1234, 2)); // 12.349 -> 12.34
        assert_eq!(truncate_money(Decimal::new(-12349, 3)), Decimal::new(-1234, 2));
        assert_eq!(truncate_money(Decimal::new(120, 0)), Decimal::new(120, 0));
    }

    #[test]
    fn test_account_id_ordering_is_total() {
        let a = AccountId::generate();
        let b = AccountId::generate();
        assert_ne!(a, b);
        assert_eq!(a.cmp(&b).reverse(), b.cmp(&a));
    }

    #[test]
    fn test_transfer_record_carries_counterparty() {
        let tx = Transaction::transfer(
            AccountId::generate(),
            AccountNumber::new("ACC-0002"),
            Decimal::new(1000, 2),
            TransactionStatus::Completed,
        );
        assert_eq!(tx.tx_type, TransactionType::Transfer);
        assert_eq!(tx.counterparty.as_ref().unwrap().as_str(), "ACC-0002");
    }

    #[test]
    fn test_account_active_check() {
        let account = Account {
            id: AccountId::generate(),
            number: AccountNumber::new("ACC-0001"),
            balance: Decimal::ZERO,
            interest_rate: Decimal::new(250, 2),
            account_type: AccountType::Savings,
            status: AccountStatus::Frozen,
            customer_id: CustomerId::generate(),
            version: 0,
            created_at: Utc::now(),
        };
        assert!(!account.is_active());
    }

    #[test]
    fn test_page_offset() {
        let page = Page { number: 3, size: 20 };
        assert_eq!(page.offset(), 60);
        assert_eq!(Page::first(10).offset(), 0);
    }
}
