//! Loan domain types
//!
//! A loan's interest is computed exactly once at application time and is
//! immutable thereafter; the outstanding balance is always derived from the
//! persisted repayment history, never from a mutable running field.

use chrono::{DateTime, Months, Utc};
use ledger_core::types::truncate_money;
use ledger_core::CustomerId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ApprovalStatus {
    /// Awaiting a decision
    Pending = 1,
    /// Approved and disbursed
    Approved = 2,
    /// Rejected (terminal)
    Rejected = 3,
}

/// Repayment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RepaymentStatus {
    /// Outstanding balance remains
    Unpaid = 1,
    /// Cumulative repayments reached principal + interest (terminal)
    Paid = 2,
}

/// Loan record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    /// Unique ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Owning customer (non-owning back-reference)
    pub customer_id: CustomerId,

    /// Principal amount
    pub principal: Decimal,

    /// Annual interest rate in percent (e.g. 12 for 12%)
    pub rate: Decimal,

    /// Term in months
    pub term_months: u32,

    /// Interest amount, computed once at application time
    pub interest: Decimal,

    /// Term start (application time)
    pub start: DateTime<Utc>,

    /// Term end (start + term)
    pub end: DateTime<Utc>,

    /// Approval state
    pub approval: ApprovalStatus,

    /// Repayment state
    pub repayment: RepaymentStatus,

    /// Reviewer comment recorded with the approval decision
    pub decision_comment: Option<String>,
}

impl Loan {
    /// Build a new PENDING/UNPAID loan, computing its interest
    pub fn new(
        customer_id: CustomerId,
        principal: Decimal,
        rate: Decimal,
        term_months: u32,
    ) -> Self {
        let start = Utc::now();
        Self {
            id: Uuid::now_v7(),
            customer_id,
            principal,
            rate,
            term_months,
            interest: compute_interest(principal, rate, term_months),
            start,
            end: start + Months::new(term_months),
            approval: ApprovalStatus::Pending,
            repayment: RepaymentStatus::Unpaid,
            decision_comment: None,
        }
    }

    /// Principal plus the fixed interest amount
    pub fn total_due(&self) -> Decimal {
        self.principal + self.interest
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        self.approval == ApprovalStatus::Rejected
            || (self.approval == ApprovalStatus::Approved
                && self.repayment == RepaymentStatus::Paid)
    }
}

/// Simple-interest amount: principal × rate/100 × term/12, truncated
/// toward zero at the monetary scale (the core's single rounding policy).
pub fn compute_interest(principal: Decimal, rate: Decimal, term_months: u32) -> Decimal {
    let months = Decimal::from(term_months);
    truncate_money(principal * rate * months / Decimal::from(1200))
}

/// One repayment attempt, immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repayment {
    /// Unique ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Loan this repayment belongs to
    pub loan_id: Uuid,

    /// Amount repaid
    pub amount: Decimal,

    /// Repayment timestamp
    pub timestamp: DateTime<Utc>,
}

impl Repayment {
    /// Build a repayment record for a loan
    pub fn new(loan_id: Uuid, amount: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            loan_id,
            amount,
            timestamp: Utc::now(),
        }
    }

    /// Nanoseconds since epoch, used in index keys for stable ordering
    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or(0)
    }
}

/// Read model: a loan with its repayment position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanDetails {
    /// The loan record
    pub loan: Loan,

    /// Cumulative repayments, summed from the repayment history
    pub repaid: Decimal,

    /// principal + interest − cumulative repayments
    pub remaining: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_computation() {
        // 1000 at 12% over 12 months: 1000 * 0.12 * 1 = 120
        assert_eq!(
            compute_interest(Decimal::from(1000), Decimal::from(12), 12),
            Decimal::from(120)
        );

        // 6-month term halves the interest
        assert_eq!(
            compute_interest(Decimal::from(1000), Decimal::from(12), 6),
            Decimal::from(60)
        );
    }

    #[test]
    fn test_interest_truncates_toward_zero() {
        // 100 * 0.10 * 1/12 = 0.8333... -> 0.83
        assert_eq!(
            compute_interest(Decimal::from(100), Decimal::from(10), 1),
            Decimal::new(83, 2)
        );
    }

    #[test]
    fn test_new_loan_initial_state() {
        let loan = Loan::new(
            CustomerId::generate(),
            Decimal::from(1000),
            Decimal::from(12),
            12,
        );
        assert_eq!(loan.approval, ApprovalStatus::Pending);
        assert_eq!(loan.repayment, RepaymentStatus::Unpaid);
        assert_eq!(loan.interest, Decimal::from(120));
        assert_eq!(loan.total_due(), Decimal::from(1120));
        assert!(loan.end > loan.start);
        assert!(!loan.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        let mut loan = Loan::new(
            CustomerId::generate(),
            Decimal::from(500),
            Decimal::from(10),
            12,
        );

        loan.approval = ApprovalStatus::Rejected;
        assert!(loan.is_terminal());

        loan.approval = ApprovalStatus::Approved;
        loan.repayment = RepaymentStatus::Unpaid;
        assert!(!loan.is_terminal());

        loan.repayment = RepaymentStatus::Paid;
        assert!(loan.is_terminal());
    }

    proptest::proptest! {
        #[test]
        fn prop_interest_within_money_scale(
            principal in 1u64..10_000_000,
            rate in 1u32..100,
            term in 1u32..360,
        ) {
            let interest = compute_interest(
                Decimal::from(principal),
                Decimal::from(rate),
                term,
            );
            proptest::prop_assert!(interest >= Decimal::ZERO);
            proptest::prop_assert!(interest.scale() <= 2);
        }
    }
}
