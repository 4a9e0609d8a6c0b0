//! Loan lifecycle manager
//!
//! State machine over {PENDING, APPROVED, REJECTED} × {UNPAID, PAID}:
//! `Apply` starts at (PENDING, UNPAID); REJECTED and (APPROVED, PAID) are
//! terminal.
//!
//! Approval disbursement and repayment debits go through the ledger
//! engine's credit/debit primitives, so the loan-state write and the
//! balance mutation commit in one atomic unit: APPROVED is never recorded
//! without the disbursement, and a repayment record never exists without
//! its debit.

use crate::{
    error::{Error, Result},
    store::LoanStore,
    types::{ApprovalStatus, Loan, LoanDetails, Repayment, RepaymentStatus},
};
use ledger_core::types::truncate_money;
use ledger_core::{CustomerId, LedgerEngine, ResourceLocks};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Duration;
use uuid::Uuid;

/// Loan lifecycle manager
pub struct LoanManager {
    /// Ledger engine (disbursements, repayment debits)
    ledger: Arc<LedgerEngine>,

    /// Loan store over the shared storage
    store: LoanStore,

    /// Per-loan lock table; approval and repayment serialize per loan
    locks: ResourceLocks<Uuid>,
}

impl LoanManager {
    /// Build a manager over the shared ledger engine
    pub fn new(ledger: Arc<LedgerEngine>) -> Self {
        let store = LoanStore::new(ledger.storage().clone());
        Self {
            ledger,
            store,
            locks: ResourceLocks::new(Duration::from_millis(2_000)),
        }
    }

    /// Override the per-loan lock acquisition bound
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.locks = ResourceLocks::new(timeout);
        self
    }

    /// Apply for a loan
    ///
    /// Computes the interest amount once (principal × rate/100 × term/12,
    /// truncated) and persists the loan as (PENDING, UNPAID).
    pub fn apply(
        &self,
        customer_id: CustomerId,
        principal: Decimal,
        rate: Decimal,
        term_months: u32,
    ) -> Result<Loan> {
        // CustomerNotFound surfaces through the ledger error
        self.ledger.customer(customer_id)?;

        let principal = truncate_money(principal);
        if principal <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "principal must be positive, got {}",
                principal
            )));
        }
        if rate <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "rate must be positive, got {}",
                rate
            )));
        }
        if term_months == 0 {
            return Err(Error::InvalidInput("term must be positive".to_string()));
        }

        let loan = Loan::new(customer_id, principal, rate, term_months);
        self.store.put(&loan)?;

        tracing::info!(
            loan_id = %loan.id,
            %customer_id,
            %principal,
            %rate,
            term_months,
            interest = %loan.interest,
            "Loan application recorded"
        );
        Ok(loan)
    }

    /// Decide a pending loan
    ///
    /// Approval disburses the full principal into the customer's account;
    /// the credit and the APPROVED loan write commit together. Rejection has
    /// no balance effect.
    pub async fn approve(
        &self,
        loan_id: Uuid,
        approve: bool,
        comment: Option<String>,
    ) -> Result<Loan> {
        let _guard = self.locks.acquire(loan_id).await.map_err(Error::Ledger)?;

        let mut loan = self.store.get(loan_id)?;
        if loan.approval != ApprovalStatus::Pending {
            return Err(Error::InvalidLoanState {
                loan: loan_id.to_string(),
                reason: format!("decision requires PENDING, found {:?}", loan.approval),
            });
        }

        loan.decision_comment = comment;

        if !approve {
            loan.approval = ApprovalStatus::Rejected;
            self.store.put(&loan)?;
            tracing::info!(loan_id = %loan.id, "Loan rejected");
            return Ok(loan);
        }

        loan.approval = ApprovalStatus::Approved;
        let customer = self.ledger.customer(loan.customer_id)?;

        // Disbursement credit and APPROVED write in one atomic unit; if the
        // credit is rejected (inactive account, lock timeout) the loan stays
        // PENDING on disk.
        let store = &self.store;
        let staged = loan.clone();
        self.ledger
            .credit_with(customer.account_id, loan.principal, move |batch| {
                store.stage_loan(batch, &staged)
            })
            .await?;

        tracing::info!(
            loan_id = %loan.id,
            account_id = %customer.account_id,
            principal = %loan.principal,
            "Loan approved and disbursed"
        );
        Ok(loan)
    }

    /// Repay part or all of an approved loan
    ///
    /// Debits the customer's account, records the repayment, and flips the
    /// loan to PAID when cumulative repayments reach principal + interest —
    /// all in one atomic unit.
    pub async fn repay(&self, loan_id: Uuid, amount: Decimal) -> Result<Repayment> {
        let _guard = self.locks.acquire(loan_id).await.map_err(Error::Ledger)?;

        let mut loan = self.store.get(loan_id)?;
        if loan.approval != ApprovalStatus::Approved {
            return Err(Error::InvalidLoanState {
                loan: loan_id.to_string(),
                reason: format!("repayment requires APPROVED, found {:?}", loan.approval),
            });
        }

        let amount = truncate_money(amount);
        let repaid = self.store.total_repaid(loan_id)?;
        let outstanding = loan.total_due() - repaid;
        if amount <= Decimal::ZERO || amount > outstanding {
            return Err(Error::InvalidRepaymentAmount {
                loan: loan_id.to_string(),
                requested: amount,
                outstanding,
            });
        }

        if repaid + amount >= loan.total_due() {
            loan.repayment = RepaymentStatus::Paid;
        }

        let customer = self.ledger.customer(loan.customer_id)?;
        let repayment = Repayment::new(loan_id, amount);

        let store = &self.store;
        let staged_loan = loan.clone();
        let staged_repayment = repayment.clone();
        self.ledger
            .debit_with(customer.account_id, amount, move |batch| {
                store.stage_repayment(batch, &staged_repayment)?;
                store.stage_loan(batch, &staged_loan)
            })
            .await?;

        tracing::info!(
            loan_id = %loan.id,
            repayment_id = %repayment.id,
            %amount,
            paid_off = loan.repayment == RepaymentStatus::Paid,
            "Repayment committed"
        );
        Ok(repayment)
    }

    /// Loan with its repayment position
    pub fn details(&self, loan_id: Uuid) -> Result<LoanDetails> {
        let loan = self.store.get(loan_id)?;
        let repaid = self.store.total_repaid(loan_id)?;
        let remaining = loan.total_due() - repaid;
        Ok(LoanDetails {
            loan,
            repaid,
            remaining,
        })
    }

    /// All loans of a customer, with repayment positions
    pub fn loans_by_customer(&self, customer_id: CustomerId) -> Result<Vec<LoanDetails>> {
        self.ledger.customer(customer_id)?;

        self.store
            .list_by_customer(customer_id)?
            .into_iter()
            .map(|loan| self.details(loan.id))
            .collect()
    }
}

impl std::fmt::Debug for LoanManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoanManager").finish_non_exhaustive()
    }
}
