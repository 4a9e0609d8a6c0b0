//! Loan store over the shared database of record
//!
//! The store attaches three column families to the ledger-core storage so
//! loan writes can join the same atomic batch as the account mutation they
//! belong to (disbursement, repayment debit).
//!
//! # Column Families
//!
//! - `loans` - Loan records (key: loan_id)
//! - `loan_customer_idx` - Ownership index (key: customer_id || loan_id)
//! - `loan_repayments` - Repayment history (key: loan_id || ts || repayment_id)

use crate::{
    error::{Error, Result},
    types::{Loan, Repayment},
};
use ledger_core::{Batch, CustomerId, Storage};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_LOANS: &str = "loans";
const CF_LOAN_CUSTOMER_IDX: &str = "loan_customer_idx";
const CF_LOAN_REPAYMENTS: &str = "loan_repayments";

/// Column families the store needs; pass these to
/// [`ledger_core::Config::extra_column_families`] before opening storage.
pub const COLUMN_FAMILIES: [&str; 3] = [CF_LOANS, CF_LOAN_CUSTOMER_IDX, CF_LOAN_REPAYMENTS];

/// Loan store
#[derive(Debug, Clone)]
pub struct LoanStore {
    storage: Arc<Storage>,
}

impl LoanStore {
    /// Attach to already-opened shared storage
    ///
    /// The storage must have been opened with [`COLUMN_FAMILIES`] registered.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Get loan by ID
    pub fn get(&self, loan_id: Uuid) -> Result<Loan> {
        let value = self
            .storage
            .get_extern(CF_LOANS, loan_id.as_bytes())?
            .ok_or_else(|| Error::LoanNotFound(loan_id.to_string()))?;

        let loan: Loan = bincode::deserialize(&value)?;
        Ok(loan)
    }

    /// All loans owned by a customer, oldest first (UUIDv7 key order)
    pub fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Loan>> {
        let entries = self
            .storage
            .scan_extern(CF_LOAN_CUSTOMER_IDX, customer_id.as_bytes())?;

        let mut loans = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let Some(Ok(id_bytes)) = key.get(16..).map(<[u8; 16]>::try_from) else {
                continue;
            };
            loans.push(self.get(Uuid::from_bytes(id_bytes))?);
        }
        Ok(loans)
    }

    /// Repayment history of a loan, oldest first
    pub fn repayments(&self, loan_id: Uuid) -> Result<Vec<Repayment>> {
        let entries = self
            .storage
            .scan_extern(CF_LOAN_REPAYMENTS, loan_id.as_bytes())?;

        let mut repayments = Vec::with_capacity(entries.len());
        for (_, value) in entries {
            repayments.push(bincode::deserialize(&value)?);
        }
        Ok(repayments)
    }

    /// Cumulative repayments, summed from the persisted history
    pub fn total_repaid(&self, loan_id: Uuid) -> Result<Decimal> {
        Ok(self
            .repayments(loan_id)?
            .iter()
            .map(|r| r.amount)
            .sum())
    }

    /// Persist a loan on its own (application, rejection)
    pub fn put(&self, loan: &Loan) -> Result<()> {
        let mut batch = self.storage.batch();
        self.stage_loan(&mut batch, loan)?;
        self.storage.commit(batch)?;
        Ok(())
    }

    // Staging methods return `ledger_core::Result` so they compose with the
    // engine's credit/debit unit-of-work closures.

    /// Stage a loan write (record + ownership index) into an atomic batch
    pub fn stage_loan(&self, batch: &mut Batch<'_>, loan: &Loan) -> ledger_core::Result<()> {
        let value = bincode::serialize(loan)?;
        batch.stage_extern(CF_LOANS, loan.id.as_bytes(), &value)?;

        let mut idx_key = loan.customer_id.as_bytes().to_vec();
        idx_key.extend_from_slice(loan.id.as_bytes());
        batch.stage_extern(CF_LOAN_CUSTOMER_IDX, &idx_key, &[])?;

        Ok(())
    }

    /// Stage a repayment record into an atomic batch
    pub fn stage_repayment(
        &self,
        batch: &mut Batch<'_>,
        repayment: &Repayment,
    ) -> ledger_core::Result<()> {
        let mut key = repayment.loan_id.as_bytes().to_vec();
        key.extend_from_slice(&(repayment.timestamp_nanos() as u64).to_be_bytes());
        key.extend_from_slice(repayment.id.as_bytes());

        let value = bincode::serialize(repayment)?;
        batch.stage_extern(CF_LOAN_REPAYMENTS, &key, &value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Loan;
    use tempfile::TempDir;

    fn test_store() -> (LoanStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = ledger_core::Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.extra_column_families = COLUMN_FAMILIES.iter().map(|s| s.to_string()).collect();

        let storage = Arc::new(Storage::open(&config).unwrap());
        (LoanStore::new(storage), temp_dir)
    }

    fn test_loan(customer_id: CustomerId) -> Loan {
        Loan::new(customer_id, Decimal::from(1000), Decimal::from(12), 12)
    }

    #[test]
    fn test_put_and_get() {
        let (store, _temp) = test_store();
        let loan = test_loan(CustomerId::generate());

        store.put(&loan).unwrap();

        let found = store.get(loan.id).unwrap();
        assert_eq!(found.id, loan.id);
        assert_eq!(found.interest, Decimal::from(120));
    }

    #[test]
    fn test_get_missing_loan() {
        let (store, _temp) = test_store();
        let result = store.get(Uuid::now_v7());
        assert!(matches!(result, Err(Error::LoanNotFound(_))));
    }

    #[test]
    fn test_list_by_customer() {
        let (store, _temp) = test_store();
        let customer = CustomerId::generate();
        let other = CustomerId::generate();

        let first = test_loan(customer);
        let second = test_loan(customer);
        store.put(&first).unwrap();
        store.put(&second).unwrap();
        store.put(&test_loan(other)).unwrap();

        let loans = store.list_by_customer(customer).unwrap();
        assert_eq!(loans.len(), 2);
        assert!(loans.iter().all(|l| l.customer_id == customer));
    }

    #[test]
    fn test_repayment_history_sums() {
        let (store, _temp) = test_store();
        let loan = test_loan(CustomerId::generate());
        store.put(&loan).unwrap();

        for amount in [300u32, 300, 520] {
            let repayment = Repayment::new(loan.id, Decimal::from(amount));
            let mut batch = store.storage.batch();
            store.stage_repayment(&mut batch, &repayment).unwrap();
            store.storage.commit(batch).unwrap();
        }

        let history = store.repayments(loan.id).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(store.total_repaid(loan.id).unwrap(), Decimal::from(1120));
    }
}
