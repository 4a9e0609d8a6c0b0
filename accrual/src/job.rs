//! Idempotent per-period interest accrual
//!
//! One run walks every account, converts the account's annual rate to a
//! periodic rate, and asks the ledger engine to apply it. The engine owns
//! the per-account locks and the (period, account) idempotency marks, so
//! the job is free to crash and rerun: already-marked accounts are skipped
//! and the rest are picked up.

use crate::{
    types::{AccrualPeriod, RunSummary},
    Error, Result,
};
use ledger_core::LedgerEngine;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Interest accrual job
pub struct AccrualJob {
    ledger: Arc<LedgerEngine>,
    periods_per_year: u32,

    /// Held for the duration of a run; a second concurrent run is refused
    run_guard: Mutex<()>,
}

impl AccrualJob {
    /// Build a job over the shared ledger engine
    pub fn new(ledger: Arc<LedgerEngine>, periods_per_year: u32) -> Self {
        Self {
            ledger,
            periods_per_year,
            run_guard: Mutex::new(()),
        }
    }

    /// Run accrual for one period
    ///
    /// Returns `AlreadyRunning` if another run holds the guard. Per-account
    /// failures are logged and counted, not fatal: the account stays
    /// unmarked and the next run for the same period retries it.
    pub async fn run_for_period(&self, period: AccrualPeriod) -> Result<RunSummary> {
        let _guard = self.run_guard.try_lock().map_err(|_| Error::AlreadyRunning)?;

        let period_id = period.id();
        tracing::info!(period = %period_id, "Accrual run starting");

        let accounts = self.ledger.storage().list_accounts()?;
        let mut summary = RunSummary {
            period: period_id.clone(),
            ..RunSummary::default()
        };

        for account in accounts {
            summary.seen += 1;

            if !account.is_active() || account.interest_rate <= Decimal::ZERO {
                summary.skipped += 1;
                continue;
            }

            let periodic_rate =
                account.interest_rate / Decimal::from(100) / Decimal::from(self.periods_per_year);

            match self
                .ledger
                .accrue_interest(account.id, periodic_rate, &period_id)
                .await
            {
                Ok(()) => summary.accrued += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        account_id = %account.id,
                        period = %period_id,
                        error = %e,
                        "Accrual failed for account, will retry next run"
                    );
                }
            }
        }

        tracing::info!(
            period = %period_id,
            seen = summary.seen,
            accrued = summary.accrued,
            skipped = summary.skipped,
            failed = summary.failed,
            "Accrual run finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for AccrualJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccrualJob")
            .field("periods_per_year", &self.periods_per_year)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ledger_core::{AccountNumber, AccountStatus, AccountType, Config};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn test_ledger() -> (Arc<LedgerEngine>, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        (Arc::new(LedgerEngine::open(config).unwrap()), temp)
    }

    fn august() -> AccrualPeriod {
        AccrualPeriod::containing(Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn accrues_monthly_interest_on_active_accounts() {
        let (ledger, _temp) = test_ledger();
        let (_, account) = ledger
            .open_account("Ada", AccountNumber::new("SAV-1"), AccountType::Savings, dec!(12))
            .unwrap();
        ledger.deposit(account.id, dec!(1200)).await.unwrap();

        let job = AccrualJob::new(ledger.clone(), 12);
        let summary = job.run_for_period(august()).await.unwrap();

        assert_eq!(summary.accrued, 1);
        // 1200 * 12% / 12 = 12.00
        assert_eq!(ledger.account(account.id).unwrap().balance, dec!(1212));
    }

    #[tokio::test]
    async fn rerun_for_same_period_is_idempotent() {
        let (ledger, _temp) = test_ledger();
        let (_, account) = ledger
            .open_account("Ada", AccountNumber::new("SAV-2"), AccountType::Savings, dec!(12))
            .unwrap();
        ledger.deposit(account.id, dec!(1200)).await.unwrap();

        let job = AccrualJob::new(ledger.clone(), 12);
        job.run_for_period(august()).await.unwrap();
        job.run_for_period(august()).await.unwrap();

        assert_eq!(ledger.account(account.id).unwrap().balance, dec!(1212));
    }

    #[tokio::test]
    async fn skips_inactive_and_zero_rate_accounts() {
        let (ledger, _temp) = test_ledger();
        let (_, frozen) = ledger
            .open_account("Bo", AccountNumber::new("SAV-3"), AccountType::Savings, dec!(12))
            .unwrap();
        ledger.deposit(frozen.id, dec!(1000)).await.unwrap();

        let mut account = ledger.account(frozen.id).unwrap();
        account.status = AccountStatus::Frozen;
        account.version += 1;
        ledger.storage().save_account(&account).unwrap();

        let (_, zero_rate) = ledger
            .open_account("Cy", AccountNumber::new("CUR-1"), AccountType::Current, dec!(0))
            .unwrap();
        ledger.deposit(zero_rate.id, dec!(1000)).await.unwrap();

        let job = AccrualJob::new(ledger.clone(), 12);
        let summary = job.run_for_period(august()).await.unwrap();

        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.accrued, 0);
        assert_eq!(ledger.account(frozen.id).unwrap().balance, dec!(1000));
        assert_eq!(ledger.account(zero_rate.id).unwrap().balance, dec!(1000));
    }

    #[tokio::test]
    async fn truncates_fractional_interest() {
        let (ledger, _temp) = test_ledger();
        let (_, account) = ledger
            .open_account("Di", AccountNumber::new("SAV-4"), AccountType::Savings, dec!(10))
            .unwrap();
        ledger.deposit(account.id, dec!(100)).await.unwrap();

        let job = AccrualJob::new(ledger.clone(), 12);
        job.run_for_period(august()).await.unwrap();

        // 100 * 10% / 12 = 0.8333... -> 0.83
        assert_eq!(ledger.account(account.id).unwrap().balance, dec!(100.83));
    }

    #[tokio::test]
    async fn concurrent_run_is_refused() {
        let (ledger, _temp) = test_ledger();
        let job = AccrualJob::new(ledger, 12);

        let _held = job.run_guard.try_lock().unwrap();
        let result = job.run_for_period(august()).await;
        assert!(matches!(result, Err(Error::AlreadyRunning)));
    }
}
