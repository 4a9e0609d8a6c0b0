//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account records (key: account_id)
//! - `account_numbers` - Unique number index (key: number, value: account_id)
//! - `customers` - Customer records (key: customer_id)
//! - `transactions` - Append-only transaction log (key: transaction_id)
//! - `tx_account_idx` - Per-account time index (key: account_id || ts || tx_id)
//! - `tx_counterparty_idx` - Counterparty index (key: number || ts || tx_id)
//! - `accrual_marks` - Per-account-per-period accrual markers
//!
//! Collaborating crates may register extra column families through
//! [`Config::extra_column_families`] so their writes join the same atomic
//! [`Batch`] as account and transaction updates.

use crate::{
    error::{Error, Result},
    types::{Account, AccountId, AccountNumber, Customer, CustomerId, Page, Transaction},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_ACCOUNT_NUMBERS: &str = "account_numbers";
const CF_CUSTOMERS: &str = "customers";
const CF_TRANSACTIONS: &str = "transactions";
const CF_TX_ACCOUNT_IDX: &str = "tx_account_idx";
const CF_TX_COUNTERPARTY_IDX: &str = "tx_counterparty_idx";
const CF_ACCRUAL_MARKS: &str = "accrual_marks";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy transaction log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        let mut cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_ACCOUNT_NUMBERS, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_CUSTOMERS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_TX_ACCOUNT_IDX, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_TX_COUNTERPARTY_IDX, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_ACCRUAL_MARKS, Self::cf_options_indices()),
        ];

        for name in &config.extra_column_families {
            cf_descriptors.push(ColumnFamilyDescriptor::new(name, Self::cf_options_records()));
        }

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = %path.display(),
            extra_cfs = config.extra_column_families.len(),
            "Opened RocksDB"
        );

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Records are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Account operations

    /// Get account by ID
    pub fn get_account(&self, id: AccountId) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))?;

        let account: Account = bincode::deserialize(&value)?;
        Ok(account)
    }

    /// Resolve account by its customer-facing number
    pub fn get_account_by_number(&self, number: &AccountNumber) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNT_NUMBERS)?;
        let value = self
            .db
            .get_cf(cf, number.as_str().as_bytes())?
            .ok_or_else(|| Error::AccountNotFound(number.to_string()))?;

        let id_bytes: [u8; 16] = value
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("Corrupt account number index".to_string()))?;
        self.get_account(AccountId::from_uuid(Uuid::from_bytes(id_bytes)))
    }

    /// Compare-and-save an account
    ///
    /// `account.version` must already be bumped by the writer; the write is
    /// rejected with `VersionConflict` unless the stored version equals
    /// `account.version - 1`.
    pub fn save_account(&self, account: &Account) -> Result<()> {
        let mut batch = self.batch();
        batch.stage_account_update(account)?;
        self.commit(batch)
    }

    /// List all accounts (accrual job input)
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);

        let mut accounts = Vec::new();
        for item in iter {
            let (_, value) = item?;
            accounts.push(bincode::deserialize(&value)?);
        }

        Ok(accounts)
    }

    // Customer operations

    /// Get customer by ID
    pub fn get_customer(&self, id: CustomerId) -> Result<Customer> {
        let cf = self.cf_handle(CF_CUSTOMERS)?;
        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or_else(|| Error::CustomerNotFound(id.to_string()))?;

        let customer: Customer = bincode::deserialize(&value)?;
        Ok(customer)
    }

    /// Create a customer and their account in one atomic write
    ///
    /// Enforces account-number uniqueness; the number index entry, the
    /// account, and the customer commit together or not at all.
    pub fn create_customer_with_account(
        &self,
        customer: &Customer,
        account: &Account,
    ) -> Result<()> {
        let cf_numbers = self.cf_handle(CF_ACCOUNT_NUMBERS)?;
        if self
            .db
            .get_cf(cf_numbers, account.number.as_str().as_bytes())?
            .is_some()
        {
            return Err(Error::DuplicateAccountNumber(account.number.to_string()));
        }

        let mut batch = self.batch();

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch
            .inner
            .put_cf(cf_accounts, account.id.as_bytes(), bincode::serialize(account)?);

        batch.inner.put_cf(
            cf_numbers,
            account.number.as_str().as_bytes(),
            account.id.as_bytes(),
        );

        let cf_customers = self.cf_handle(CF_CUSTOMERS)?;
        batch
            .inner
            .put_cf(cf_customers, customer.id.as_bytes(), bincode::serialize(customer)?);

        self.commit(batch)?;

        tracing::info!(
            customer_id = %customer.id,
            account_id = %account.id,
            number = %account.number,
            "Customer onboarded"
        );

        Ok(())
    }

    // Transaction log operations

    /// Get transaction by ID
    pub fn get_transaction(&self, id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or_else(|| Error::TransactionNotFound(id.to_string()))?;

        let tx: Transaction = bincode::deserialize(&value)?;
        Ok(tx)
    }

    /// Page an account's own transactions, newest first
    ///
    /// The optional predicate filters before pagination so pages stay stable
    /// for every filter.
    pub fn page_by_account(
        &self,
        account_id: AccountId,
        predicate: impl Fn(&Transaction) -> bool,
        page: Page,
    ) -> Result<Vec<Transaction>> {
        let prefix = account_id.as_bytes().to_vec();
        self.page_index(CF_TX_ACCOUNT_IDX, &prefix, predicate, page)
    }

    /// Page transactions naming this number as counterparty, newest first
    pub fn page_by_counterparty(
        &self,
        number: &AccountNumber,
        predicate: impl Fn(&Transaction) -> bool,
        page: Page,
    ) -> Result<Vec<Transaction>> {
        let mut prefix = number.as_str().as_bytes().to_vec();
        prefix.push(b'|');
        self.page_index(CF_TX_COUNTERPARTY_IDX, &prefix, predicate, page)
    }

    /// Walk an index prefix in reverse key order (newest first because keys
    /// end in big-endian timestamps), resolving each entry to its record.
    fn page_index(
        &self,
        cf_name: &str,
        prefix: &[u8],
        predicate: impl Fn(&Transaction) -> bool,
        page: Page,
    ) -> Result<Vec<Transaction>> {
        let cf = self.cf_handle(cf_name)?;

        // Seek to the last possible key under this prefix, then walk backward.
        let mut upper = prefix.to_vec();
        upper.extend_from_slice(&[0xff; 24]);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&upper, Direction::Reverse));

        let mut skipped = 0usize;
        let mut out = Vec::with_capacity(page.size);

        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            // tx_id is the final 16 bytes of every index key
            if key.len() < prefix.len() + 16 {
                continue;
            }
            let id_bytes: [u8; 16] = key[key.len() - 16..]
                .try_into()
                .map_err(|_| Error::Storage("Corrupt transaction index key".to_string()))?;
            let tx = self.get_transaction(Uuid::from_bytes(id_bytes))?;

            if !predicate(&tx) {
                continue;
            }
            if skipped < page.offset() {
                skipped += 1;
                continue;
            }
            out.push(tx);
            if out.len() >= page.size {
                break;
            }
        }

        Ok(out)
    }

    // Accrual markers

    /// Check whether interest was already applied for this period
    pub fn has_accrual_mark(&self, period: &str, account_id: AccountId) -> Result<bool> {
        let cf = self.cf_handle(CF_ACCRUAL_MARKS)?;
        let key = accrual_mark_key(period, account_id);
        Ok(self.db.get_cf(cf, &key)?.is_some())
    }

    // Extension point for collaborating crates

    /// Read a raw value from a registered extra column family
    pub fn get_extern(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(cf_name)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    /// Iterate a registered extra column family under a key prefix
    pub fn scan_extern(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    // Atomic units of work

    /// Start an atomic unit of work
    pub fn batch(&self) -> Batch<'_> {
        Batch {
            storage: self,
            inner: WriteBatch::default(),
        }
    }

    /// Commit a unit of work: every staged write lands, or none does
    pub fn commit(&self, batch: Batch<'_>) -> Result<()> {
        self.db.write(batch.inner)?;
        Ok(())
    }
}

/// Staged unit of work over [`Storage`]
///
/// All staged writes commit in a single RocksDB `WriteBatch`. Version checks
/// happen at staging time; callers are expected to hold the relevant account
/// locks from staging through commit.
pub struct Batch<'a> {
    storage: &'a Storage,
    inner: WriteBatch,
}

impl std::fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("staged_writes", &self.inner.len())
            .finish()
    }
}

impl Batch<'_> {
    /// Stage an updated account, verifying the optimistic-lock version
    ///
    /// `account.version` must already be bumped; the stored record must still
    /// hold `account.version - 1`.
    pub fn stage_account_update(&mut self, account: &Account) -> Result<()> {
        let expected = account.version.saturating_sub(1);
        let current = self.storage.get_account(account.id)?;
        if current.version != expected {
            return Err(Error::VersionConflict {
                account: account.id.to_string(),
                expected,
                found: current.version,
            });
        }

        let cf = self.storage.cf_handle(CF_ACCOUNTS)?;
        self.inner
            .put_cf(cf, account.id.as_bytes(), bincode::serialize(account)?);
        Ok(())
    }

    /// Stage a transaction record plus its account and counterparty indices
    pub fn stage_transaction(&mut self, tx: &Transaction) -> Result<()> {
        let cf_log = self.storage.cf_handle(CF_TRANSACTIONS)?;
        self.inner
            .put_cf(cf_log, tx.id.as_bytes(), bincode::serialize(tx)?);

        let cf_account_idx = self.storage.cf_handle(CF_TX_ACCOUNT_IDX)?;
        self.inner
            .put_cf(cf_account_idx, index_key_account(tx), &[]);

        if let Some(counterparty) = &tx.counterparty {
            let cf_cp_idx = self.storage.cf_handle(CF_TX_COUNTERPARTY_IDX)?;
            self.inner
                .put_cf(cf_cp_idx, index_key_counterparty(counterparty, tx), &[]);
        }

        Ok(())
    }

    /// Stage the per-account-per-period accrual marker
    pub fn stage_accrual_mark(&mut self, period: &str, account_id: AccountId) -> Result<()> {
        let cf = self.storage.cf_handle(CF_ACCRUAL_MARKS)?;
        self.inner
            .put_cf(cf, accrual_mark_key(period, account_id), &[]);
        Ok(())
    }

    /// Stage a raw write into a registered extra column family
    pub fn stage_extern(&mut self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.storage.cf_handle(cf_name)?;
        self.inner.put_cf(cf, key, value);
        Ok(())
    }
}

// Index key helpers

fn index_key_account(tx: &Transaction) -> Vec<u8> {
    let mut key = tx.account_id.as_bytes().to_vec();
    key.extend_from_slice(&(tx.timestamp_nanos() as u64).to_be_bytes());
    key.extend_from_slice(tx.id.as_bytes());
    key
}

fn index_key_counterparty(counterparty: &AccountNumber, tx: &Transaction) -> Vec<u8> {
    let mut key = counterparty.as_str().as_bytes().to_vec();
    key.push(b'|'); // Separator
    key.extend_from_slice(&(tx.timestamp_nanos() as u64).to_be_bytes());
    key.extend_from_slice(tx.id.as_bytes());
    key
}

fn accrual_mark_key(period: &str, account_id: AccountId) -> Vec<u8> {
    let mut key = period.as_bytes().to_vec();
    key.push(b'|');
    key.extend_from_slice(account_id.as_bytes());
    key
}
