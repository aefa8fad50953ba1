use crate::domain::ledger::{LedgerEntry, NewLedgerEntry};
use crate::domain::order::PaymentOrder;
use crate::domain::ports::{LedgerStore, OrderStore, StateChange, Storage, WalletStore};
use crate::domain::wallet::{UserId, Wallet};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Column family for wallet snapshots, keyed by user id.
pub const CF_WALLETS: &str = "wallets";
/// Column family for ledger entries, keyed by big-endian `seq` so an
/// iterator walks them in append order.
pub const CF_LEDGER: &str = "ledger";
/// Column family for payment orders, keyed by order id bytes.
pub const CF_ORDERS: &str = "orders";

/// A persistent store implementation using RocksDB.
///
/// One database holds all three entity tables in separate column families,
/// with JSON values. Composite transitions land in a single `WriteBatch`, so
/// either the whole transition is durable or none of it is.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    next_seq: Arc<Mutex<u64>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist and recovering the ledger append
    /// counter from the last stored entry.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Options::default()),
            ColumnFamilyDescriptor::new(CF_LEDGER, Options::default()),
            ColumnFamilyDescriptor::new(CF_ORDERS, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let last_seq = {
            let cf = db
                .cf_handle(CF_LEDGER)
                .ok_or_else(|| missing_cf(CF_LEDGER))?;
            match db.iterator_cf(cf, IteratorMode::End).next() {
                Some(item) => {
                    let (key, _) = item?;
                    let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                        PaymentError::Storage(std::io::Error::other("malformed ledger key"))
                    })?;
                    u64::from_be_bytes(bytes)
                }
                None => 0,
            }
        };

        Ok(Self {
            db: Arc::new(db),
            next_seq: Arc::new(Mutex::new(last_seq + 1)),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| missing_cf(name))
    }

    fn take_seq(&self) -> u64 {
        let mut next = self.next_seq.lock();
        let seq = *next;
        *next += 1;
        seq
    }

    fn scan_ledger(&self) -> Result<Vec<LedgerEntry>> {
        let cf = self.cf(CF_LEDGER)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }
}

fn missing_cf(name: &str) -> PaymentError {
    PaymentError::Storage(std::io::Error::other(format!(
        "{name} column family not found"
    )))
}

fn tail<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit
        && items.len() > limit
    {
        items.drain(..items.len() - limit);
    }
    items
}

#[async_trait]
impl WalletStore for RocksDbStore {
    async fn wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        let cf = self.cf(CF_WALLETS)?;
        match self.db.get_cf(cf, user_id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_wallet(&self, wallet: Wallet) -> Result<()> {
        let cf = self.cf(CF_WALLETS)?;
        let value = serde_json::to_vec(&wallet)?;
        self.db.put_cf(cf, wallet.user_id.as_str().as_bytes(), value)?;
        Ok(())
    }

    async fn wallets(&self) -> Result<Vec<Wallet>> {
        let cf = self.cf(CF_WALLETS)?;
        let mut wallets = Vec::new();
        // Keys are user ids, so the scan is already sorted.
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            wallets.push(serde_json::from_slice(&value)?);
        }
        Ok(wallets)
    }
}

#[async_trait]
impl LedgerStore for RocksDbStore {
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let cf = self.cf(CF_LEDGER)?;
        let sealed = entry.seal(self.take_seq());
        let value = serde_json::to_vec(&sealed)?;
        self.db.put_cf(cf, sealed.seq.to_be_bytes(), value)?;
        Ok(sealed)
    }

    async fn entries_for_wallet(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.scan_ledger()?;
        entries.retain(|entry| &entry.wallet_id == user_id);
        Ok(tail(entries, limit))
    }

    async fn entries(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        Ok(tail(self.scan_ledger()?, limit))
    }
}

#[async_trait]
impl OrderStore for RocksDbStore {
    async fn order(&self, order_id: Uuid) -> Result<Option<PaymentOrder>> {
        let cf = self.cf(CF_ORDERS)?;
        match self.db.get_cf(cf, order_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_order(&self, order: PaymentOrder) -> Result<()> {
        let cf = self.cf(CF_ORDERS)?;
        let value = serde_json::to_vec(&order)?;
        self.db.put_cf(cf, order.order_id.as_bytes(), value)?;
        Ok(())
    }

    async fn orders(&self, limit: Option<usize>) -> Result<Vec<PaymentOrder>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            orders.push(serde_json::from_slice::<PaymentOrder>(&value)?);
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit.unwrap_or(usize::MAX));
        Ok(orders)
    }
}

#[async_trait]
impl Storage for RocksDbStore {
    async fn commit(&self, change: StateChange) -> Result<Option<LedgerEntry>> {
        let wallets_cf = self.cf(CF_WALLETS)?;
        let orders_cf = self.cf(CF_ORDERS)?;
        let ledger_cf = self.cf(CF_LEDGER)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            wallets_cf,
            change.wallet.user_id.as_str().as_bytes(),
            serde_json::to_vec(&change.wallet)?,
        );

        if let Some(order) = &change.order {
            batch.put_cf(
                orders_cf,
                order.order_id.as_bytes(),
                serde_json::to_vec(order)?,
            );
        }

        let appended = match change.entry {
            Some(entry) => {
                let sealed = entry.seal(self.take_seq());
                batch.put_cf(
                    ledger_cf,
                    sealed.seq.to_be_bytes(),
                    serde_json::to_vec(&sealed)?,
                );
                Some(sealed)
            }
            None => None,
        };

        self.db.write(batch)?;
        Ok(appended)
    }
}
