use crate::domain::ledger::{LedgerEntry, NewLedgerEntry};
use crate::domain::order::PaymentOrder;
use crate::domain::ports::{LedgerStore, OrderStore, StateChange, Storage, WalletStore};
use crate::domain::wallet::{UserId, Wallet};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store backing all three entity tables.
///
/// One struct implements every storage trait so [`Storage::commit`] can take
/// all the write locks it needs before touching anything, giving readers a
/// consistent snapshot across entities. Ideal for tests and single-run
/// processing where persistence is not required.
///
/// The ledger is an append vector; an entry's `seq` is its 1-based position.
/// `order_log` remembers insertion order so the admin view can serve
/// newest-first without trusting wall-clock timestamps.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    wallets: RwLock<HashMap<UserId, Wallet>>,
    ledger: RwLock<Vec<LedgerEntry>>,
    orders: RwLock<HashMap<Uuid, PaymentOrder>>,
    order_log: RwLock<Vec<Uuid>>,
}

impl InMemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn tail<T: Clone>(items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(limit) if items.len() > limit => items[items.len() - limit..].to_vec(),
        _ => items,
    }
}

#[async_trait]
impl WalletStore for InMemoryStore {
    async fn wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        let wallets = self.inner.wallets.read().await;
        Ok(wallets.get(user_id).cloned())
    }

    async fn put_wallet(&self, wallet: Wallet) -> Result<()> {
        let mut wallets = self.inner.wallets.write().await;
        wallets.insert(wallet.user_id.clone(), wallet);
        Ok(())
    }

    async fn wallets(&self) -> Result<Vec<Wallet>> {
        let wallets = self.inner.wallets.read().await;
        let mut all: Vec<Wallet> = wallets.values().cloned().collect();
        all.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(all)
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let mut ledger = self.inner.ledger.write().await;
        let sealed = entry.seal(ledger.len() as u64 + 1);
        ledger.push(sealed.clone());
        Ok(sealed)
    }

    async fn entries_for_wallet(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>> {
        let ledger = self.inner.ledger.read().await;
        let entries: Vec<LedgerEntry> = ledger
            .iter()
            .filter(|entry| &entry.wallet_id == user_id)
            .cloned()
            .collect();
        Ok(tail(entries, limit))
    }

    async fn entries(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        let ledger = self.inner.ledger.read().await;
        Ok(tail(ledger.clone(), limit))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn order(&self, order_id: Uuid) -> Result<Option<PaymentOrder>> {
        let orders = self.inner.orders.read().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn put_order(&self, order: PaymentOrder) -> Result<()> {
        let mut orders = self.inner.orders.write().await;
        let mut order_log = self.inner.order_log.write().await;
        if !orders.contains_key(&order.order_id) {
            order_log.push(order.order_id);
        }
        orders.insert(order.order_id, order);
        Ok(())
    }

    async fn orders(&self, limit: Option<usize>) -> Result<Vec<PaymentOrder>> {
        let orders = self.inner.orders.read().await;
        let order_log = self.inner.order_log.read().await;
        let newest_first = order_log
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .filter_map(|id| orders.get(id).cloned())
            .collect();
        Ok(newest_first)
    }
}

#[async_trait]
impl Storage for InMemoryStore {
    async fn commit(&self, change: StateChange) -> Result<Option<LedgerEntry>> {
        // Take every write lock up front; readers see the whole transition
        // or none of it. In-memory writes cannot fail mid-sequence.
        let mut wallets = self.inner.wallets.write().await;
        let mut ledger = self.inner.ledger.write().await;
        let mut orders = self.inner.orders.write().await;
        let mut order_log = self.inner.order_log.write().await;

        wallets.insert(change.wallet.user_id.clone(), change.wallet);

        if let Some(order) = change.order {
            if !orders.contains_key(&order.order_id) {
                order_log.push(order.order_id);
            }
            orders.insert(order.order_id, order);
        }

        let appended = change.entry.map(|entry| {
            let sealed = entry.seal(ledger.len() as u64 + 1);
            ledger.push(sealed.clone());
            sealed
        });

        Ok(appended)
    }
}
