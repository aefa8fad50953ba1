use crate::application::locks::KeyedLocks;
use crate::domain::ledger::{self, LedgerEntry, NewLedgerEntry};
use crate::domain::order::PaymentOrder;
use crate::domain::ports::{
    LedgerStore, OrderStore, StateChange, Storage, StorageHandle, WalletStore,
};
use crate::domain::wallet::{Amount, UserId, Wallet};
use crate::error::{PaymentError, Result};
use tracing::{debug, warn};
use uuid::Uuid;

/// A wallet snapshot together with its transaction history, as served to the
/// wallet view.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletView {
    pub wallet: Wallet,
    pub transactions: Vec<LedgerEntry>,
}

/// One wallet whose stored balances disagree with its replayed ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditFinding {
    pub user_id: UserId,
    pub balance: u64,
    pub frozen: u64,
    pub replayed_balance: i128,
    pub replayed_frozen: i128,
}

/// Orchestrates wallets, orders and the ledger under per-entity locking.
///
/// All business invariants live on the domain entities; the service
/// validates parameters, serializes access per wallet and per order, and
/// commits each transition as a single atomic [`StateChange`].
///
/// Lock order is always order -> wallet (prepare takes only the wallet
/// lock), so the two lock classes cannot deadlock.
pub struct PaymentService {
    storage: StorageHandle,
    wallet_locks: KeyedLocks<UserId>,
    order_locks: KeyedLocks<Uuid>,
}

impl PaymentService {
    pub fn new(storage: StorageHandle) -> Self {
        Self {
            storage,
            wallet_locks: KeyedLocks::new(),
            order_locks: KeyedLocks::new(),
        }
    }

    /// Credits purchased funds to the user's spendable balance and records a
    /// BUY entry. Creates the wallet on first use.
    pub async fn buy(&self, user_id: &UserId, amount: u64) -> Result<Wallet> {
        let amount = Amount::new(amount)?;

        let _guard = self.wallet_locks.acquire(user_id).await;
        let mut wallet = self.load_wallet(user_id).await?;
        wallet.credit(amount);

        let entry = NewLedgerEntry::buy(user_id.clone(), amount);
        self.storage
            .commit(StateChange {
                wallet: wallet.clone(),
                order: None,
                entry: Some(entry),
            })
            .await?;

        debug!(user = %user_id, %amount, balance = wallet.balance, "buy credited");
        Ok(wallet)
    }

    /// Returns the wallet and its ledger history, creating a zero-balance
    /// wallet on first reference. `limit` trims the history to the most
    /// recent entries.
    pub async fn get_wallet(&self, user_id: &UserId, limit: Option<usize>) -> Result<WalletView> {
        let wallet = match self.storage.wallet(user_id).await? {
            Some(wallet) => wallet,
            None => {
                // First reference: persist the empty wallet under the wallet
                // lock, re-checking in case a writer got there first.
                let _guard = self.wallet_locks.acquire(user_id).await;
                match self.storage.wallet(user_id).await? {
                    Some(wallet) => wallet,
                    None => {
                        let wallet = Wallet::new(user_id.clone());
                        self.storage
                            .commit(StateChange::wallet_only(wallet.clone()))
                            .await?;
                        wallet
                    }
                }
            }
        };

        let transactions = self.storage.entries_for_wallet(user_id, limit).await?;
        Ok(WalletView {
            wallet,
            transactions,
        })
    }

    /// Freezes `amount` for a merchant payment and opens a PREPARED order.
    ///
    /// On insufficient funds nothing is created and nothing is appended.
    pub async fn prepare(
        &self,
        user_id: &UserId,
        merchant_name: &str,
        amount: u64,
    ) -> Result<PaymentOrder> {
        let amount = Amount::new(amount)?;
        if merchant_name.trim().is_empty() {
            return Err(PaymentError::InvalidArgument(
                "merchant name must not be empty".to_string(),
            ));
        }

        let _guard = self.wallet_locks.acquire(user_id).await;
        let mut wallet = self.load_wallet(user_id).await?;
        wallet.freeze(amount)?;

        let order = PaymentOrder::new(user_id.clone(), merchant_name, amount);
        let entry = NewLedgerEntry::freeze(user_id.clone(), amount, order.order_id);
        self.storage
            .commit(StateChange {
                wallet,
                order: Some(order.clone()),
                entry: Some(entry),
            })
            .await?;

        debug!(user = %user_id, order = %order.order_id, %amount, "payment prepared");
        Ok(order)
    }

    /// Settles a PREPARED order: the frozen amount leaves the system, a
    /// SETTLE entry is appended and the order closes as CONFIRMED, all in
    /// one commit.
    pub async fn confirm(&self, order_id: Uuid) -> Result<PaymentOrder> {
        let _order_guard = self.order_locks.acquire(&order_id).await;
        let mut order = self
            .storage
            .order(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        order.confirm()?;

        let _wallet_guard = self.wallet_locks.acquire(&order.user_id).await;
        let mut wallet = self.load_wallet(&order.user_id).await?;
        if let Err(e) = wallet.settle(order.amount) {
            warn!(order = %order_id, error = %e, "settle failed; order left open");
            return Err(e);
        }

        let entry = NewLedgerEntry::settle(order.user_id.clone(), order.amount, order.order_id);
        self.storage
            .commit(StateChange {
                wallet,
                order: Some(order.clone()),
                entry: Some(entry),
            })
            .await?;

        debug!(order = %order_id, amount = %order.amount, "payment confirmed");
        Ok(order)
    }

    /// Cancels a PREPARED order: the frozen amount returns to the spendable
    /// balance, a REFUND entry is appended and the order closes as CANCELED,
    /// all in one commit.
    pub async fn cancel(&self, order_id: Uuid) -> Result<PaymentOrder> {
        let _order_guard = self.order_locks.acquire(&order_id).await;
        let mut order = self
            .storage
            .order(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        order.cancel()?;

        let _wallet_guard = self.wallet_locks.acquire(&order.user_id).await;
        let mut wallet = self.load_wallet(&order.user_id).await?;
        if let Err(e) = wallet.unfreeze(order.amount) {
            warn!(order = %order_id, error = %e, "unfreeze failed; order left open");
            return Err(e);
        }

        let entry = NewLedgerEntry::refund(order.user_id.clone(), order.amount, order.order_id);
        self.storage
            .commit(StateChange {
                wallet,
                order: Some(order.clone()),
                entry: Some(entry),
            })
            .await?;

        debug!(order = %order_id, amount = %order.amount, "payment canceled");
        Ok(order)
    }

    /// All ledger entries in append order (admin view).
    pub async fn list_ledger(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        self.storage.entries(limit).await
    }

    /// All payment orders, newest first (admin view).
    pub async fn list_orders(&self, limit: Option<usize>) -> Result<Vec<PaymentOrder>> {
        self.storage.orders(limit).await
    }

    /// Replays the ledger for every wallet and reports each one whose stored
    /// balances disagree with the replayed history.
    pub async fn audit(&self) -> Result<Vec<AuditFinding>> {
        let mut findings = Vec::new();
        for wallet in self.storage.wallets().await? {
            let entries = self
                .storage
                .entries_for_wallet(&wallet.user_id, None)
                .await?;
            let replayed = ledger::replay(&entries);
            if replayed.balance != wallet.balance as i128
                || replayed.frozen != wallet.frozen as i128
            {
                warn!(
                    user = %wallet.user_id,
                    balance = wallet.balance,
                    replayed_balance = %replayed.balance,
                    "wallet does not reconcile with ledger"
                );
                findings.push(AuditFinding {
                    user_id: wallet.user_id.clone(),
                    balance: wallet.balance,
                    frozen: wallet.frozen,
                    replayed_balance: replayed.balance,
                    replayed_frozen: replayed.frozen,
                });
            }
        }
        Ok(findings)
    }

    async fn load_wallet(&self, user_id: &UserId) -> Result<Wallet> {
        Ok(self
            .storage
            .wallet(user_id)
            .await?
            .unwrap_or_else(|| Wallet::new(user_id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::EntryType;
    use crate::domain::order::OrderStatus;
    use crate::infrastructure::in_memory::InMemoryStore;
    use std::sync::Arc;

    fn service() -> PaymentService {
        PaymentService::new(Arc::new(InMemoryStore::new()))
    }

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    #[tokio::test]
    async fn test_buy_credits_and_records() {
        let service = service();
        let wallet = service.buy(&user("u1"), 10_000).await.unwrap();
        assert_eq!(wallet.balance, 10_000);

        let ledger = service.list_ledger(None).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].entry_type, EntryType::Buy);
        assert_eq!(ledger[0].amount.value(), 10_000);
    }

    #[tokio::test]
    async fn test_buy_rejects_zero_amount() {
        let service = service();
        let result = service.buy(&user("u1"), 0).await;
        assert!(matches!(result, Err(PaymentError::InvalidArgument(_))));
        // Nothing must be recorded for a rejected buy.
        assert!(service.list_ledger(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_wallet_lazy_creates() {
        let service = service();
        let view = service.get_wallet(&user("fresh"), None).await.unwrap();
        assert_eq!(view.wallet.balance, 0);
        assert_eq!(view.wallet.frozen, 0);
        assert!(view.transactions.is_empty());

        // The wallet is persisted, not just synthesized per call.
        let wallets = service.storage.wallets().await.unwrap();
        assert_eq!(wallets.len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_confirm_scenario() {
        let service = service();
        let u = user("u1");
        service.buy(&u, 10_000).await.unwrap();

        let order = service.prepare(&u, "Coffee Shop", 5_000).await.unwrap();
        let view = service.get_wallet(&u, None).await.unwrap();
        assert_eq!(view.wallet.balance, 5_000);
        assert_eq!(view.wallet.frozen, 5_000);

        let confirmed = service.confirm(order.order_id).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let view = service.get_wallet(&u, None).await.unwrap();
        assert_eq!(view.wallet.balance, 5_000);
        assert_eq!(view.wallet.frozen, 0);

        let types: Vec<EntryType> = view
            .transactions
            .iter()
            .map(|entry| entry.entry_type)
            .collect();
        assert_eq!(
            types,
            vec![EntryType::Buy, EntryType::Freeze, EntryType::Settle]
        );
    }

    #[tokio::test]
    async fn test_prepare_cancel_restores_balance() {
        let service = service();
        let u = user("u1");
        service.buy(&u, 10_000).await.unwrap();

        let order = service.prepare(&u, "Coffee Shop", 5_000).await.unwrap();
        service.cancel(order.order_id).await.unwrap();

        let view = service.get_wallet(&u, None).await.unwrap();
        assert_eq!(view.wallet.balance, 10_000);
        assert_eq!(view.wallet.frozen, 0);
        assert_eq!(view.transactions.last().unwrap().entry_type, EntryType::Refund);
    }

    #[tokio::test]
    async fn test_prepare_insufficient_funds_has_no_effect() {
        let service = service();
        let u = user("u1");
        service.buy(&u, 10_000).await.unwrap();

        let result = service.prepare(&u, "Big Store", 20_000).await;
        assert!(matches!(
            result,
            Err(PaymentError::InsufficientFunds {
                available: 10_000,
                requested: 20_000,
            })
        ));

        assert!(service.list_orders(None).await.unwrap().is_empty());
        // Only the BUY entry exists.
        assert_eq!(service.list_ledger(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_unknown_order() {
        let service = service();
        let result = service.confirm(Uuid::new_v4()).await;
        assert!(matches!(result, Err(PaymentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_second_confirm_rejected() {
        let service = service();
        let u = user("u1");
        service.buy(&u, 10_000).await.unwrap();
        let order = service.prepare(&u, "Coffee Shop", 5_000).await.unwrap();

        service.confirm(order.order_id).await.unwrap();
        let result = service.confirm(order.order_id).await;
        assert!(matches!(result, Err(PaymentError::InvalidState { .. })));

        // The failed retry must not have touched the wallet.
        let view = service.get_wallet(&u, None).await.unwrap();
        assert_eq!(view.wallet.balance, 5_000);
        assert_eq!(view.wallet.frozen, 0);
    }

    #[tokio::test]
    async fn test_cancel_after_confirm_rejected() {
        let service = service();
        let u = user("u1");
        service.buy(&u, 10_000).await.unwrap();
        let order = service.prepare(&u, "Coffee Shop", 5_000).await.unwrap();
        service.confirm(order.order_id).await.unwrap();

        let result = service.cancel(order.order_id).await;
        assert!(matches!(result, Err(PaymentError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_get_wallet_limit_returns_most_recent() {
        let service = service();
        let u = user("u1");
        for _ in 0..5 {
            service.buy(&u, 100).await.unwrap();
        }
        let order = service.prepare(&u, "Coffee Shop", 100).await.unwrap();
        service.cancel(order.order_id).await.unwrap();

        let view = service.get_wallet(&u, Some(2)).await.unwrap();
        assert_eq!(view.transactions.len(), 2);
        assert_eq!(view.transactions[0].entry_type, EntryType::Freeze);
        assert_eq!(view.transactions[1].entry_type, EntryType::Refund);
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let service = service();
        let u = user("u1");
        service.buy(&u, 10_000).await.unwrap();
        let first = service.prepare(&u, "A", 1_000).await.unwrap();
        let second = service.prepare(&u, "B", 1_000).await.unwrap();

        let orders = service.list_orders(None).await.unwrap();
        assert_eq!(orders[0].order_id, second.order_id);
        assert_eq!(orders[1].order_id, first.order_id);

        let limited = service.list_orders(Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].order_id, second.order_id);
    }

    #[tokio::test]
    async fn test_audit_clean_after_mixed_flows() {
        let service = service();
        let u = user("u1");
        service.buy(&u, 10_000).await.unwrap();
        let confirmed = service.prepare(&u, "A", 2_000).await.unwrap();
        service.confirm(confirmed.order_id).await.unwrap();
        let canceled = service.prepare(&u, "B", 3_000).await.unwrap();
        service.cancel(canceled.order_id).await.unwrap();
        let _open = service.prepare(&u, "C", 1_000).await.unwrap();
        service.buy(&user("u2"), 500).await.unwrap();

        assert!(service.audit().await.unwrap().is_empty());
    }
}
