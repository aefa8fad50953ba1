use crate::domain::ledger::{LedgerEntry, NewLedgerEntry};
use crate::domain::order::PaymentOrder;
use crate::domain::wallet::{UserId, Wallet};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn wallet(&self, user_id: &UserId) -> Result<Option<Wallet>>;
    async fn put_wallet(&self, wallet: Wallet) -> Result<()>;
    /// All wallets, ordered by user id for deterministic reporting.
    async fn wallets(&self) -> Result<Vec<Wallet>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Appends one entry, assigning its `tx_id`, `seq` and `created_at`.
    ///
    /// Never rejects based on ledger content; business validation happens
    /// before the append. Fails only on storage I/O.
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry>;

    /// Entries for one wallet in append order. With a limit, the most recent
    /// `limit` entries are returned, still chronologically ordered.
    async fn entries_for_wallet(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>>;

    /// All entries in append order, with the same limit semantics.
    async fn entries(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order(&self, order_id: Uuid) -> Result<Option<PaymentOrder>>;
    async fn put_order(&self, order: PaymentOrder) -> Result<()>;
    /// Orders newest-first; with a limit, only the most recent `limit`.
    async fn orders(&self, limit: Option<usize>) -> Result<Vec<PaymentOrder>>;
}

/// One atomic multi-entity write: the wallet snapshot to store, plus the
/// order and ledger entry belonging to the same transition.
///
/// Composite transitions (freeze + order, settle + entry + status flip) go
/// through [`Storage::commit`] so a mid-sequence storage failure can never
/// leave partial state behind.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub wallet: Wallet,
    pub order: Option<PaymentOrder>,
    pub entry: Option<NewLedgerEntry>,
}

impl StateChange {
    pub fn wallet_only(wallet: Wallet) -> Self {
        Self {
            wallet,
            order: None,
            entry: None,
        }
    }
}

#[async_trait]
pub trait Storage: WalletStore + LedgerStore + OrderStore {
    /// Applies the whole change as a single storage transaction, returning
    /// the appended ledger entry (if the change carries one).
    async fn commit(&self, change: StateChange) -> Result<Option<LedgerEntry>>;
}

pub type StorageHandle = Arc<dyn Storage>;
