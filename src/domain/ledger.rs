use crate::domain::wallet::{Amount, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of balance movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    /// Purchase credit into the spendable balance.
    Buy,
    /// Reservation: spendable -> frozen.
    Freeze,
    /// Finalized payment: frozen funds leave the system.
    Settle,
    /// Canceled payment: frozen -> spendable.
    Refund,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryType::Buy => "BUY",
            EntryType::Freeze => "FREEZE",
            EntryType::Settle => "SETTLE",
            EntryType::Refund => "REFUND",
        };
        f.write_str(s)
    }
}

/// An entry about to be appended; the store assigns `tx_id`, `seq` and
/// `created_at` at commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub wallet_id: UserId,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub related_order: Option<Uuid>,
}

impl NewLedgerEntry {
    pub fn buy(wallet_id: UserId, amount: Amount) -> Self {
        Self {
            wallet_id,
            entry_type: EntryType::Buy,
            amount,
            related_order: None,
        }
    }

    pub fn freeze(wallet_id: UserId, amount: Amount, order_id: Uuid) -> Self {
        Self {
            wallet_id,
            entry_type: EntryType::Freeze,
            amount,
            related_order: Some(order_id),
        }
    }

    pub fn settle(wallet_id: UserId, amount: Amount, order_id: Uuid) -> Self {
        Self {
            wallet_id,
            entry_type: EntryType::Settle,
            amount,
            related_order: Some(order_id),
        }
    }

    pub fn refund(wallet_id: UserId, amount: Amount, order_id: Uuid) -> Self {
        Self {
            wallet_id,
            entry_type: EntryType::Refund,
            amount,
            related_order: Some(order_id),
        }
    }

    /// Finalizes the entry at append time with its store-assigned identity.
    pub fn seal(self, seq: u64) -> LedgerEntry {
        LedgerEntry {
            tx_id: Uuid::new_v4(),
            seq,
            wallet_id: self.wallet_id,
            entry_type: self.entry_type,
            amount: self.amount,
            related_order: self.related_order,
            created_at: Utc::now(),
        }
    }
}

/// One immutable row of the append-only audit trail.
///
/// `seq` is the store-assigned append index and is the authoritative order of
/// events; `created_at` is wall-clock time and may tie or jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub tx_id: Uuid,
    pub seq: u64,
    pub wallet_id: UserId,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub related_order: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Balances reconstructed by replaying ledger entries.
///
/// Signed so that a corrupted history shows up as a negative bucket instead
/// of a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayedBalances {
    pub balance: i128,
    pub frozen: i128,
}

/// Replays a wallet's entries into its (balance, frozen) split.
///
/// BUY and REFUND credit the spendable balance, FREEZE moves spendable funds
/// into the frozen bucket, SETTLE and REFUND drain the frozen bucket.
pub fn replay<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> ReplayedBalances {
    let mut replayed = ReplayedBalances::default();
    for entry in entries {
        let amount = entry.amount.value() as i128;
        match entry.entry_type {
            EntryType::Buy => replayed.balance += amount,
            EntryType::Freeze => {
                replayed.balance -= amount;
                replayed.frozen += amount;
            }
            EntryType::Settle => replayed.frozen -= amount,
            EntryType::Refund => {
                replayed.frozen -= amount;
                replayed.balance += amount;
            }
        }
    }
    replayed
}
