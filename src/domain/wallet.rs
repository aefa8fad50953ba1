use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a wallet owner.
///
/// Wallets are keyed by an opaque caller-supplied string; the engine never
/// interprets it beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A positive monetary quantity in minor units.
///
/// Ensures that transaction amounts are always strictly positive; zero and
/// negative values never reach the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub fn new(value: u64) -> Result<Self> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(PaymentError::InvalidArgument(
                "amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = PaymentError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The current-balance projection for one user.
///
/// `balance` is spendable, `frozen` is reserved by open payment orders;
/// the total owned by the user is `balance + frozen`. Both are minor-unit
/// amounts and can never go negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: u64,
    pub frozen: u64,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Creates an empty wallet. Wallets come into existence lazily on first
    /// reference and are never deleted.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: 0,
            frozen: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn total(&self) -> u64 {
        self.balance + self.frozen
    }

    /// Adds purchased funds to the spendable balance.
    pub fn credit(&mut self, amount: Amount) {
        self.balance += amount.value();
        self.touch();
    }

    /// Reserves funds for a payment: spendable -> frozen.
    pub fn freeze(&mut self, amount: Amount) -> Result<()> {
        if self.balance < amount.value() {
            return Err(PaymentError::InsufficientFunds {
                available: self.balance,
                requested: amount.value(),
            });
        }
        self.balance -= amount.value();
        self.frozen += amount.value();
        self.touch();
        Ok(())
    }

    /// Finalizes a reservation: the frozen funds leave the system.
    ///
    /// A shortfall here means a freeze was lost or settled twice, which the
    /// order state machine is supposed to make impossible.
    pub fn settle(&mut self, amount: Amount) -> Result<()> {
        if self.frozen < amount.value() {
            return Err(PaymentError::InvariantViolation(format!(
                "settle of {} exceeds frozen funds {} for wallet {}",
                amount, self.frozen, self.user_id
            )));
        }
        self.frozen -= amount.value();
        self.touch();
        Ok(())
    }

    /// Releases a reservation back to the spendable balance.
    pub fn unfreeze(&mut self, amount: Amount) -> Result<()> {
        if self.frozen < amount.value() {
            return Err(PaymentError::InvariantViolation(format!(
                "unfreeze of {} exceeds frozen funds {} for wallet {}",
                amount, self.frozen, self.user_id
            )));
        }
        self.frozen -= amount.value();
        self.balance += amount.value();
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(1).is_ok());
        assert!(matches!(
            Amount::new(0),
            Err(PaymentError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_wallet_credit() {
        let mut wallet = Wallet::new(UserId::from("u1"));
        wallet.credit(Amount::new(10_000).unwrap());
        assert_eq!(wallet.balance, 10_000);
        assert_eq!(wallet.frozen, 0);
        assert_eq!(wallet.total(), 10_000);
    }

    #[test]
    fn test_wallet_freeze_success() {
        let mut wallet = Wallet::new(UserId::from("u1"));
        wallet.credit(Amount::new(10_000).unwrap());

        wallet.freeze(Amount::new(4_000).unwrap()).unwrap();
        assert_eq!(wallet.balance, 6_000);
        assert_eq!(wallet.frozen, 4_000);
        assert_eq!(wallet.total(), 10_000);
    }

    #[test]
    fn test_wallet_freeze_insufficient() {
        let mut wallet = Wallet::new(UserId::from("u1"));
        wallet.credit(Amount::new(100).unwrap());

        let result = wallet.freeze(Amount::new(200).unwrap());
        assert!(matches!(
            result,
            Err(PaymentError::InsufficientFunds {
                available: 100,
                requested: 200,
            })
        ));
        // Rejected freeze must not move anything.
        assert_eq!(wallet.balance, 100);
        assert_eq!(wallet.frozen, 0);
    }

    #[test]
    fn test_wallet_settle_burns_frozen() {
        let mut wallet = Wallet::new(UserId::from("u1"));
        wallet.credit(Amount::new(10_000).unwrap());
        wallet.freeze(Amount::new(5_000).unwrap()).unwrap();

        wallet.settle(Amount::new(5_000).unwrap()).unwrap();
        assert_eq!(wallet.balance, 5_000);
        assert_eq!(wallet.frozen, 0);
        assert_eq!(wallet.total(), 5_000);
    }

    #[test]
    fn test_wallet_settle_exceeding_frozen_is_fatal() {
        let mut wallet = Wallet::new(UserId::from("u1"));
        wallet.credit(Amount::new(1_000).unwrap());

        let result = wallet.settle(Amount::new(1).unwrap());
        assert!(matches!(result, Err(PaymentError::InvariantViolation(_))));
        assert_eq!(wallet.balance, 1_000);
    }

    #[test]
    fn test_wallet_unfreeze_restores_balance() {
        let mut wallet = Wallet::new(UserId::from("u1"));
        wallet.credit(Amount::new(10_000).unwrap());
        wallet.freeze(Amount::new(5_000).unwrap()).unwrap();

        wallet.unfreeze(Amount::new(5_000).unwrap()).unwrap();
        assert_eq!(wallet.balance, 10_000);
        assert_eq!(wallet.frozen, 0);
    }

    #[test]
    fn test_wallet_unfreeze_exceeding_frozen_is_fatal() {
        let mut wallet = Wallet::new(UserId::from("u1"));

        let result = wallet.unfreeze(Amount::new(1).unwrap());
        assert!(matches!(result, Err(PaymentError::InvariantViolation(_))));
    }
}
