use crate::domain::wallet::{Amount, UserId};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Funds are frozen, awaiting confirm or cancel.
    Prepared,
    /// Terminal: the frozen amount was settled.
    Confirmed,
    /// Terminal: the frozen amount was released back to the wallet.
    Canceled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Prepared => "PREPARED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// One payment attempt, from preparation to its terminal outcome.
///
/// The amount is fixed at creation. Closed orders are retained forever for
/// audit; only the PREPARED -> CONFIRMED and PREPARED -> CANCELED transitions
/// exist, each at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: Uuid,
    pub user_id: UserId,
    pub merchant_name: String,
    pub amount: Amount,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PaymentOrder {
    pub fn new(user_id: UserId, merchant_name: impl Into<String>, amount: Amount) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            user_id,
            merchant_name: merchant_name.into(),
            amount,
            status: OrderStatus::Prepared,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Prepared
    }

    /// Marks the order settled. Fails on anything but an open order.
    pub fn confirm(&mut self) -> Result<()> {
        self.close(OrderStatus::Confirmed)
    }

    /// Marks the order canceled. Fails on anything but an open order.
    pub fn cancel(&mut self) -> Result<()> {
        self.close(OrderStatus::Canceled)
    }

    fn close(&mut self, terminal: OrderStatus) -> Result<()> {
        if !self.is_open() {
            return Err(PaymentError::InvalidState {
                order_id: self.order_id,
                status: self.status,
            });
        }
        self.status = terminal;
        self.closed_at = Some(Utc::now());
        Ok(())
    }
}
