use crate::domain::order::OrderStatus;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    /// Malformed input rejected before any state is touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Business rule: the wallet cannot cover the requested freeze.
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    /// The order is already closed, so the requested transition is impossible.
    #[error("order {order_id} is {status}, expected PREPARED")]
    InvalidState {
        order_id: Uuid,
        status: OrderStatus,
    },

    /// Internal consistency failure. Non-retryable; indicates a logic bug.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}
