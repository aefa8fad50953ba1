pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

pub use application::service::{PaymentService, WalletView};
pub use error::{PaymentError, Result};
