pub mod ledger;
pub mod order;
pub mod ports;
pub mod wallet;
