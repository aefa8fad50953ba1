use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Buy,
    Prepare,
    Confirm,
    Cancel,
}

/// One row of an operations script.
///
/// Which fields are required depends on the operation: `buy` needs `user`
/// and `amount`, `prepare` additionally needs `merchant` and binds the
/// generated order id to the row's `order` label, `confirm`/`cancel` only
/// need the `order` label. Missing fields are caught when the row is
/// applied, not here.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub op: OpKind,
    pub user: Option<String>,
    pub merchant: Option<String>,
    pub amount: Option<u64>,
    pub order: Option<String>,
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<OperationRecord>`,
/// with whitespace trimming and flexible record lengths.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations,
    /// so large scripts stream without loading fully into memory.
    pub fn operations(self) -> impl Iterator<Item = Result<OperationRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
