use crate::domain::ledger::LedgerEntry;
use crate::domain::wallet::Wallet;
use crate::error::Result;
use std::io::Write;

/// Writes final engine state as CSV.
///
/// Wallets go out as `user,balance,frozen,total`; the ledger dump as
/// `seq,tx_id,wallet,type,amount,order`.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(dest: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(dest),
        }
    }

    pub fn write_wallets(&mut self, wallets: &[Wallet]) -> Result<()> {
        self.writer
            .write_record(["user", "balance", "frozen", "total"])?;
        for wallet in wallets {
            self.writer.write_record([
                wallet.user_id.as_str(),
                &wallet.balance.to_string(),
                &wallet.frozen.to_string(),
                &wallet.total().to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_entries(&mut self, entries: &[LedgerEntry]) -> Result<()> {
        self.writer
            .write_record(["seq", "tx_id", "wallet", "type", "amount", "order"])?;
        for entry in entries {
            let related = entry
                .related_order
                .map(|id| id.to_string())
                .unwrap_or_default();
            self.writer.write_record([
                &entry.seq.to_string(),
                &entry.tx_id.to_string(),
                entry.wallet_id.as_str(),
                &entry.entry_type.to_string(),
                &entry.amount.to_string(),
                &related,
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
